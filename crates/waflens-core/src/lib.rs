pub mod error;
pub mod hierarchy;
pub mod keys;
pub mod mapper;
pub mod note;
pub mod policy;
pub mod raw;

pub use error::{MapError, ValidationError};
pub use hierarchy::{ResourceGroup, Subscription, Tenant};
pub use keys::{EntityType, NoteKey, NoteTarget, decode_segment, derive_key, encode_segment};
pub use mapper::{PolicyScope, map_policy};
pub use note::{NoteContext, NoteRecord, NoteRequest};
pub use policy::{
    CustomRule, Exclusion, ManagedRuleOverride, ManagedRuleSet, MatchCondition, MatchValue,
    PolicyKind, PolicySettings, RuleAction, RuleGroupOverride, RuleState, RuleType, WafPolicy,
};
pub use raw::RawWafPolicy;
