//! Normalized WAF policy tree.
//!
//! Every nested collection is an always-present, declaration-ordered `Vec`.
//! Order is observable: match values are addressed by the index of their
//! match condition when notes are keyed (see [`crate::keys`]).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declares a string-backed enum with known variants plus an `Other`
/// catch-all, so values the service adds later survive a scan unchanged.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $text,)+
                    Self::Other(s) => s.as_str(),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $(if s.eq_ignore_ascii_case($text) {
                    return Self::$variant;
                })+
                Self::Other(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from(s.as_str())
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> Self {
                v.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Action taken when a custom rule or managed rule matches.
    pub enum RuleAction {
        Allow => "Allow",
        Block => "Block",
        Log => "Log",
        Redirect => "Redirect",
        AnomalyScoring => "AnomalyScoring",
        JsChallenge => "JSChallenge",
    }
}

string_enum! {
    /// Whether a custom rule matches per request or counts toward a rate limit.
    pub enum RuleType {
        MatchRule => "MatchRule",
        RateLimitRule => "RateLimitRule",
    }
}

string_enum! {
    pub enum RuleState {
        Enabled => "Enabled",
        Disabled => "Disabled",
    }
}

/// Kind tag for scanned policies. Only the globally-scoped edge tier is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyKind {
    #[default]
    FrontDoor,
}

impl PolicyKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FrontDoor => "Front Door WAF Policy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySettings {
    pub enabled_state: Option<RuleState>,
    /// "Prevention" or "Detection".
    pub mode: Option<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WafPolicy {
    pub name: String,
    pub id: Option<String>,
    pub kind: PolicyKind,
    pub subscription_name: String,
    pub subscription_id: String,
    pub resource_group_name: String,
    pub settings: PolicySettings,
    /// Resource ids of the endpoints and security policies that reference this policy.
    pub linked_resources: Vec<String>,
    pub managed_rule_sets: Vec<ManagedRuleSet>,
    pub custom_rules: Vec<CustomRule>,
    pub note: Option<String>,
}

impl WafPolicy {
    /// Number of nodes in the tree carrying a note.
    pub fn note_count(&self) -> usize {
        let own = usize::from(self.note.is_some());
        let managed: usize = self
            .managed_rule_sets
            .iter()
            .flat_map(|set| &set.rule_group_overrides)
            .flat_map(|group| &group.rules)
            .filter(|rule| rule.note.is_some())
            .count();
        let custom: usize = self
            .custom_rules
            .iter()
            .map(|rule| {
                usize::from(rule.note.is_some())
                    + rule
                        .match_conditions
                        .iter()
                        .flat_map(|mc| &mc.match_values)
                        .filter(|mv| mv.note.is_some())
                        .count()
            })
            .sum();
        own + managed + custom
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedRuleSet {
    pub rule_set_type: String,
    pub rule_set_version: String,
    pub rule_set_action: Option<RuleAction>,
    pub exclusions: Vec<Exclusion>,
    pub rule_group_overrides: Vec<RuleGroupOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupOverride {
    pub rule_group_name: String,
    pub exclusions: Vec<Exclusion>,
    /// Ids of the overrides in `rules` whose state is Disabled.
    pub disabled_rules: Vec<String>,
    pub rules: Vec<ManagedRuleOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedRuleOverride {
    pub rule_id: String,
    pub state: RuleState,
    pub action: Option<RuleAction>,
    pub exclusions: Vec<Exclusion>,
    pub note: Option<String>,
}

impl ManagedRuleOverride {
    pub fn exclusion_count(&self) -> usize {
        self.exclusions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exclusion {
    pub match_variable: String,
    pub selector_match_operator: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRule {
    pub name: String,
    pub priority: i32,
    pub enabled_state: RuleState,
    pub action: RuleAction,
    pub rule_type: RuleType,
    pub rate_limit_threshold: Option<u32>,
    pub rate_limit_duration_minutes: Option<u32>,
    pub match_conditions: Vec<MatchCondition>,
    pub note: Option<String>,
}

impl CustomRule {
    pub fn match_value_count(&self) -> usize {
        self.match_conditions
            .iter()
            .map(|mc| mc.match_values.len())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCondition {
    pub match_variable: String,
    pub operator: String,
    pub negate_condition: bool,
    pub selector: Option<String>,
    pub match_values: Vec<MatchValue>,
    pub transforms: Vec<String>,
}

/// A raw match value string and the note attached to it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchValue {
    pub value: String,
    pub note: Option<String>,
}

impl MatchValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            note: None,
        }
    }
}
