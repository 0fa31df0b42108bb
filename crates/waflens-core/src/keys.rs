//! Composite key derivation for notes.
//!
//! Every note lives at a `(partition_key, row_key)` address computed from the
//! node it annotates. The partition is the *parent* of the annotated node, so
//! all notes under one custom rule (its match values) or one rule group (its
//! rule overrides) come back from a single partition query.
//!
//! | Target | partition key | row key |
//! |---|---|---|
//! | Policy | `policy` | `policy` |
//! | CustomRule | `policy_rule` | `rule` |
//! | ManagedRuleOverride | `policy_type_version_group` | `ruleId` |
//! | MatchValue | `policy_rule` | `MC_<index>_<value>` |
//!
//! Each field is percent-encoded before it is joined. The encode set leaves
//! only ASCII alphanumerics and `-`, `.`, `~` untouched, so `_` inside a
//! field becomes `%5F` and a literal `_` in a key is always a separator.
//! Keys therefore split back into their fields unambiguously, and the
//! characters the table store rejects (`/`, `\`, `#`, `?`, control
//! characters) never reach it.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Joins encoded fields inside a key.
pub const SEPARATOR: char = '_';

/// Row-key prefix for match-value notes.
pub const MATCH_VALUE_PREFIX: &str = "MC";

const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'~');

/// The kind of node a note is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Policy,
    CustomRule,
    ManagedRuleOverride,
    MatchValue,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        Self::Policy,
        Self::CustomRule,
        Self::ManagedRuleOverride,
        Self::MatchValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Policy => "Policy",
            Self::CustomRule => "CustomRule",
            Self::ManagedRuleOverride => "ManagedRuleOverride",
            Self::MatchValue => "MatchValue",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    /// Accepts the canonical names plus `WafPolicy`, which older clients send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Policy" | "WafPolicy" => Ok(Self::Policy),
            "CustomRule" => Ok(Self::CustomRule),
            "ManagedRuleOverride" => Ok(Self::ManagedRuleOverride),
            "MatchValue" => Ok(Self::MatchValue),
            other => Err(ValidationError::UnknownEntityType(other.to_string())),
        }
    }
}

/// The identifying fields of one annotatable node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NoteTarget {
    Policy {
        policy: String,
    },
    CustomRule {
        policy: String,
        rule: String,
    },
    ManagedRuleOverride {
        policy: String,
        rule_set_type: String,
        rule_set_version: String,
        rule_group: String,
        rule_id: String,
    },
    MatchValue {
        policy: String,
        rule: String,
        condition_index: usize,
        value: String,
    },
}

impl NoteTarget {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Policy { .. } => EntityType::Policy,
            Self::CustomRule { .. } => EntityType::CustomRule,
            Self::ManagedRuleOverride { .. } => EntityType::ManagedRuleOverride,
            Self::MatchValue { .. } => EntityType::MatchValue,
        }
    }

    pub fn policy(&self) -> &str {
        match self {
            Self::Policy { policy }
            | Self::CustomRule { policy, .. }
            | Self::ManagedRuleOverride { policy, .. }
            | Self::MatchValue { policy, .. } => policy,
        }
    }
}

/// Address of a note record in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteKey {
    pub partition_key: String,
    pub row_key: String,
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.row_key)
    }
}

/// Derive the store address of a note. Total: every target has a key.
pub fn derive_key(target: &NoteTarget) -> NoteKey {
    match target {
        NoteTarget::Policy { policy } => NoteKey {
            partition_key: encode_segment(policy),
            row_key: encode_segment(policy),
        },
        NoteTarget::CustomRule { policy, rule } => NoteKey {
            partition_key: custom_rule_partition(policy, rule),
            row_key: encode_segment(rule),
        },
        NoteTarget::ManagedRuleOverride {
            policy,
            rule_set_type,
            rule_set_version,
            rule_group,
            rule_id,
        } => NoteKey {
            partition_key: rule_group_partition(policy, rule_set_type, rule_set_version, rule_group),
            row_key: managed_rule_row(rule_id),
        },
        NoteTarget::MatchValue {
            policy,
            rule,
            condition_index,
            value,
        } => NoteKey {
            partition_key: custom_rule_partition(policy, rule),
            row_key: match_value_row(*condition_index, value),
        },
    }
}

/// Partition holding a custom rule's own note and all of its match-value notes.
pub fn custom_rule_partition(policy: &str, rule: &str) -> String {
    join(&[policy, rule])
}

/// Partition holding the notes of every rule override in one rule group.
pub fn rule_group_partition(policy: &str, rule_set_type: &str, version: &str, group: &str) -> String {
    join(&[policy, rule_set_type, version, group])
}

pub fn managed_rule_row(rule_id: &str) -> String {
    encode_segment(rule_id)
}

pub fn match_value_row(condition_index: usize, value: &str) -> String {
    format!(
        "{MATCH_VALUE_PREFIX}{SEPARATOR}{condition_index}{SEPARATOR}{}",
        encode_segment(value)
    )
}

/// Percent-encode one key field.
pub fn encode_segment(s: &str) -> String {
    utf8_percent_encode(s, KEY_SEGMENT).to_string()
}

/// Invert [`encode_segment`]. Returns `None` if the decoded bytes are not UTF-8.
pub fn decode_segment(s: &str) -> Option<String> {
    percent_decode_str(s)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Split a key back into its decoded fields.
pub fn split_key(key: &str) -> Option<Vec<String>> {
    key.split(SEPARATOR).map(decode_segment).collect()
}

fn join(fields: &[&str]) -> String {
    let encoded: Vec<String> = fields.iter().map(|f| encode_segment(f)).collect();
    encoded.join(&SEPARATOR.to_string())
}
