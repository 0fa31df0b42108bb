//! Note records and the loose save request they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::keys::{EntityType, NoteKey, NoteTarget};

/// Denormalized context stored alongside a note for human inspection.
///
/// None of these fields participate in the key or in lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteContext {
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group_name: Option<String>,
    pub policy_name: Option<String>,
    pub custom_rule_name: Option<String>,
    pub match_condition_index: Option<usize>,
    pub match_value: Option<String>,
    pub rule_set_type: Option<String>,
    pub rule_set_version: Option<String>,
    pub rule_group_name: Option<String>,
    pub rule_id: Option<String>,
}

/// A persisted annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub partition_key: String,
    pub row_key: String,
    pub content: String,
    pub entity_type: EntityType,
    pub context: NoteContext,
    pub updated_at: DateTime<Utc>,
}

impl NoteRecord {
    pub fn key(&self) -> NoteKey {
        NoteKey {
            partition_key: self.partition_key.clone(),
            row_key: self.row_key.clone(),
        }
    }
}

/// A note save request as clients send it: an entity type name plus whichever
/// identifying fields that type needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoteRequest {
    pub entity_type: String,
    pub notes_content: String,
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group_name: Option<String>,
    pub waf_policy_name: Option<String>,
    pub custom_rule_name: Option<String>,
    pub match_condition_index: Option<usize>,
    pub match_value: Option<String>,
    pub managed_rule_set_type: Option<String>,
    pub managed_rule_set_version: Option<String>,
    pub rule_group_name: Option<String>,
    pub rule_id: Option<String>,
}

impl NoteRequest {
    /// Check the entity type and its required fields, producing the typed
    /// target and the context to store with the note.
    ///
    /// Identifying fields are trimmed; a blank field counts as missing. Match
    /// values are kept verbatim since whitespace can be significant there.
    pub fn validate(&self) -> Result<(NoteTarget, NoteContext), ValidationError> {
        let entity_type: EntityType = self.entity_type.parse()?;
        let ty = entity_type.as_str();

        let policy = required(ty, "wafPolicyName", &self.waf_policy_name)?;
        let target = match entity_type {
            EntityType::Policy => NoteTarget::Policy { policy },
            EntityType::CustomRule => NoteTarget::CustomRule {
                policy,
                rule: required(ty, "customRuleName", &self.custom_rule_name)?,
            },
            EntityType::ManagedRuleOverride => NoteTarget::ManagedRuleOverride {
                policy,
                rule_set_type: required(ty, "managedRuleSetType", &self.managed_rule_set_type)?,
                rule_set_version: required(
                    ty,
                    "managedRuleSetVersion",
                    &self.managed_rule_set_version,
                )?,
                rule_group: required(ty, "ruleGroupName", &self.rule_group_name)?,
                rule_id: required(ty, "ruleId", &self.rule_id)?,
            },
            EntityType::MatchValue => NoteTarget::MatchValue {
                policy,
                rule: required(ty, "customRuleName", &self.custom_rule_name)?,
                condition_index: self.match_condition_index.ok_or(
                    ValidationError::MissingField {
                        entity_type: ty,
                        field: "matchConditionIndex",
                    },
                )?,
                value: self
                    .match_value
                    .clone()
                    .filter(|v| !v.is_empty())
                    .ok_or(ValidationError::MissingField {
                        entity_type: ty,
                        field: "matchValue",
                    })?,
            },
        };

        let context = NoteContext {
            tenant_id: trimmed(&self.tenant_id),
            subscription_id: trimmed(&self.subscription_id),
            resource_group_name: trimmed(&self.resource_group_name),
            policy_name: Some(target.policy().to_string()),
            custom_rule_name: trimmed(&self.custom_rule_name),
            match_condition_index: self.match_condition_index,
            match_value: self.match_value.clone(),
            rule_set_type: trimmed(&self.managed_rule_set_type),
            rule_set_version: trimmed(&self.managed_rule_set_version),
            rule_group_name: trimmed(&self.rule_group_name),
            rule_id: trimmed(&self.rule_id),
        };
        Ok((target, context))
    }
}

fn trimmed(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(
    entity_type: &'static str,
    field: &'static str,
    value: &Option<String>,
) -> Result<String, ValidationError> {
    trimmed(value).ok_or(ValidationError::MissingField { entity_type, field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_key;

    #[test]
    fn parses_client_json() {
        let json = r#"{
            "entityType": "MatchValue",
            "notesContent": "known scanner",
            "wafPolicyName": "edge-waf-01",
            "customRuleName": "blockBadIp",
            "matchConditionIndex": 0,
            "matchValue": "203.0.113.5",
            "subscriptionId": "sub-1"
        }"#;
        let request: NoteRequest = serde_json::from_str(json).unwrap();
        let (target, context) = request.validate().unwrap();
        let key = derive_key(&target);
        assert_eq!(key.partition_key, "edge-waf-01_blockBadIp");
        assert_eq!(key.row_key, "MC_0_203.0.113.5");
        assert_eq!(context.subscription_id.as_deref(), Some("sub-1"));
        assert_eq!(context.policy_name.as_deref(), Some("edge-waf-01"));
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        let request = NoteRequest {
            entity_type: "Exclusion".into(),
            waf_policy_name: Some("p".into()),
            ..Default::default()
        };
        assert_eq!(
            request.validate(),
            Err(ValidationError::UnknownEntityType("Exclusion".into()))
        );
    }

    #[test]
    fn missing_identifying_field_is_rejected() {
        let request = NoteRequest {
            entity_type: "ManagedRuleOverride".into(),
            waf_policy_name: Some("p".into()),
            managed_rule_set_type: Some("OWASP".into()),
            managed_rule_set_version: Some("3.2".into()),
            rule_group_name: Some("  ".into()),
            rule_id: Some("942100".into()),
            ..Default::default()
        };
        assert_eq!(
            request.validate(),
            Err(ValidationError::MissingField {
                entity_type: "ManagedRuleOverride",
                field: "ruleGroupName",
            })
        );
    }

    #[test]
    fn match_value_requires_index() {
        let request = NoteRequest {
            entity_type: "MatchValue".into(),
            waf_policy_name: Some("p".into()),
            custom_rule_name: Some("r".into()),
            match_value: Some("1.2.3.4".into()),
            ..Default::default()
        };
        assert!(matches!(
            request.validate(),
            Err(ValidationError::MissingField {
                field: "matchConditionIndex",
                ..
            })
        ));
    }

    #[test]
    fn identifying_fields_are_trimmed() {
        let request = NoteRequest {
            entity_type: "CustomRule".into(),
            waf_policy_name: Some(" p ".into()),
            custom_rule_name: Some("r\n".into()),
            ..Default::default()
        };
        let (target, _) = request.validate().unwrap();
        assert_eq!(
            target,
            NoteTarget::CustomRule {
                policy: "p".into(),
                rule: "r".into()
            }
        );
    }
}
