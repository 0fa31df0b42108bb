//! Attaches stored notes to a freshly mapped policy tree.
//!
//! The policy and each custom rule get a point lookup. Match values and
//! managed rule overrides are fetched in bulk: one partition query per custom
//! rule with match values, one per rule group with overrides. A failed lookup
//! leaves only its own sub-tree without notes.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use waflens_core::keys::{custom_rule_partition, managed_rule_row, rule_group_partition};
use waflens_core::{CustomRule, NoteTarget, RuleGroupOverride, WafPolicy, derive_key};
use waflens_store::NoteStore;

pub struct NotesOverlay {
    store: Arc<dyn NoteStore>,
}

impl NotesOverlay {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    /// Return `policy` with every note found in the store attached.
    ///
    /// Never fails. Once `cancel` fires no further store calls are made and
    /// nodes not yet visited keep no note.
    pub async fn enrich(&self, mut policy: WafPolicy, cancel: &CancellationToken) -> WafPolicy {
        let name = policy.name.clone();
        policy.note = self
            .point_note(
                &NoteTarget::Policy {
                    policy: name.clone(),
                },
                cancel,
            )
            .await;

        let custom = join_all(
            policy
                .custom_rules
                .iter_mut()
                .map(|rule| self.enrich_custom_rule(&name, rule, cancel)),
        );

        let mut groups = Vec::new();
        for set in policy.managed_rule_sets.iter_mut() {
            let ty: &str = &set.rule_set_type;
            let version: &str = &set.rule_set_version;
            for group in set.rule_group_overrides.iter_mut() {
                groups.push(self.enrich_rule_group(&name, ty, version, group, cancel));
            }
        }

        futures::join!(custom, join_all(groups));
        debug!(policy = %name, notes = policy.note_count(), "overlaid notes");
        policy
    }

    async fn enrich_custom_rule(&self, policy: &str, rule: &mut CustomRule, cancel: &CancellationToken) {
        let target = NoteTarget::CustomRule {
            policy: policy.to_string(),
            rule: rule.name.clone(),
        };
        rule.note = self.point_note(&target, cancel).await;

        if rule.match_value_count() == 0 {
            return;
        }
        let partition = custom_rule_partition(policy, &rule.name);
        let Some(notes) = self.partition_notes(&partition, cancel).await else {
            return;
        };
        for (index, condition) in rule.match_conditions.iter_mut().enumerate() {
            for value in condition.match_values.iter_mut() {
                let key = derive_key(&NoteTarget::MatchValue {
                    policy: policy.to_string(),
                    rule: rule.name.clone(),
                    condition_index: index,
                    value: value.value.clone(),
                });
                value.note = notes.get(&key.row_key).cloned();
            }
        }
    }

    async fn enrich_rule_group(
        &self,
        policy: &str,
        rule_set_type: &str,
        rule_set_version: &str,
        group: &mut RuleGroupOverride,
        cancel: &CancellationToken,
    ) {
        if group.rules.is_empty() {
            return;
        }
        let partition =
            rule_group_partition(policy, rule_set_type, rule_set_version, &group.rule_group_name);
        let Some(notes) = self.partition_notes(&partition, cancel).await else {
            return;
        };
        for rule in group.rules.iter_mut() {
            rule.note = notes.get(&managed_rule_row(&rule.rule_id)).cloned();
        }
    }

    async fn point_note(&self, target: &NoteTarget, cancel: &CancellationToken) -> Option<String> {
        if cancel.is_cancelled() {
            return None;
        }
        let key = derive_key(target);
        match self.store.get(&key).await {
            Ok(record) => record.map(|r| r.content),
            Err(e) => {
                warn!(key = %key, error = %e, "note lookup failed, continuing without note");
                None
            }
        }
    }

    /// Row key → content for one partition, or `None` if the query failed
    /// or was not issued.
    async fn partition_notes(
        &self,
        partition: &str,
        cancel: &CancellationToken,
    ) -> Option<HashMap<String, String>> {
        if cancel.is_cancelled() {
            return None;
        }
        match self.store.query_partition(partition).await {
            Ok(records) => Some(
                records
                    .into_iter()
                    .map(|r| (r.row_key, r.content))
                    .collect(),
            ),
            Err(e) => {
                warn!(partition, error = %e, "partition query failed, continuing without notes");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use waflens_core::{
        CustomRule, EntityType, ManagedRuleOverride, ManagedRuleSet, MatchCondition, MatchValue,
        NoteRequest, PolicyKind, PolicySettings, RuleAction, RuleState, RuleType,
    };

    use super::*;
    use crate::fakes::CountingStore;
    use crate::notes::NotesService;

    fn custom_rule(name: &str, values: &[&[&str]]) -> CustomRule {
        CustomRule {
            name: name.into(),
            priority: 10,
            enabled_state: RuleState::Enabled,
            action: RuleAction::Block,
            rule_type: RuleType::MatchRule,
            rate_limit_threshold: None,
            rate_limit_duration_minutes: None,
            match_conditions: values
                .iter()
                .map(|vs| MatchCondition {
                    match_variable: "RemoteAddr".into(),
                    operator: "IPMatch".into(),
                    negate_condition: false,
                    selector: None,
                    match_values: vs.iter().map(|v| MatchValue::new(*v)).collect(),
                    transforms: vec![],
                })
                .collect(),
            note: None,
        }
    }

    fn rule_group(name: &str, ids: &[&str]) -> RuleGroupOverride {
        RuleGroupOverride {
            rule_group_name: name.into(),
            exclusions: vec![],
            disabled_rules: vec![],
            rules: ids
                .iter()
                .map(|id| ManagedRuleOverride {
                    rule_id: (*id).into(),
                    state: RuleState::Disabled,
                    action: None,
                    exclusions: vec![],
                    note: None,
                })
                .collect(),
        }
    }

    fn sample_policy() -> WafPolicy {
        WafPolicy {
            name: "edge-waf-01".into(),
            id: None,
            kind: PolicyKind::FrontDoor,
            subscription_name: "Production".into(),
            subscription_id: "sub-1".into(),
            resource_group_name: "rg-edge".into(),
            settings: PolicySettings::default(),
            linked_resources: vec![],
            managed_rule_sets: vec![ManagedRuleSet {
                rule_set_type: "OWASP".into(),
                rule_set_version: "3.2".into(),
                rule_set_action: None,
                exclusions: vec![],
                rule_group_overrides: vec![
                    rule_group("SQLI", &["942100", "942110"]),
                    rule_group("XSS", &[]),
                ],
            }],
            custom_rules: vec![
                custom_rule("blockBadIp", &[&["203.0.113.5", "10.0.0.0/8"], &["198.51.100.7"]]),
                custom_rule("geoFence", &[]),
            ],
            note: None,
        }
    }

    fn request(entity_type: &str, content: &str) -> NoteRequest {
        NoteRequest {
            entity_type: entity_type.into(),
            notes_content: content.into(),
            waf_policy_name: Some("edge-waf-01".into()),
            ..Default::default()
        }
    }

    async fn seed(service: &NotesService) {
        let cancel = CancellationToken::new();
        let saves = [
            request("Policy", "edge policy"),
            NoteRequest {
                custom_rule_name: Some("blockBadIp".into()),
                ..request("CustomRule", "scanner block")
            },
            NoteRequest {
                custom_rule_name: Some("blockBadIp".into()),
                match_condition_index: Some(0),
                match_value: Some("203.0.113.5".into()),
                ..request("MatchValue", "known scanner")
            },
            NoteRequest {
                custom_rule_name: Some("blockBadIp".into()),
                match_condition_index: Some(0),
                match_value: Some("10.0.0.0/8".into()),
                ..request("MatchValue", "internal range")
            },
            NoteRequest {
                managed_rule_set_type: Some("OWASP".into()),
                managed_rule_set_version: Some("3.2".into()),
                rule_group_name: Some("SQLI".into()),
                rule_id: Some("942100".into()),
                ..request("ManagedRuleOverride", "false positive on search")
            },
        ];
        for save in saves {
            service.save_note(save, &cancel).await.unwrap();
        }
    }

    #[tokio::test]
    async fn saved_notes_appear_on_the_next_enrichment() {
        let store = Arc::new(CountingStore::default());
        seed(&NotesService::new(store.clone())).await;

        let overlay = NotesOverlay::new(store.clone());
        let policy = overlay
            .enrich(sample_policy(), &CancellationToken::new())
            .await;

        assert_eq!(policy.note.as_deref(), Some("edge policy"));
        let rule = &policy.custom_rules[0];
        assert_eq!(rule.note.as_deref(), Some("scanner block"));
        let values = &rule.match_conditions[0].match_values;
        assert_eq!(values[0].note.as_deref(), Some("known scanner"));
        assert_eq!(values[1].note.as_deref(), Some("internal range"));
        assert_eq!(rule.match_conditions[1].match_values[0].note, None);
        assert_eq!(policy.custom_rules[1].note, None);

        let sqli = &policy.managed_rule_sets[0].rule_group_overrides[0];
        assert_eq!(sqli.rules[0].note.as_deref(), Some("false positive on search"));
        assert_eq!(sqli.rules[1].note, None);
        assert_eq!(policy.note_count(), 5);
    }

    #[tokio::test]
    async fn note_at_same_index_but_other_condition_does_not_leak() {
        let store = Arc::new(CountingStore::default());
        let service = NotesService::new(store.clone());
        let save = NoteRequest {
            custom_rule_name: Some("blockBadIp".into()),
            match_condition_index: Some(1),
            match_value: Some("203.0.113.5".into()),
            ..request("MatchValue", "wrong condition")
        };
        service.save_note(save, &CancellationToken::new()).await.unwrap();

        let policy = NotesOverlay::new(store)
            .enrich(sample_policy(), &CancellationToken::new())
            .await;
        assert_eq!(policy.note_count(), 0);
    }

    #[tokio::test]
    async fn empty_store_yields_no_notes_and_same_shape() {
        let store = Arc::new(CountingStore::default());
        let original = sample_policy();
        let policy = NotesOverlay::new(store)
            .enrich(original.clone(), &CancellationToken::new())
            .await;
        assert_eq!(policy, original);
    }

    #[tokio::test]
    async fn one_partition_query_per_rule_with_values_and_group_with_overrides() {
        let store = Arc::new(CountingStore::default());
        NotesOverlay::new(store.clone())
            .enrich(sample_policy(), &CancellationToken::new())
            .await;

        // blockBadIp has values, geoFence has none; SQLI has overrides, XSS has none.
        let queried = store.queried_partitions();
        assert_eq!(queried.len(), 2);
        assert!(queried.contains(&"edge-waf-01_blockBadIp".to_string()));
        assert!(queried.contains(&"edge-waf-01_OWASP_3.2_SQLI".to_string()));
        // Policy plus two custom rules.
        assert_eq!(store.point_gets(), 3);
    }

    #[tokio::test]
    async fn failed_partition_query_only_blanks_its_own_subtree() {
        let store = Arc::new(CountingStore::default());
        seed(&NotesService::new(store.clone())).await;
        store.fail_partition_query("edge-waf-01_blockBadIp");

        let policy = NotesOverlay::new(store)
            .enrich(sample_policy(), &CancellationToken::new())
            .await;

        let rule = &policy.custom_rules[0];
        assert_eq!(rule.note.as_deref(), Some("scanner block"));
        assert!(rule.match_conditions[0].match_values.iter().all(|v| v.note.is_none()));
        let sqli = &policy.managed_rule_sets[0].rule_group_overrides[0];
        assert_eq!(sqli.rules[0].note.as_deref(), Some("false positive on search"));
        assert_eq!(policy.note.as_deref(), Some("edge policy"));
    }

    #[tokio::test]
    async fn failed_point_get_keeps_partition_notes() {
        let store = Arc::new(CountingStore::default());
        seed(&NotesService::new(store.clone())).await;
        store.fail_point_ops("edge-waf-01_blockBadIp");

        let policy = NotesOverlay::new(store)
            .enrich(sample_policy(), &CancellationToken::new())
            .await;

        let rule = &policy.custom_rules[0];
        assert!(rule.note.is_none());
        assert!(rule.match_conditions[0].match_values.iter().any(|v| v.note.is_some()));
        assert_eq!(policy.note.as_deref(), Some("edge policy"));
    }

    #[tokio::test]
    async fn cancelled_enrichment_makes_no_store_calls() {
        let store = Arc::new(CountingStore::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let policy = NotesOverlay::new(store.clone())
            .enrich(sample_policy(), &cancel)
            .await;
        assert_eq!(policy.note_count(), 0);
        assert_eq!(store.point_gets(), 0);
        assert!(store.queried_partitions().is_empty());
    }

    #[tokio::test]
    async fn stored_entity_type_matches_target() {
        let store = Arc::new(CountingStore::default());
        seed(&NotesService::new(store.clone())).await;
        let records = store.query_partition("edge-waf-01_blockBadIp").await.unwrap();
        let types: Vec<EntityType> = records.iter().map(|r| r.entity_type).collect();
        assert!(types.contains(&EntityType::CustomRule));
        assert!(types.contains(&EntityType::MatchValue));
    }
}
