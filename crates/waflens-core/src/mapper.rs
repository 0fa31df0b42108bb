//! Normalization of raw policy records into the [`WafPolicy`] tree.
//!
//! Pure and order-preserving. Absent collections become empty vectors. A
//! record missing an identity field (policy name, rule-set type/version,
//! rule-group name, rule id, custom-rule name) is rejected as a whole, since
//! those fields feed note keys and a partial tree would mis-address notes.

use crate::error::MapError;
use crate::policy::{
    CustomRule, Exclusion, ManagedRuleOverride, ManagedRuleSet, MatchCondition, MatchValue,
    PolicyKind, PolicySettings, RuleAction, RuleGroupOverride, RuleState, RuleType, WafPolicy,
};
use crate::raw::{
    RawCustomRule, RawExclusion, RawManagedRuleOverride, RawManagedRuleSet, RawMatchCondition,
    RawResourceLink, RawRuleGroupOverride, RawWafPolicy,
};

/// Where in the hierarchy a policy was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyScope {
    pub subscription_name: String,
    pub subscription_id: String,
    pub resource_group_name: String,
}

pub fn map_policy(raw: &RawWafPolicy, scope: &PolicyScope) -> Result<WafPolicy, MapError> {
    let name = non_empty(raw.name.as_deref())
        .ok_or_else(|| MapError::missing("name", format!("resource {:?}", raw.id)))?;

    let props = raw.properties.as_ref();

    let settings = props
        .and_then(|p| p.policy_settings.as_ref())
        .map(|s| PolicySettings {
            enabled_state: s.enabled_state.as_deref().map(RuleState::from),
            mode: s.mode.clone(),
            sku: None,
        })
        .unwrap_or_default();
    let settings = PolicySettings {
        sku: raw.sku.as_ref().and_then(|s| s.name.clone()),
        ..settings
    };

    let linked_resources: Vec<String> = props
        .map(|p| {
            [
                &p.frontend_endpoint_links,
                &p.routing_rule_links,
                &p.security_policy_links,
            ]
            .into_iter()
            .flat_map(|links| links.iter().flatten())
            .filter_map(|link: &RawResourceLink| link.id.clone())
            .collect()
        })
        .unwrap_or_default();

    let managed_rule_sets = props
        .and_then(|p| p.managed_rules.as_ref())
        .and_then(|m| m.managed_rule_sets.as_deref())
        .unwrap_or_default()
        .iter()
        .map(|set| map_rule_set(&name, set))
        .collect::<Result<Vec<_>, _>>()?;

    let custom_rules = props
        .and_then(|p| p.custom_rules.as_ref())
        .and_then(|c| c.rules.as_deref())
        .unwrap_or_default()
        .iter()
        .map(|rule| map_custom_rule(&name, rule))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WafPolicy {
        name,
        id: raw.id.clone(),
        kind: PolicyKind::FrontDoor,
        subscription_name: scope.subscription_name.clone(),
        subscription_id: scope.subscription_id.clone(),
        resource_group_name: scope.resource_group_name.clone(),
        settings,
        linked_resources,
        managed_rule_sets,
        custom_rules,
        note: None,
    })
}

// ── Managed rules ──

fn map_rule_set(policy: &str, raw: &RawManagedRuleSet) -> Result<ManagedRuleSet, MapError> {
    let rule_set_type = non_empty(raw.rule_set_type.as_deref())
        .ok_or_else(|| MapError::missing("ruleSetType", format!("policy {policy}")))?;
    let rule_set_version = non_empty(raw.rule_set_version.as_deref()).ok_or_else(|| {
        MapError::missing(
            "ruleSetVersion",
            format!("policy {policy}, rule set {rule_set_type}"),
        )
    })?;

    let rule_group_overrides = raw
        .rule_group_overrides
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|group| map_rule_group(policy, &rule_set_type, group))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ManagedRuleSet {
        rule_set_action: raw.rule_set_action.as_deref().map(RuleAction::from),
        exclusions: map_exclusions(raw.exclusions.as_deref()),
        rule_set_type,
        rule_set_version,
        rule_group_overrides,
    })
}

fn map_rule_group(
    policy: &str,
    rule_set_type: &str,
    raw: &RawRuleGroupOverride,
) -> Result<RuleGroupOverride, MapError> {
    let rule_group_name = non_empty(raw.rule_group_name.as_deref()).ok_or_else(|| {
        MapError::missing(
            "ruleGroupName",
            format!("policy {policy}, rule set {rule_set_type}"),
        )
    })?;

    let rules = raw
        .rules
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|rule| map_managed_rule(policy, &rule_group_name, rule))
        .collect::<Result<Vec<_>, _>>()?;

    let disabled_rules = rules
        .iter()
        .filter(|rule| rule.state == RuleState::Disabled)
        .map(|rule| rule.rule_id.clone())
        .collect();

    Ok(RuleGroupOverride {
        exclusions: map_exclusions(raw.exclusions.as_deref()),
        rule_group_name,
        disabled_rules,
        rules,
    })
}

fn map_managed_rule(
    policy: &str,
    group: &str,
    raw: &RawManagedRuleOverride,
) -> Result<ManagedRuleOverride, MapError> {
    let rule_id = non_empty(raw.rule_id.as_deref())
        .ok_or_else(|| MapError::missing("ruleId", format!("policy {policy}, group {group}")))?;
    Ok(ManagedRuleOverride {
        rule_id,
        // The service treats an override without a state as disabled.
        state: raw
            .enabled_state
            .as_deref()
            .map(RuleState::from)
            .unwrap_or(RuleState::Disabled),
        action: raw.action.as_deref().map(RuleAction::from),
        exclusions: map_exclusions(raw.exclusions.as_deref()),
        note: None,
    })
}

fn map_exclusions(raw: Option<&[RawExclusion]>) -> Vec<Exclusion> {
    raw.unwrap_or_default()
        .iter()
        .map(|e| Exclusion {
            match_variable: e.match_variable.clone().unwrap_or_default(),
            selector_match_operator: e.selector_match_operator.clone().unwrap_or_default(),
            selector: e.selector.clone().unwrap_or_default(),
        })
        .collect()
}

// ── Custom rules ──

fn map_custom_rule(policy: &str, raw: &RawCustomRule) -> Result<CustomRule, MapError> {
    let name = non_empty(raw.name.as_deref()).ok_or_else(|| {
        MapError::missing(
            "name",
            format!("policy {policy}, custom rule priority {}", raw.priority),
        )
    })?;

    let match_conditions = raw
        .match_conditions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(map_match_condition)
        .collect();

    Ok(CustomRule {
        name,
        priority: raw.priority,
        enabled_state: raw
            .enabled_state
            .as_deref()
            .map(RuleState::from)
            .unwrap_or(RuleState::Enabled),
        action: RuleAction::from(raw.action.as_deref().unwrap_or_default()),
        rule_type: RuleType::from(raw.rule_type.as_deref().unwrap_or_default()),
        rate_limit_threshold: raw.rate_limit_threshold,
        rate_limit_duration_minutes: raw.rate_limit_duration_in_minutes,
        match_conditions,
        note: None,
    })
}

fn map_match_condition(raw: &RawMatchCondition) -> MatchCondition {
    MatchCondition {
        match_variable: raw.match_variable.clone().unwrap_or_default(),
        operator: raw.operator.clone().unwrap_or_default(),
        negate_condition: raw.negate_condition.unwrap_or(false),
        selector: raw.selector.clone().filter(|s| !s.is_empty()),
        match_values: raw
            .match_value
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(MatchValue::new)
            .collect(),
        transforms: raw.transforms.clone().unwrap_or_default(),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
