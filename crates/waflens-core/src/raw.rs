//! Resource shapes as the resource-management API returns them.
//!
//! Field names follow the service's camelCase JSON. Every nested collection
//! is optional because the service omits empty ones; [`crate::mapper`]
//! normalizes them away.

use serde::{Deserialize, Serialize};

use crate::hierarchy::{ResourceGroup, Subscription, Tenant};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTenant {
    pub tenant_id: String,
    pub display_name: Option<String>,
}

impl From<RawTenant> for Tenant {
    fn from(raw: RawTenant) -> Self {
        let display_name = raw
            .display_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| raw.tenant_id.clone());
        Tenant {
            id: raw.tenant_id,
            display_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubscription {
    pub subscription_id: String,
    pub display_name: Option<String>,
    pub state: Option<String>,
    pub tenant_id: Option<String>,
}

impl From<RawSubscription> for Subscription {
    fn from(raw: RawSubscription) -> Self {
        let display_name = raw
            .display_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| raw.subscription_id.clone());
        Subscription {
            id: raw.subscription_id,
            display_name,
            state: raw.state,
            tenant_id: raw.tenant_id.filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResourceGroup {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
}

impl From<RawResourceGroup> for ResourceGroup {
    fn from(raw: RawResourceGroup) -> Self {
        ResourceGroup {
            name: raw.name,
            id: raw.id,
            location: raw.location,
        }
    }
}

/// `Microsoft.Network/FrontDoorWebApplicationFirewallPolicies` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWafPolicy {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub location: Option<String>,
    pub sku: Option<RawSku>,
    pub properties: Option<RawPolicyProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSku {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPolicyProperties {
    pub policy_settings: Option<RawPolicySettings>,
    pub custom_rules: Option<RawCustomRuleList>,
    pub managed_rules: Option<RawManagedRuleSetList>,
    pub frontend_endpoint_links: Option<Vec<RawResourceLink>>,
    pub routing_rule_links: Option<Vec<RawResourceLink>>,
    pub security_policy_links: Option<Vec<RawResourceLink>>,
    pub provisioning_state: Option<String>,
    pub resource_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPolicySettings {
    pub enabled_state: Option<String>,
    pub mode: Option<String>,
    pub redirect_url: Option<String>,
    pub custom_block_response_status_code: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResourceLink {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCustomRuleList {
    pub rules: Option<Vec<RawCustomRule>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCustomRule {
    pub name: Option<String>,
    pub priority: i32,
    pub enabled_state: Option<String>,
    pub rule_type: Option<String>,
    pub rate_limit_duration_in_minutes: Option<u32>,
    pub rate_limit_threshold: Option<u32>,
    pub match_conditions: Option<Vec<RawMatchCondition>>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMatchCondition {
    pub match_variable: Option<String>,
    pub selector: Option<String>,
    pub operator: Option<String>,
    pub negate_condition: Option<bool>,
    pub match_value: Option<Vec<String>>,
    pub transforms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawManagedRuleSetList {
    pub managed_rule_sets: Option<Vec<RawManagedRuleSet>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawManagedRuleSet {
    pub rule_set_type: Option<String>,
    pub rule_set_version: Option<String>,
    pub rule_set_action: Option<String>,
    pub exclusions: Option<Vec<RawExclusion>>,
    pub rule_group_overrides: Option<Vec<RawRuleGroupOverride>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRuleGroupOverride {
    pub rule_group_name: Option<String>,
    pub exclusions: Option<Vec<RawExclusion>>,
    pub rules: Option<Vec<RawManagedRuleOverride>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawManagedRuleOverride {
    pub rule_id: Option<String>,
    pub enabled_state: Option<String>,
    pub action: Option<String>,
    pub exclusions: Option<Vec<RawExclusion>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExclusion {
    pub match_variable: Option<String>,
    pub selector_match_operator: Option<String>,
    pub selector: Option<String>,
}
