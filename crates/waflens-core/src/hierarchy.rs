//! Tenancy hierarchy entities above the policy level.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    /// Falls back to the tenant id when the directory has no display name.
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub display_name: String,
    /// Lifecycle state as reported by the directory, e.g. "Enabled".
    pub state: Option<String>,
    /// Home tenant of the subscription, when the listing reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub name: String,
    /// Full resource id, e.g. `/subscriptions/<sub>/resourceGroups/<name>`.
    pub id: String,
    pub location: Option<String>,
}
