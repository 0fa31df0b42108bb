//! Resource-management API access: the tenant-scoped client contract and,
//! behind the `http` feature, its REST implementation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use waflens_core::raw::RawWafPolicy;
use waflens_core::{ResourceGroup, Subscription, Tenant};

mod error;
pub use error::ArmError;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod token;

#[cfg(feature = "http")]
pub use http::{ArmClient, HttpClientFactory};
#[cfg(feature = "http")]
pub use token::{AzureCliToken, StaticToken, TokenProvider};

/// Which directory a client's credentials are issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantScope {
    /// The signed-in identity's home tenant. Enough for listing tenants.
    Home,
    Tenant(String),
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("home"),
            Self::Tenant(id) => f.write_str(id),
        }
    }
}

/// Mints clients bound to a tenant's credentials.
///
/// This is the only place that knows how credentials are obtained; callers
/// never rebind a client to another tenant.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn client_for(&self, scope: &TenantScope) -> Result<Arc<dyn ScopedClient>, ArmError>;
}

/// Read-only view of the resource hierarchy under one set of credentials.
///
/// Point lookups return `Ok(None)` for resources that do not exist. Policy
/// listings yield one result per item so a malformed item does not hide its
/// siblings; the outer error is reserved for failing to enumerate at all.
#[async_trait]
pub trait ScopedClient: Send + Sync {
    async fn list_tenants(&self) -> Result<Vec<Tenant>, ArmError>;

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, ArmError>;

    async fn get_subscription(&self, subscription_id: &str)
    -> Result<Option<Subscription>, ArmError>;

    async fn list_resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ResourceGroup>, ArmError>;

    async fn get_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
    ) -> Result<Option<ResourceGroup>, ArmError>;

    async fn list_waf_policies(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<Result<RawWafPolicy, ArmError>>, ArmError>;

    /// Every policy in the subscription regardless of resource group.
    async fn list_subscription_waf_policies(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<Result<RawWafPolicy, ArmError>>, ArmError>;
}

/// Resource group name embedded in a resource id
/// (`/subscriptions/{s}/resourceGroups/{name}/providers/...`).
pub fn resource_group_from_id(id: &str) -> Option<&str> {
    let mut segments = id.split('/');
    segments
        .by_ref()
        .find(|s| s.eq_ignore_ascii_case("resourceGroups"))?;
    segments.next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_group_is_read_from_id() {
        let id = "/subscriptions/sub-1/resourceGroups/rg-edge/providers/Microsoft.Network/FrontDoorWebApplicationFirewallPolicies/edgewaf01";
        assert_eq!(resource_group_from_id(id), Some("rg-edge"));
        let lower = "/subscriptions/sub-1/resourcegroups/RG-Edge/providers/x/y";
        assert_eq!(resource_group_from_id(lower), Some("RG-Edge"));
        assert_eq!(resource_group_from_id("/subscriptions/sub-1"), None);
    }

    #[test]
    fn tenant_scope_display() {
        assert_eq!(TenantScope::Home.to_string(), "home");
        assert_eq!(TenantScope::Tenant("t-1".into()).to_string(), "t-1");
    }
}
