//! REST adapter for the resource-management API.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use waflens_core::raw::{RawResourceGroup, RawSubscription, RawTenant, RawWafPolicy};
use waflens_core::{ResourceGroup, Subscription, Tenant};

use crate::token::{AzureCliToken, StaticToken, TokenProvider};
use crate::{ArmError, ClientFactory, ScopedClient, TenantScope};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const SUBSCRIPTIONS_API: &str = "2022-12-01";
const RESOURCE_GROUPS_API: &str = "2021-04-01";
const FRONT_DOOR_WAF_API: &str = "2024-02-01";

const WAF_PROVIDER: &str = "providers/Microsoft.Network/FrontDoorWebApplicationFirewallPolicies";

/// Characters left as-is in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'(')
    .remove(b')');

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    value: Vec<Value>,
    next_link: Option<String>,
}

/// Resource-management client bound to one token source.
///
/// A client bound to a tenant only reports subscriptions whose home tenant
/// matches. A token that spans tenants would otherwise leak them.
pub struct ArmClient {
    client: reqwest::Client,
    base_url: String,
    token: Arc<dyn TokenProvider>,
    tenant: Option<String>,
}

impl ArmClient {
    /// `base_url` should be like `https://management.azure.com` (a trailing
    /// slash is trimmed).
    pub fn new(base_url: &str, token: Arc<dyn TokenProvider>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, token: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            tenant: None,
        }
    }

    pub fn for_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Subscriptions that report no tenant are kept.
    fn in_tenant(&self, subscription: &Subscription) -> bool {
        match (&self.tenant, &subscription.tenant_id) {
            (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
            _ => true,
        }
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}/{}?api-version={}", self.base_url, path, api_version)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, ArmError> {
        let token = self.token.token().await?;
        debug!(url, "ARM GET");
        Ok(self.client.get(url).bearer_auth(&token).send().await?)
    }

    /// Point get. 404 is `Ok(None)`.
    async fn get_one<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, ArmError> {
        let resp = self.send(url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(url, "resource not found");
            return Ok(None);
        }
        let body = check(resp).await?.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Every item across all pages, following `nextLink`. Stops if a link
    /// comes back that was already fetched.
    async fn list_all(&self, first: String) -> Result<Vec<Value>, ArmError> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(first);
        while let Some(url) = next {
            if !seen.insert(url.clone()) {
                warn!(url, "nextLink repeats an earlier page, stopping");
                break;
            }
            let body = check(self.send(&url).await?).await?.text().await?;
            let page: Page = serde_json::from_str(&body)?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }
        Ok(items)
    }

    async fn list_as<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, ArmError> {
        self.list_all(url)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(ArmError::from))
            .collect()
    }

    async fn list_policies(&self, url: String) -> Result<Vec<Result<RawWafPolicy, ArmError>>, ArmError> {
        let items = self.list_all(url).await?;
        debug!(count = items.len(), "listed WAF policies");
        Ok(items.into_iter().map(parse_policy).collect())
    }
}

fn seg(s: &str) -> String {
    utf8_percent_encode(s, PATH_SEGMENT).to_string()
}

fn parse_policy(item: Value) -> Result<RawWafPolicy, ArmError> {
    let id = ["id", "name"]
        .iter()
        .find_map(|field| item.get(field).and_then(Value::as_str))
        .unwrap_or("<unknown>")
        .to_string();
    serde_json::from_value(item).map_err(|source| ArmError::Malformed { id, source })
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ArmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ArmError::Server {
        status: status.as_u16(),
        message: parse_arm_error(&body),
    })
}

/// `code: message` from an ARM error body, or the trimmed body itself.
fn parse_arm_error(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|v| v.get("error").or_else(|| v.get("Error")));
    match detail {
        Some(err) => {
            let code = err.get("code").and_then(Value::as_str).unwrap_or("Unknown");
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            format!("{code}: {message}")
        }
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.trim().to_string(),
    }
}

#[async_trait]
impl ScopedClient for ArmClient {
    async fn list_tenants(&self) -> Result<Vec<Tenant>, ArmError> {
        let raw: Vec<RawTenant> = self.list_as(self.url("tenants", SUBSCRIPTIONS_API)).await?;
        Ok(raw.into_iter().map(Tenant::from).collect())
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, ArmError> {
        let raw: Vec<RawSubscription> = self
            .list_as(self.url("subscriptions", SUBSCRIPTIONS_API))
            .await?;
        let listed = raw.len();
        let subscriptions: Vec<Subscription> = raw
            .into_iter()
            .map(Subscription::from)
            .filter(|s| self.in_tenant(s))
            .collect();
        if subscriptions.len() < listed {
            debug!(
                tenant = ?self.tenant,
                dropped = listed - subscriptions.len(),
                "skipped subscriptions homed in other tenants"
            );
        }
        Ok(subscriptions)
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<Option<Subscription>, ArmError> {
        let url = self.url(&format!("subscriptions/{}", seg(subscription_id)), SUBSCRIPTIONS_API);
        let raw: Option<RawSubscription> = self.get_one(&url).await?;
        Ok(raw.map(Subscription::from).filter(|s| self.in_tenant(s)))
    }

    async fn list_resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroup>, ArmError> {
        let url = self.url(
            &format!("subscriptions/{}/resourcegroups", seg(subscription_id)),
            RESOURCE_GROUPS_API,
        );
        let raw: Vec<RawResourceGroup> = self.list_as(url).await?;
        Ok(raw.into_iter().map(ResourceGroup::from).collect())
    }

    async fn get_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
    ) -> Result<Option<ResourceGroup>, ArmError> {
        let url = self.url(
            &format!("subscriptions/{}/resourcegroups/{}", seg(subscription_id), seg(name)),
            RESOURCE_GROUPS_API,
        );
        let raw: Option<RawResourceGroup> = self.get_one(&url).await?;
        Ok(raw.map(ResourceGroup::from))
    }

    async fn list_waf_policies(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<Result<RawWafPolicy, ArmError>>, ArmError> {
        let url = self.url(
            &format!(
                "subscriptions/{}/resourceGroups/{}/{WAF_PROVIDER}",
                seg(subscription_id),
                seg(resource_group)
            ),
            FRONT_DOOR_WAF_API,
        );
        self.list_policies(url).await
    }

    async fn list_subscription_waf_policies(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<Result<RawWafPolicy, ArmError>>, ArmError> {
        let url = self.url(
            &format!("subscriptions/{}/{WAF_PROVIDER}", seg(subscription_id)),
            FRONT_DOOR_WAF_API,
        );
        self.list_policies(url).await
    }
}

// ── Factory ──

/// Mints [`ArmClient`]s: a configured static token for every scope, or
/// Azure CLI tokens scoped to the requested tenant.
pub struct HttpClientFactory {
    client: reqwest::Client,
    base_url: String,
    static_token: Option<String>,
}

impl HttpClientFactory {
    pub fn new(base_url: Option<String>, static_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            static_token,
        }
    }
}

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn client_for(&self, scope: &TenantScope) -> Result<Arc<dyn ScopedClient>, ArmError> {
        let token: Arc<dyn TokenProvider> = match (&self.static_token, scope) {
            (Some(token), _) => Arc::new(StaticToken(token.clone())),
            (None, TenantScope::Home) => Arc::new(AzureCliToken::new(None)),
            (None, TenantScope::Tenant(id)) => Arc::new(AzureCliToken::new(Some(id.clone()))),
        };
        info!(scope = %scope, endpoint = %self.base_url, "created resource client");
        let client = ArmClient::with_client(self.client.clone(), &self.base_url, token);
        Ok(Arc::new(match scope {
            TenantScope::Home => client,
            TenantScope::Tenant(id) => client.for_tenant(id.clone()),
        }))
    }
}
