//! Walks tenant → subscription → resource group → policy and builds a
//! [`ScanReport`].
//!
//! Traversal is sequential so reports come back in a stable order. Failures
//! below the tenant level are recorded as issues and never abort siblings.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use waflens_arm::{ClientFactory, ScopedClient, TenantScope, resource_group_from_id};
use waflens_core::{PolicyScope, Subscription, Tenant, WafPolicy, map_policy};

use crate::{NotesOverlay, ScanError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub tenant_id: String,
    pub subscription_id: Option<String>,
    pub resource_group_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    /// Every branch was read.
    Complete,
    /// At least one subscription, group or policy could not be read.
    Partial,
    /// Nothing could be enumerated for the tenant.
    Failed,
    Cancelled,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// Listing subscriptions, groups or policies failed.
    Enumeration,
    /// A single resource could not be fetched or parsed.
    Fetch,
    /// A policy was fetched but could not be normalized.
    Mapping,
    /// A named subscription or resource group does not exist.
    NotFound,
    /// No client could be created for the tenant.
    Client,
    /// The request itself was unusable, e.g. a blank tenant id.
    Input,
}

impl IssueKind {
    /// Warnings are reported but leave the scan complete.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanIssue {
    pub kind: IssueKind,
    /// Where it happened, e.g. `sub-1/rg-edge/edgewaf01`.
    pub scope: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub policies: Vec<WafPolicy>,
    pub status: ScanStatus,
    pub issues: Vec<ScanIssue>,
}

/// Accumulates results while a scan runs.
#[derive(Default)]
struct ScanRun {
    policies: Vec<WafPolicy>,
    issues: Vec<ScanIssue>,
    aborted: bool,
}

impl ScanRun {
    fn issue(&mut self, kind: IssueKind, scope: impl Into<String>, message: impl fmt::Display) {
        self.issues.push(ScanIssue {
            kind,
            scope: scope.into(),
            message: message.to_string(),
        });
    }

    fn abort(&mut self, kind: IssueKind, scope: impl Into<String>, message: impl fmt::Display) {
        self.issue(kind, scope, message);
        self.aborted = true;
    }

    fn finish(self, cancel: &CancellationToken) -> ScanReport {
        let status = if cancel.is_cancelled() {
            ScanStatus::Cancelled
        } else if self.aborted {
            ScanStatus::Failed
        } else if self.issues.iter().any(|i| i.kind.is_failure()) {
            ScanStatus::Partial
        } else {
            ScanStatus::Complete
        };
        ScanReport {
            policies: self.policies,
            status,
            issues: self.issues,
        }
    }
}

pub struct Scanner {
    factory: Arc<dyn ClientFactory>,
    overlay: NotesOverlay,
}

impl Scanner {
    pub fn new(factory: Arc<dyn ClientFactory>, overlay: NotesOverlay) -> Self {
        Self { factory, overlay }
    }

    // ── Listing ──

    /// Tenants visible to the signed-in identity, sorted by display name.
    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, ScanError> {
        let client = self.factory.client_for(&TenantScope::Home).await?;
        let mut tenants = client.list_tenants().await?;
        tenants.sort_by_cached_key(|t| t.display_name.to_lowercase());
        info!(count = tenants.len(), "listed tenants");
        Ok(tenants)
    }

    /// Subscriptions of a tenant, sorted by display name.
    pub async fn list_subscriptions(&self, tenant_id: &str) -> Result<Vec<Subscription>, ScanError> {
        let tenant = required("tenant id", tenant_id)?;
        let client = self.factory.client_for(&TenantScope::Tenant(tenant)).await?;
        let mut subscriptions = client.list_subscriptions().await?;
        subscriptions.sort_by_cached_key(|s| s.display_name.to_lowercase());
        info!(count = subscriptions.len(), "listed subscriptions");
        Ok(subscriptions)
    }

    /// Names of the resource groups holding at least one policy, sorted.
    ///
    /// Group names compare case-insensitively; the first spelling seen wins.
    pub async fn resource_groups_with_policies(
        &self,
        tenant_id: &str,
        subscription_id: &str,
    ) -> Result<Vec<String>, ScanError> {
        let tenant = required("tenant id", tenant_id)?;
        let subscription = required("subscription id", subscription_id)?;
        let client = self.factory.client_for(&TenantScope::Tenant(tenant)).await?;

        let mut groups = BTreeMap::new();
        for item in client.list_subscription_waf_policies(&subscription).await? {
            let id = match &item {
                Ok(policy) => policy.id.clone(),
                Err(waflens_arm::ArmError::Malformed { id, .. }) => Some(id.clone()),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable policy");
                    None
                }
            };
            if let Some(group) = id.as_deref().and_then(resource_group_from_id) {
                groups
                    .entry(group.to_lowercase())
                    .or_insert_with(|| group.to_string());
            }
        }
        info!(subscription = %subscription, count = groups.len(), "listed resource groups with policies");
        Ok(groups.into_values().collect())
    }

    // ── Scan ──

    /// Scan the requested part of a tenant. Never fails outright: every
    /// problem is recorded in the report and everything read so far is kept.
    pub async fn scan(&self, request: &ScanRequest, cancel: &CancellationToken) -> ScanReport {
        let mut run = ScanRun::default();

        let Some(tenant) = trimmed(Some(&request.tenant_id)) else {
            run.abort(IssueKind::Input, "", ScanError::MissingInput("tenant id"));
            return run.finish(cancel);
        };
        if cancel.is_cancelled() {
            return run.finish(cancel);
        }
        let subscription_id = trimmed(request.subscription_id.as_deref());
        let resource_group = trimmed(request.resource_group_name.as_deref());
        info!(
            tenant = %tenant,
            subscription = ?subscription_id,
            resource_group = ?resource_group,
            "starting scan"
        );

        let client = match self.factory.client_for(&TenantScope::Tenant(tenant.clone())).await {
            Ok(client) => client,
            Err(e) => {
                error!(tenant = %tenant, error = %e, "could not create client for tenant");
                run.abort(IssueKind::Client, &tenant, e);
                return run.finish(cancel);
            }
        };

        let subscriptions = match &subscription_id {
            Some(id) => match client.get_subscription(id).await {
                Ok(Some(subscription)) => vec![subscription],
                Ok(None) => {
                    warn!(subscription = %id, "subscription not found");
                    run.issue(IssueKind::NotFound, id, "subscription not found");
                    Vec::new()
                }
                Err(e) => {
                    error!(subscription = %id, error = %e, "subscription lookup failed");
                    run.abort(IssueKind::Fetch, id, e);
                    Vec::new()
                }
            },
            None => match client.list_subscriptions().await {
                Ok(subscriptions) => subscriptions,
                Err(e) => {
                    error!(tenant = %tenant, error = %e, "subscription enumeration failed");
                    run.abort(IssueKind::Enumeration, &tenant, e);
                    Vec::new()
                }
            },
        };

        for subscription in &subscriptions {
            if cancel.is_cancelled() {
                break;
            }
            self.scan_subscription(
                client.as_ref(),
                subscription,
                resource_group.as_deref(),
                cancel,
                &mut run,
            )
            .await;
        }

        let report = run.finish(cancel);
        info!(
            status = %report.status,
            policies = report.policies.len(),
            issues = report.issues.len(),
            "scan finished"
        );
        report
    }

    async fn scan_subscription(
        &self,
        client: &dyn ScopedClient,
        subscription: &Subscription,
        resource_group: Option<&str>,
        cancel: &CancellationToken,
        run: &mut ScanRun,
    ) {
        info!(subscription = %subscription.id, name = %subscription.display_name, "scanning subscription");

        let groups: Vec<String> = match resource_group {
            Some(name) => match client.get_resource_group(&subscription.id, name).await {
                Ok(Some(group)) => vec![group.name],
                Ok(None) => {
                    warn!(subscription = %subscription.id, resource_group = name, "resource group not found");
                    run.issue(
                        IssueKind::NotFound,
                        format!("{}/{name}", subscription.id),
                        "resource group not found",
                    );
                    Vec::new()
                }
                Err(e) => {
                    warn!(subscription = %subscription.id, resource_group = name, error = %e, "resource group lookup failed");
                    run.issue(IssueKind::Fetch, format!("{}/{name}", subscription.id), e);
                    Vec::new()
                }
            },
            None => match client.list_resource_groups(&subscription.id).await {
                Ok(groups) => groups.into_iter().map(|g| g.name).collect(),
                Err(e) => {
                    warn!(subscription = %subscription.id, error = %e, "resource group enumeration failed");
                    run.issue(IssueKind::Enumeration, &subscription.id, e);
                    Vec::new()
                }
            },
        };

        for group in &groups {
            if cancel.is_cancelled() {
                return;
            }
            self.scan_resource_group(client, subscription, group, cancel, run)
                .await;
        }
    }

    async fn scan_resource_group(
        &self,
        client: &dyn ScopedClient,
        subscription: &Subscription,
        group: &str,
        cancel: &CancellationToken,
        run: &mut ScanRun,
    ) {
        let scope_name = format!("{}/{group}", subscription.id);
        let items = match client.list_waf_policies(&subscription.id, group).await {
            Ok(items) => items,
            Err(e) => {
                warn!(scope = %scope_name, error = %e, "policy enumeration failed");
                run.issue(IssueKind::Enumeration, scope_name, e);
                return;
            }
        };

        let scope = PolicyScope {
            subscription_name: subscription.display_name.clone(),
            subscription_id: subscription.id.clone(),
            resource_group_name: group.to_string(),
        };
        for item in items {
            if cancel.is_cancelled() {
                return;
            }
            let raw = match item {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(scope = %scope_name, error = %e, "skipping unreadable policy");
                    run.issue(IssueKind::Fetch, &scope_name, e);
                    continue;
                }
            };
            let policy = match map_policy(&raw, &scope) {
                Ok(policy) => policy,
                Err(e) => {
                    let name = raw.name.as_deref().unwrap_or("<unnamed>");
                    warn!(scope = %scope_name, policy = name, error = %e, "skipping unmappable policy");
                    run.issue(IssueKind::Mapping, format!("{scope_name}/{name}"), e);
                    continue;
                }
            };
            run.policies.push(self.overlay.enrich(policy, cancel).await);
        }
    }
}

fn trimmed(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(what: &'static str, s: &str) -> Result<String, ScanError> {
    trimmed(Some(s)).ok_or(ScanError::MissingInput(what))
}
