//! In-process doubles for the store and resource API.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use waflens_arm::{ArmError, ClientFactory, ScopedClient, TenantScope};
use waflens_core::raw::RawWafPolicy;
use waflens_core::{NoteKey, NoteRecord, ResourceGroup, Subscription, Tenant};
use waflens_store::{MemoryNoteStore, NoteStore, StoreError};

// ── Store ──

/// Memory store that counts calls. Point operations and partition queries
/// can be told to fail independently.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryNoteStore,
    gets: AtomicUsize,
    upserts: AtomicUsize,
    partitions: Mutex<Vec<String>>,
    failing_points: Mutex<HashSet<String>>,
    failing_queries: Mutex<HashSet<String>>,
}

impl CountingStore {
    pub fn point_gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn queried_partitions(&self) -> Vec<String> {
        self.partitions.lock().unwrap().clone()
    }

    /// Fail `get` and `upsert` for keys in `partition`.
    pub fn fail_point_ops(&self, partition: &str) {
        self.failing_points.lock().unwrap().insert(partition.to_string());
    }

    /// Fail `query_partition` for `partition`.
    pub fn fail_partition_query(&self, partition: &str) {
        self.failing_queries.lock().unwrap().insert(partition.to_string());
    }

    fn check(failing: &Mutex<HashSet<String>>, partition: &str) -> Result<(), StoreError> {
        if failing.lock().unwrap().contains(partition) {
            return Err(StoreError::Other(format!("partition {partition} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl NoteStore for CountingStore {
    async fn get(&self, key: &NoteKey) -> Result<Option<NoteRecord>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.failing_points, &key.partition_key)?;
        self.inner.get(key).await
    }

    async fn upsert(&self, record: &NoteRecord) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.failing_points, &record.partition_key)?;
        self.inner.upsert(record).await
    }

    async fn query_partition(&self, partition_key: &str) -> Result<Vec<NoteRecord>, StoreError> {
        self.partitions.lock().unwrap().push(partition_key.to_string());
        Self::check(&self.failing_queries, partition_key)?;
        self.inner.query_partition(partition_key).await
    }
}

// ── Resource API ──

/// One tenant's worth of resources. Keys are subscription ids, then
/// resource group names.
#[derive(Default, Clone)]
pub struct FakeTenant {
    pub subscriptions: Vec<Subscription>,
    pub groups: HashMap<String, Vec<String>>,
    pub policies: HashMap<(String, String), Vec<Result<RawWafPolicy, String>>>,
    pub failing_groups: HashSet<(String, String)>,
    pub fail_subscription_listing: bool,
}

impl FakeTenant {
    pub fn subscription(mut self, id: &str, name: &str) -> Self {
        self.subscriptions.push(Subscription {
            id: id.into(),
            display_name: name.into(),
            state: Some("Enabled".into()),
            tenant_id: None,
        });
        self
    }

    pub fn group(mut self, subscription: &str, group: &str, policies: Vec<RawWafPolicy>) -> Self {
        self.groups
            .entry(subscription.to_string())
            .or_default()
            .push(group.to_string());
        self.policies.insert(
            (subscription.to_string(), group.to_string()),
            policies.into_iter().map(Ok).collect(),
        );
        self
    }

    /// Append one more policy to an existing group listing.
    pub fn policy(mut self, subscription: &str, group: &str, policy: RawWafPolicy) -> Self {
        self.policies
            .entry((subscription.to_string(), group.to_string()))
            .or_default()
            .push(Ok(policy));
        self
    }

    pub fn malformed_item(mut self, subscription: &str, group: &str, id: &str) -> Self {
        self.policies
            .entry((subscription.to_string(), group.to_string()))
            .or_default()
            .push(Err(id.to_string()));
        self
    }

    pub fn failing_group(mut self, subscription: &str, group: &str) -> Self {
        self.failing_groups
            .insert((subscription.to_string(), group.to_string()));
        self
    }
}

pub fn raw_policy(name: &str) -> RawWafPolicy {
    RawWafPolicy {
        id: Some(format!("/policies/{name}")),
        name: Some(name.into()),
        ..Default::default()
    }
}

/// Policy listed in a subscription-wide query, with a resource id naming its group.
pub fn raw_policy_in(subscription: &str, group: &str, name: &str) -> RawWafPolicy {
    RawWafPolicy {
        id: Some(format!(
            "/subscriptions/{subscription}/resourceGroups/{group}/providers/Microsoft.Network/FrontDoorWebApplicationFirewallPolicies/{name}"
        )),
        name: Some(name.into()),
        ..Default::default()
    }
}

fn unavailable(what: String) -> ArmError {
    ArmError::Server {
        status: 503,
        message: format!("ServiceUnavailable: {what}"),
    }
}

fn malformed(id: String) -> ArmError {
    let source = serde_json::from_str::<RawWafPolicy>(r#"{"name": 5}"#).unwrap_err();
    ArmError::Malformed { id, source }
}

pub struct FakeClient {
    tenants: Vec<Tenant>,
    data: FakeTenant,
}

#[async_trait]
impl ScopedClient for FakeClient {
    async fn list_tenants(&self) -> Result<Vec<Tenant>, ArmError> {
        Ok(self.tenants.clone())
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, ArmError> {
        if self.data.fail_subscription_listing {
            return Err(unavailable("subscriptions".into()));
        }
        Ok(self.data.subscriptions.clone())
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<Option<Subscription>, ArmError> {
        Ok(self
            .data
            .subscriptions
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned())
    }

    async fn list_resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroup>, ArmError> {
        let names = self.data.groups.get(subscription_id).cloned().unwrap_or_default();
        Ok(names
            .into_iter()
            .map(|name| ResourceGroup {
                id: format!("/subscriptions/{subscription_id}/resourceGroups/{name}"),
                name,
                location: None,
            })
            .collect())
    }

    async fn get_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
    ) -> Result<Option<ResourceGroup>, ArmError> {
        let groups = self.list_resource_groups(subscription_id).await?;
        Ok(groups.into_iter().find(|g| g.name == name))
    }

    async fn list_waf_policies(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<Result<RawWafPolicy, ArmError>>, ArmError> {
        let key = (subscription_id.to_string(), resource_group.to_string());
        if self.data.failing_groups.contains(&key) {
            return Err(unavailable(format!("policies in {resource_group}")));
        }
        Ok(self
            .data
            .policies
            .get(&key)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.map_err(malformed))
            .collect())
    }

    async fn list_subscription_waf_policies(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<Result<RawWafPolicy, ArmError>>, ArmError> {
        let mut all = Vec::new();
        for group in self.data.groups.get(subscription_id).cloned().unwrap_or_default() {
            all.extend(self.list_waf_policies(subscription_id, &group).await?);
        }
        Ok(all)
    }
}

/// Hands out [`FakeClient`]s per tenant; unknown tenants fail to mint.
#[derive(Default)]
pub struct FakeFactory {
    pub tenants: Vec<Tenant>,
    pub data: HashMap<String, FakeTenant>,
    pub minted: Mutex<Vec<TenantScope>>,
}

impl FakeFactory {
    pub fn with_tenant(mut self, id: &str, data: FakeTenant) -> Self {
        self.tenants.push(Tenant {
            id: id.into(),
            display_name: id.into(),
        });
        self.data.insert(id.to_string(), data);
        self
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn client_for(&self, scope: &TenantScope) -> Result<Arc<dyn ScopedClient>, ArmError> {
        self.minted.lock().unwrap().push(scope.clone());
        let data = match scope {
            TenantScope::Home => FakeTenant::default(),
            TenantScope::Tenant(id) => self
                .data
                .get(id)
                .cloned()
                .ok_or_else(|| ArmError::Credential(format!("no credentials for tenant {id}")))?,
        };
        Ok(Arc::new(FakeClient {
            tenants: self.tenants.clone(),
            data,
        }))
    }
}
