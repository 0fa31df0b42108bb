//! Bearer token sources for the resource-management API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

use crate::ArmError;

const ARM_RESOURCE: &str = "https://management.azure.com";

/// Lifetime assumed when the CLI does not report an expiry.
const DEFAULT_TTL: Duration = Duration::from_secs(45 * 60);

/// Tokens are refreshed this long before they expire.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, ArmError>;
}

/// A fixed token, e.g. from `--arm-token`.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, ArmError> {
        Ok(self.0.clone())
    }
}

/// Tokens from `az account get-access-token`, cached until shortly before
/// expiry. With no tenant the CLI's default (home) tenant is used.
pub struct AzureCliToken {
    tenant_id: Option<String>,
    cache: Mutex<Option<(String, Instant)>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Unix seconds; present in current CLI releases.
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

impl AzureCliToken {
    pub fn new(tenant_id: Option<String>) -> Self {
        Self {
            tenant_id,
            cache: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<(String, Instant), ArmError> {
        let mut cmd = Command::new("az");
        cmd.args([
            "account",
            "get-access-token",
            "--resource",
            ARM_RESOURCE,
            "--output",
            "json",
        ]);
        if let Some(tenant) = &self.tenant_id {
            cmd.args(["--tenant", tenant.as_str()]);
        }
        debug!(tenant = ?self.tenant_id, "requesting token from Azure CLI");

        let output = cmd.output().await.map_err(|e| {
            ArmError::Credential(format!("az CLI not found: {e}. Install Azure CLI or pass --arm-token."))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArmError::Credential(format!(
                "az account get-access-token failed: {}. Run 'az login' first.",
                stderr.trim()
            )));
        }

        let parsed: CliToken = serde_json::from_slice(&output.stdout)
            .map_err(|e| ArmError::Credential(format!("az CLI output parse: {e}")))?;
        Ok((parsed.access_token, expiry_instant(parsed.expires_on)))
    }
}

fn expiry_instant(expires_on: Option<i64>) -> Instant {
    let ttl = expires_on
        .map(|at| at.saturating_sub(Utc::now().timestamp()))
        .map(|secs| Duration::from_secs(u64::try_from(secs).unwrap_or(0)))
        .unwrap_or(DEFAULT_TTL);
    Instant::now() + ttl.saturating_sub(EXPIRY_SKEW)
}

#[async_trait]
impl TokenProvider for AzureCliToken {
    async fn token(&self) -> Result<String, ArmError> {
        let mut cache = self.cache.lock().await;
        if let Some((token, expiry)) = cache.as_ref() {
            if Instant::now() < *expiry {
                return Ok(token.clone());
            }
        }
        let (token, expiry) = self.fetch().await?;
        *cache = Some((token.clone(), expiry));
        Ok(token)
    }
}
