//! Command-line and environment configuration.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `WAFLENS_NOTES_DB` | (none) | DuckDB file for notes; in-memory when unset |
//! | `WAFLENS_ARM_ENDPOINT` | `https://management.azure.com` | Resource-management endpoint |
//! | `WAFLENS_ARM_TOKEN` | (none) | Static bearer token; Azure CLI tokens when unset |
//! | `WAFLENS_LOG` | info | Log level or filter directive |
//! | `WAFLENS_TIMEOUT_SECS` | 300 | Deadline for a whole command |

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// DuckDB file holding notes. Notes are not persisted when unset.
    #[arg(long, global = true, env = "WAFLENS_NOTES_DB")]
    pub notes_db: Option<PathBuf>,

    /// Resource-management endpoint.
    #[arg(long, global = true, env = "WAFLENS_ARM_ENDPOINT")]
    pub arm_endpoint: Option<String>,

    /// Bearer token for the resource-management API. Uses `az` when unset.
    #[arg(long, global = true, env = "WAFLENS_ARM_TOKEN", hide_env_values = true)]
    pub arm_token: Option<String>,

    /// Log level (error, warn, info, debug, trace) or an EnvFilter directive.
    #[arg(long, global = true, env = "WAFLENS_LOG", default_value = "info")]
    pub log_level: String,

    /// Cancel the command after this many seconds.
    #[arg(long, global = true, env = "WAFLENS_TIMEOUT_SECS", default_value = "300")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
