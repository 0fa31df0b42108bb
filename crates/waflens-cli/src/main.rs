mod config;
mod display;

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waflens_arm::HttpClientFactory;
use waflens_core::NoteRequest;
use waflens_scan::{
    CancellationToken, NotesOverlay, NotesService, ScanError, ScanRequest, ScanStatus, Scanner,
};
use waflens_store::{DuckNoteStore, MemoryNoteStore, NoteStore};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "waflens", version)]
#[command(about = "Inventory Front Door WAF policies across tenants and keep notes on their rules")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List tenants visible to the signed-in identity.
    Tenants,

    /// List subscriptions in a tenant.
    Subscriptions {
        #[arg(long)]
        tenant: String,
    },

    /// List resource groups that hold at least one WAF policy.
    ResourceGroups {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        subscription: String,
    },

    /// Scan WAF policies and overlay saved notes.
    Scan {
        #[arg(long)]
        tenant: String,
        /// Limit the scan to one subscription.
        #[arg(long)]
        subscription: Option<String>,
        /// Limit the scan to one resource group.
        #[arg(long)]
        resource_group: Option<String>,
        /// Print the report as JSON instead of cards.
        #[arg(long)]
        json: bool,
    },

    /// Read or write notes.
    #[command(subcommand)]
    Note(NoteCommand),
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Save a note, replacing any existing one for the same target.
    Set {
        /// Policy, CustomRule, ManagedRuleOverride or MatchValue.
        entity_type: String,
        #[command(flatten)]
        target: NoteTargetArgs,
        #[arg(long)]
        content: String,
    },

    /// Show the note stored for a target.
    Get {
        entity_type: String,
        #[command(flatten)]
        target: NoteTargetArgs,
    },
}

/// Identifying fields of a note target. Which ones are required depends on
/// the entity type.
#[derive(Debug, Clone, Default, Args)]
struct NoteTargetArgs {
    #[arg(long)]
    policy: Option<String>,
    #[arg(long)]
    rule: Option<String>,
    #[arg(long)]
    condition_index: Option<usize>,
    #[arg(long)]
    value: Option<String>,
    #[arg(long)]
    rule_set_type: Option<String>,
    #[arg(long)]
    rule_set_version: Option<String>,
    #[arg(long)]
    rule_group: Option<String>,
    #[arg(long)]
    rule_id: Option<String>,
    #[arg(long)]
    tenant: Option<String>,
    #[arg(long)]
    subscription: Option<String>,
    #[arg(long)]
    resource_group: Option<String>,
}

impl NoteTargetArgs {
    fn into_request(self, entity_type: String, content: String) -> NoteRequest {
        NoteRequest {
            entity_type,
            notes_content: content,
            tenant_id: self.tenant,
            subscription_id: self.subscription,
            resource_group_name: self.resource_group,
            waf_policy_name: self.policy,
            custom_rule_name: self.rule,
            match_condition_index: self.condition_index,
            match_value: self.value,
            managed_rule_set_type: self.rule_set_type,
            managed_rule_set_version: self.rule_set_version,
            rule_group_name: self.rule_group,
            rule_id: self.rule_id,
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn NoteStore>> {
    match &config.notes_db {
        Some(path) => {
            let store = DuckNoteStore::open_persistent(path)
                .with_context(|| format!("opening notes database {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("no --notes-db configured, notes last only for this run");
            Ok(Arc::new(MemoryNoteStore::new()))
        }
    }
}

/// Cancel `cancel` on Ctrl-C or once `config.timeout()` elapses.
fn spawn_cancel_triggers(config: &Config, cancel: &CancellationToken) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let on_deadline = cancel.clone();
    let timeout = config.timeout();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                warn!(secs = timeout.as_secs(), "deadline reached, cancelling");
                on_deadline.cancel();
            }
            _ = on_deadline.cancelled() => {}
        }
    });
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, ScanError>>,
) -> Result<T, ScanError> {
    tokio::select! {
        result = fut => result,
        _ = cancel.cancelled() => Err(ScanError::Cancelled),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);
    info!("waflens v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cli.config, &cancel);

    let store = open_store(&cli.config)?;
    let factory = Arc::new(HttpClientFactory::new(
        cli.config.arm_endpoint.clone(),
        cli.config.arm_token.clone(),
    ));
    let scanner = Scanner::new(factory, NotesOverlay::new(store.clone()));
    let notes = NotesService::new(store);

    match cli.command {
        Command::Tenants => {
            for tenant in until_cancelled(&cancel, scanner.list_tenants()).await? {
                println!("{:<38} {}", tenant.id, tenant.display_name);
            }
        }
        Command::Subscriptions { tenant } => {
            for sub in until_cancelled(&cancel, scanner.list_subscriptions(&tenant)).await? {
                let state = sub.state.as_deref().unwrap_or("-");
                println!("{:<38} {:<10} {}", sub.id, state, sub.display_name);
            }
        }
        Command::ResourceGroups {
            tenant,
            subscription,
        } => {
            let groups = until_cancelled(
                &cancel,
                scanner.resource_groups_with_policies(&tenant, &subscription),
            )
            .await?;
            for group in groups {
                println!("{group}");
            }
        }
        Command::Scan {
            tenant,
            subscription,
            resource_group,
            json,
        } => {
            let request = ScanRequest {
                tenant_id: tenant,
                subscription_id: subscription,
                resource_group_name: resource_group,
            };
            let report = scanner.scan(&request, &cancel).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_report(&report);
            }
            if report.status != ScanStatus::Complete {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Note(NoteCommand::Set {
            entity_type,
            target,
            content,
        }) => {
            let request = target.into_request(entity_type, content);
            let record = notes.save_note(request, &cancel).await?;
            println!("saved {} note {}", record.entity_type, record.key());
        }
        Command::Note(NoteCommand::Get {
            entity_type,
            target,
        }) => {
            let request = target.into_request(entity_type, String::new());
            let (target, _) = request.validate()?;
            match notes.get_note(&target).await? {
                Some(record) => {
                    println!("{}", record.content);
                    info!(key = %record.key(), updated_at = %record.updated_at, "note found");
                }
                None => {
                    eprintln!("no note for {}", waflens_core::derive_key(&target));
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
