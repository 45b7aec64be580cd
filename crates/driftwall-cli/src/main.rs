//! Driftwall command-line interface: plan, apply and inspect the declared NAS
//! state.

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use driftwall_core::apply::ShareExecutor;
use driftwall_core::{
    compute_diff, document::load_document, logging, stamp_approvals, store_document, ApplyEngine,
    ApplyLock, ApprovalStore, DiffAction, DriftBroadcaster, DriftDetector, DriftwallConfig,
    LiveQuery, NotifyLevel, Plan, ResourceKind, SambaSettings, STARTER_DOCUMENT,
};
use driftwall_host::{SqliteStore, SystemLiveState, SystemTools};
use log::{info, warn};
use schemars::schema_for;
use serde_json::to_string_pretty;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod render;

#[derive(Parser, Debug)]
#[command(
    name = "driftwall",
    version,
    about = "Reconcile a ZFS/SMB appliance against its declared state."
)]
struct Cli {
    /// Path to the Driftwall configuration file.
    #[arg(short, long, default_value = "/etc/driftwall/driftwall.toml")]
    config: PathBuf,

    /// Desired-state document; overrides state.document_path.
    #[arg(short, long, global = true)]
    document: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show what an apply would do.
    Plan {
        /// Emit the plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Execute the plan, honouring recorded approvals.
    Apply {
        /// Skip the interactive confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// Approve a BLOCKED item so the next apply runs it as a delete.
    Approve {
        /// pool, dataset or share.
        kind: ResourceKind,

        name: String,

        /// Why the override is safe; kept in the approval ledger.
        #[arg(long)]
        reason: String,
    },

    /// List recorded approvals.
    Approvals,

    /// Run one drift check and report it. Exits 2 when drift is found.
    Check,

    /// Validate a configuration file and its document, or emit the config schema.
    Validate {
        /// Path to the configuration file to validate.
        #[arg(short = 'f', long, default_value = "/etc/driftwall/driftwall.toml")]
        file: PathBuf,

        /// Output the JSON schema instead of validating a file.
        #[arg(long)]
        schema: bool,
    },

    /// Manage the desired-state document.
    State {
        #[command(subcommand)]
        action: StateCommand,
    },

    /// Take a stored share out of smb.conf, or put it back.
    Share {
        #[command(subcommand)]
        action: ShareCommand,
    },

    /// Print an annotated starter document.
    Template {
        /// Write to this path instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing output file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum StateCommand {
    /// Validate a document and install it as the desired state, then check drift.
    Put {
        /// Document to install.
        file: PathBuf,

        /// Validate only; leave the current document in place.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ShareCommand {
    /// Stop serving a share. A declared share shows as drift until the next apply.
    Disable { name: String },

    /// Serve a previously disabled share again.
    Enable { name: String },
}

/// Collaborators shared by the subcommands that touch the host.
struct Host {
    tools: Arc<SystemTools>,
    store: Arc<SqliteStore>,
    live: Arc<SystemLiveState>,
}

impl Host {
    fn open(config: &DriftwallConfig) -> Result<Self> {
        let tools = Arc::new(SystemTools::from_config(config).context("locate host tools")?);
        let database = config.database_path();
        let store = Arc::new(
            SqliteStore::open(&database)
                .with_context(|| format!("open share database {}", database.display()))?,
        );
        let live = Arc::new(SystemLiveState::new(tools.clone(), store.clone()));
        Ok(Self { tools, store, live })
    }

    fn plan(&self, document: &Path) -> Result<Plan> {
        let desired = load_document(document)
            .with_context(|| format!("load document {}", document.display()))?;
        let live = self.live.read_live_state().context("read live state")?;
        Ok(compute_diff(&desired, &live, self.live.as_ref()))
    }
}

/// Logs drift notifications; the CLI prints its own summary.
struct LogBroadcaster;

impl DriftBroadcaster for LogBroadcaster {
    fn broadcast(&self, event: &str, _data: serde_json::Value, level: NotifyLevel) {
        info!("{event} [{level}]");
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    logging::init("warn");
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file, schema } => {
            if schema {
                let schema = schema_for!(DriftwallConfig);
                println!("{}", to_string_pretty(&schema)?);
                return Ok(());
            }

            let config = load_config(&file)?;
            let document = cli.document.unwrap_or_else(|| config.document_path());
            let desired = load_document(&document)
                .with_context(|| format!("validate document {}", document.display()))?;
            println!(
                "Configuration valid; document {} declares {} pool(s), {} dataset(s), {} share(s).",
                document.display(),
                desired.pools.len(),
                desired.datasets.len(),
                desired.shares.len()
            );
        }
        Commands::Template { output, force } => match output {
            None => print!("{STARTER_DOCUMENT}"),
            Some(path) => {
                ensure!(
                    force || !path.exists(),
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
                fs::write(&path, STARTER_DOCUMENT)
                    .with_context(|| format!("write {}", path.display()))?;
                println!("Starter document written to {}.", path.display());
            }
        },
        Commands::Plan { json } => {
            let config = load_config(&cli.config)?;
            let document = cli.document.unwrap_or_else(|| config.document_path());
            let host = Host::open(&config)?;
            let mut plan = host.plan(&document)?;
            let stamped = stamp_recorded(&host, &mut plan)?;
            if json {
                println!("{}", to_string_pretty(&plan)?);
            } else {
                print!("{}", render::format_plan(&plan));
                if stamped > 0 {
                    println!("{stamped} BLOCKED item(s) carry a recorded approval.");
                }
            }
        }
        Commands::Apply { yes } => {
            let config = load_config(&cli.config)?;
            let document = cli.document.unwrap_or_else(|| config.document_path());
            let host = Host::open(&config)?;
            // Held from planning through execution.
            let lock_path = config.apply_lock_path();
            let _lock = ApplyLock::acquire(&lock_path)
                .with_context(|| format!("lock {}", lock_path.display()))?;
            let mut plan = host.plan(&document)?;
            stamp_recorded(&host, &mut plan)?;

            print!("{}", render::format_plan(&plan));
            if !plan.is_drifted() {
                println!("Nothing to apply.");
                return Ok(());
            }
            if let Some(first) = plan.unapproved_blocked().next() {
                warn!(
                    "plan contains unapproved BLOCKED items; apply will stop at {} {}",
                    first.kind, first.name
                );
            }
            if !yes && !confirm("Type APPLY to execute this plan:")? {
                println!("Apply aborted.");
                return Ok(());
            }

            let engine = ApplyEngine::new(
                host.tools.clone(),
                host.live.clone(),
                host.store.clone(),
                SambaSettings::from(&config.samba),
            );
            match engine.apply_plan(&plan) {
                Ok(result) => {
                    print!("{}", render::format_apply(&result));
                    host.store.clear().context("clear approvals")?;
                }
                Err(failure) => {
                    print!("{}", render::format_apply(&failure.result));
                    return Err(anyhow::Error::new(failure));
                }
            }
        }
        Commands::Approve { kind, name, reason } => {
            ensure!(!reason.trim().is_empty(), "--reason must not be empty");
            let config = load_config(&cli.config)?;
            let document = cli.document.unwrap_or_else(|| config.document_path());
            let host = Host::open(&config)?;
            let plan = host.plan(&document)?;

            let Some(item) = plan.find(kind, &name) else {
                bail!("{kind} {name} is not part of the current plan");
            };
            ensure!(
                item.action == DiffAction::Blocked,
                "{kind} {name} is not BLOCKED (current action: {}); only BLOCKED items can be approved",
                item.action
            );
            host.store
                .approve(kind, &name, reason.trim())
                .context("record approval")?;
            warn!("approval recorded for {kind} {name}: {}", reason.trim());
            println!("Approved {kind} {name}. The next apply will run it as a delete.");
        }
        Commands::Approvals => {
            let config = load_config(&cli.config)?;
            let host = Host::open(&config)?;
            let approvals = host.store.approvals().context("read approvals")?;
            print!("{}", render::format_approvals(&approvals));
        }
        Commands::State {
            action: StateCommand::Put { file, dry_run },
        } => {
            let config = load_config(&cli.config)?;
            let document = cli.document.unwrap_or_else(|| config.document_path());
            let text = fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let desired = store_document(&document, &text, dry_run)
                .with_context(|| format!("validate document {}", file.display()))?;
            let counts = format!(
                "{} pool(s), {} dataset(s), {} share(s)",
                desired.pools.len(),
                desired.datasets.len(),
                desired.shares.len()
            );
            if dry_run {
                println!("Dry run: {} is valid ({counts}); nothing written.", file.display());
                return Ok(());
            }
            println!("Desired state written to {} ({counts}).", document.display());

            let host = Host::open(&config)?;
            let detector = DriftDetector::new(
                document,
                config.drift_interval(),
                host.live.clone(),
                Arc::new(LogBroadcaster),
            );
            let result = detector.check_blocking();
            println!("{}", to_string_pretty(&result.summary())?);
        }
        Commands::Share { action } => {
            let (name, enabled) = match action {
                ShareCommand::Disable { name } => (name, false),
                ShareCommand::Enable { name } => (name, true),
            };
            let config = load_config(&cli.config)?;
            let host = Host::open(&config)?;
            let found = host
                .store
                .set_enabled(&name, enabled)
                .context("update share")?;
            ensure!(found, "no stored share named {name}");

            ShareExecutor::new(
                host.store.clone(),
                host.tools.clone(),
                host.live.clone(),
                SambaSettings::from(&config.samba),
            )
            .publish()
            .context("publish smb.conf")?;
            let word = if enabled { "enabled" } else { "disabled" };
            info!("share {name} {word}");
            println!("Share {name} {word}.");
        }
        Commands::Check => {
            let config = load_config(&cli.config)?;
            let document = cli.document.unwrap_or_else(|| config.document_path());
            let host = Host::open(&config)?;
            let detector = DriftDetector::new(
                document,
                config.drift_interval(),
                host.live.clone(),
                Arc::new(LogBroadcaster),
            );
            let result = detector.check_blocking();
            println!("{}", to_string_pretty(&result.summary())?);
            if let Some(err) = result.error {
                bail!("drift check failed: {err}");
            }
            if result.drifted {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<DriftwallConfig> {
    DriftwallConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Apply recorded approvals to `plan`.
fn stamp_recorded(host: &Host, plan: &mut Plan) -> Result<usize> {
    let approvals = host.store.approvals().context("read approvals")?;
    let keys: Vec<(ResourceKind, String)> = approvals
        .into_iter()
        .map(|approval| (approval.kind, approval.name))
        .collect();
    Ok(stamp_approvals(plan, &keys))
}

fn confirm(prompt: &str) -> Result<bool> {
    println!("{prompt}");
    print!("> ");
    io::stdout().flush().ok();
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim() == "APPLY")
}
