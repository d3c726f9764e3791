//! # BAASCTL CLI
//!
//! Command-line interface for reconciling a declared-state file against the
//! control plane.
//!
//! ## Usage
//!
//! ```bash
//! # Create or update everything declared in state.yaml
//! baasctl apply state.yaml
//!
//! # Re-read every provisioned resource and record drift
//! baasctl refresh state.yaml
//!
//! # Delete everything, children first (shared deployments, zones and
//! # services are only detached)
//! baasctl destroy state.yaml
//!
//! # Print the JSON schema of the state file
//! baasctl schema
//! ```
//!
//! Connection settings come from `KALEIDO_API` and `KALEIDO_API_KEY`, read
//! from the environment or a local `.env` file.

use anyhow::{Context, Result};
use baas_reconciler::config::{GatewayConfig, PollerConfig, TimeoutConfig};
use baas_reconciler::controller::{CallContext, Reconciler};
use baas_reconciler::gateway::RestGateway;
use baas_reconciler::observability::{logging, metrics, LogFormat};
use baas_reconciler::state::{FileStateStore, ReportRow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod apply;
mod destroy;
mod refresh;
mod schema;

/// Declarative reconciler for blockchain-platform resources
#[derive(Parser)]
#[command(name = "baasctl")]
#[command(
    about = "Declarative reconciler for blockchain-platform resources",
    long_about = None,
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BAASCTL_GIT_HASH"), ", built ", env!("BAASCTL_BUILD_DATETIME"), ")"),
    after_help = "\
Environment:
  KALEIDO_API        control plane base URL
  KALEIDO_API_KEY    API key sent as a bearer token

Examples:
  baasctl apply state.yaml
  baasctl --timeout 900 apply state.yaml
  baasctl destroy state.yaml --metrics
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deadline for each create, update or delete, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    /// Print Prometheus metrics to stdout on exit
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update every declared resource, in order
    Apply {
        /// Declared-state file
        #[arg(value_name = "STATE_FILE")]
        state: PathBuf,
    },
    /// Read every provisioned resource and record drift
    Refresh {
        /// Declared-state file
        #[arg(value_name = "STATE_FILE")]
        state: PathBuf,
    },
    /// Delete every provisioned resource in reverse order
    Destroy {
        /// Declared-state file
        #[arg(value_name = "STATE_FILE")]
        state: PathBuf,
    },
    /// Print the JSON schema of the declared-state file
    Schema,
}

/// Everything a command needs to talk to the control plane
pub(crate) struct Session {
    pub reconciler: Reconciler,
    pub ctx: CallContext,
    pub store: FileStateStore,
}

impl Session {
    fn connect(state: PathBuf, timeout: Option<u64>, ctx: CallContext) -> Result<Self> {
        let gateway_config = GatewayConfig::from_env()?;
        let gateway = RestGateway::new(&gateway_config)?;
        info!("Using control plane at {}", gateway.base_url());

        let timeouts = timeout.map_or_else(TimeoutConfig::default, |secs| {
            TimeoutConfig::uniform(Duration::from_secs(secs))
        });
        let reconciler = Reconciler::new(Arc::new(gateway), PollerConfig::from_env(), timeouts);

        Ok(Self {
            reconciler,
            ctx,
            store: FileStateStore::new(state),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23 needs a process-wide crypto provider before any TLS use
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env file");
        }
    }
    logging::init(cli.log_format);
    if cli.metrics {
        metrics::register_metrics()?;
    }

    let ctx = CallContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight operation");
            canceller.cancel();
        }
    });

    let result = match cli.command {
        Commands::Apply { state } => {
            let session = Session::connect(state, cli.timeout, ctx)?;
            apply::apply_command(&session).await
        }
        Commands::Refresh { state } => {
            let session = Session::connect(state, cli.timeout, ctx)?;
            refresh::refresh_command(&session).await
        }
        Commands::Destroy { state } => {
            let session = Session::connect(state, cli.timeout, ctx)?;
            destroy::destroy_command(&session).await
        }
        Commands::Schema => schema::schema_command(),
    };

    if cli.metrics {
        print!("{}", metrics::gather_text()?);
    }
    result
}

/// Print one row of the per-resource summary table
pub(crate) fn print_row(row: &ReportRow) {
    println!(
        "{:<24} {:<18} {:<16} {}",
        row.name,
        row.kind.as_str(),
        row.id,
        row.action
    );
}

pub(crate) fn print_header() {
    println!("\n{:<24} {:<18} {:<16} ACTION", "NAME", "KIND", "ID");
    println!("{}", "-".repeat(72));
}
