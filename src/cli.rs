//! # CLI
//!
//! Command-line surface of `fastly-service-controller`.
//!
//! ```bash
//! # Show what would change
//! fastly-service-controller plan --config service.yaml
//!
//! # Create or update the service
//! fastly-service-controller apply --config service.yaml
//!
//! # Adopt an existing service, then refresh the recorded state
//! fastly-service-controller import SU1Z0isxPaozGVKXdv0eY
//! fastly-service-controller refresh
//!
//! # Delete the service, deactivating it first
//! fastly-service-controller destroy --force
//!
//! # Keep correcting drift, serving /metrics, /healthz and /readyz
//! fastly-service-controller watch --config service.yaml
//! ```

use crate::api::FastlyClient;
use crate::config::ControllerConfig;
use crate::controller::{run_watch_loop, BackoffState, WatchTarget};
use crate::model::{ServiceConfig, ServiceState};
use crate::observability::metrics;
use crate::server::{start_server, ServerState};
use crate::service::ServiceReconciler;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Declarative controller for Fastly CDN services
#[derive(Debug, Parser)]
#[command(name = "fastly-service-controller")]
#[command(
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("BUILD_GIT_HASH"),
        ", built ",
        env!("BUILD_DATETIME"),
        ")"
    ),
    about = "Reconcile a Fastly service with a YAML description",
    long_about = None,
    after_help = "\
Environment:
  FASTLY_API_KEY   API token (required)
  FASTLY_API_URL   API endpoint (default https://api.fastly.com)
  LOG_LEVEL        ERROR, WARN, INFO, DEBUG or TRACE
  LOG_FORMAT       text or json
"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Service configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "FASTLY_SERVICE_CONFIG",
        default_value = "service.yaml"
    )]
    pub config: PathBuf,

    /// Recorded state file
    #[arg(
        short,
        long,
        global = true,
        env = "FASTLY_SERVICE_STATE",
        default_value = "fastly-state.json"
    )]
    pub state: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Refresh the recorded state and show the changes apply would make
    Plan {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Create or update the service so it matches the configuration
    Apply,
    /// Refresh the recorded state from the active version
    Refresh,
    /// Record an existing service in the state file
    Import {
        /// Fastly service id
        #[arg(value_name = "SERVICE_ID")]
        service_id: String,
    },
    /// Delete the service recorded in the state file
    Destroy {
        /// Deactivate the active version first, whatever the configuration says
        #[arg(long)]
        force: bool,
    },
    /// Reconcile periodically until interrupted
    Watch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Run one CLI command to completion
///
/// # Errors
/// Returns an error if the command fails
pub async fn run(cli: Cli, controller_config: ControllerConfig) -> Result<()> {
    let client = FastlyClient::from_env(&controller_config)?;
    let reconciler = Arc::new(ServiceReconciler::new(
        Arc::new(client),
        controller_config.version_settle_delay(),
    ));

    match cli.command {
        Commands::Plan { output } => {
            let config = ServiceConfig::load(&cli.config)?;
            let mut state = ServiceState::load(&cli.state)?;
            let plan = reconciler.plan(&mut state, &config).await?;
            // Also records a service that vanished since the last run
            if state.exists_remotely() || cli.state.exists() {
                state.save(&cli.state)?;
            }
            match output {
                OutputFormat::Text => print!("{plan}"),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?
                ),
            }
        }
        Commands::Apply => {
            let config = ServiceConfig::load(&cli.config)?;
            let mut state = ServiceState::load(&cli.state)?;
            let applied = reconciler.apply(&mut state, &config).await;
            state.save(&cli.state)?;
            applied?;
            info!(
                "Service {} is at version {}",
                state.config.name, state.active_version
            );
        }
        Commands::Refresh => {
            let mut state = ServiceState::load(&cli.state)?;
            if !state.exists_remotely() {
                warn!("No service recorded in {}", cli.state.display());
                return Ok(());
            }
            reconciler.read(&mut state).await?;
            state.save(&cli.state)?;
        }
        Commands::Import { service_id } => {
            let mut state = reconciler.import(&service_id).await?;
            // Local-only settings come from the configuration when there is one
            if let Ok(config) = ServiceConfig::load(&cli.config) {
                state.config.adopt_local_settings(&config);
            }
            state.save(&cli.state)?;
        }
        Commands::Destroy { force } => {
            let mut state = ServiceState::load(&cli.state)?;
            if !state.exists_remotely() {
                warn!("No service recorded in {}", cli.state.display());
                return Ok(());
            }
            if force {
                state.config.force_destroy = true;
            }
            reconciler.delete(&mut state).await?;
            ServiceState::remove(&cli.state)?;
        }
        Commands::Watch => {
            watch(reconciler, &cli, &controller_config).await?;
        }
    }
    Ok(())
}

async fn watch(
    reconciler: Arc<ServiceReconciler>,
    cli: &Cli,
    controller_config: &ControllerConfig,
) -> Result<()> {
    let server_state = Arc::new(ServerState::default());

    if controller_config.enable_metrics {
        metrics::register_metrics()?;
        let port = controller_config.metrics_port;
        let state = Arc::clone(&server_state);
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    run_watch_loop(
        reconciler,
        WatchTarget {
            config_path: cli.config.clone(),
            state_path: cli.state.clone(),
        },
        controller_config.watch_interval(),
        BackoffState::new(
            controller_config.backoff_min_minutes,
            controller_config.backoff_max_minutes,
        ),
        server_state,
    )
    .await
}
