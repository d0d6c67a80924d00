//! # Fastly Service Controller
//!
//! Reconciles one Fastly CDN service with a YAML description of its
//! domains, backends, logging endpoints, VCL and the rest of its
//! configuration. See [`fastly_service_controller::cli`] for the commands.

use anyhow::Result;
use clap::Parser;
use fastly_service_controller::cli::{self, Cli};
use fastly_service_controller::config::ControllerConfig;
use fastly_service_controller::observability::init_tracing;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // Local .env files are optional
    let _ = dotenvy::dotenv();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let cli = Cli::parse();
    if let Err(e) = init_tracing(&ControllerConfig::logging_from_env()) {
        eprintln!("Failed to initialize logging: {e}");
    }
    let controller_config = ControllerConfig::from_env();

    let result = cli::run(cli, controller_config).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
