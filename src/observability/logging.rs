//! # Logging
//!
//! `tracing` subscriber setup. `RUST_LOG` wins when set; otherwise the
//! configured `LOG_LEVEL` applies to this crate only.

use crate::config::ControllerConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Returns an error string if one is already set.
///
/// # Errors
/// Fails when a global subscriber has already been installed
pub fn init_tracing(config: &ControllerConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "fastly_service_controller={},warn",
            config.log_level.to_lowercase()
        )
        .into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.json_logs() {
        builder
            .json()
            .with_current_span(true)
            .try_init()
            .map_err(|e| e.to_string())
    } else {
        builder
            .with_ansi(config.log_enable_color)
            .try_init()
            .map_err(|e| e.to_string())
    }
}
