//! # Watch Loop
//!
//! Re-reads the configuration file on every pass, refreshes the recorded
//! state from Fastly and applies whatever drifted. Failures back off along
//! the Fibonacci sequence; successes wait the regular interval.

use super::backoff::BackoffState;
use super::ReconcilerError;
use crate::model::{ServiceConfig, ServiceState};
use crate::observability::metrics;
use crate::server::ServerState;
use crate::service::ServiceReconciler;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, Instrument};

/// Files one watch loop reconciles
#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub config_path: PathBuf,
    pub state_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Remote service already matched the configuration
    InSync,
    /// Changes were applied (or a new service was created)
    Applied,
}

/// One reconciliation pass: load, refresh, apply if anything drifted, save.
///
/// # Errors
/// Returns an error if the files cannot be read or written, or if the
/// refresh or apply fails. State is saved before an apply error is returned
/// so a created service id is never lost.
pub async fn reconcile(
    reconciler: &ServiceReconciler,
    target: &WatchTarget,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let span = info_span!(
        "controller.reconcile",
        config = %target.config_path.display(),
        state = %target.state_path.display()
    );
    async {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let result = reconcile_once(reconciler, target).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_reconciliation_errors();
        }
        result.map_err(ReconcilerError::from)
    }
    .instrument(span)
    .await
}

async fn reconcile_once(
    reconciler: &ServiceReconciler,
    target: &WatchTarget,
) -> anyhow::Result<ReconcileOutcome> {
    let config = ServiceConfig::load(&target.config_path)?;
    let mut state = ServiceState::load(&target.state_path)?;

    let plan = reconciler.plan(&mut state, &config).await?;
    let in_sync = plan.is_empty();
    if in_sync {
        debug!("Service {} is in sync", config.name);
    } else {
        metrics::increment_drift_detected();
        info!("Drift detected for service {}:\n{}", config.name, plan);
    }

    let applied = reconciler.execute(&mut state, &config, &plan).await;
    state
        .save(&target.state_path)
        .context("Failed to save state after apply")?;
    applied?;
    Ok(if in_sync {
        ReconcileOutcome::InSync
    } else {
        ReconcileOutcome::Applied
    })
}

/// Reconcile every `interval` until interrupted.
///
/// Readiness turns on after the first successful pass and off again on
/// shutdown.
///
/// # Errors
/// Only fails if the shutdown signal handler cannot be installed
pub async fn run_watch_loop(
    reconciler: Arc<ServiceReconciler>,
    target: WatchTarget,
    interval: Duration,
    mut backoff: BackoffState,
    server_state: Arc<ServerState>,
) -> anyhow::Result<()> {
    info!(
        "Watching {} every {}s",
        target.config_path.display(),
        interval.as_secs()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let delay = match reconcile(&reconciler, &target).await {
            Ok(outcome) => {
                debug!("Reconciliation finished: {:?}", outcome);
                backoff.reset();
                server_state.is_ready.store(true, Ordering::Relaxed);
                interval
            }
            Err(e) => {
                let delay = backoff.record_failure();
                error!(
                    "{:#} (attempt {}, retrying in {}s)",
                    anyhow::Error::from(e),
                    backoff.error_count(),
                    delay.as_secs()
                );
                delay
            }
        };

        tokio::select! {
            signal = &mut shutdown => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("Received shutdown signal, stopping watch loop");
                server_state.is_ready.store(false, Ordering::Relaxed);
                break;
            }
            () = tokio::time::sleep(delay) => {}
        }
    }

    info!("Watch loop stopped");
    Ok(())
}
