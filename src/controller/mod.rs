//! # Controller
//!
//! Runs reconciliations against the files on disk.
//!
//! - `backoff`: Fibonacci backoff between failed reconciliations
//! - `watch`: one-shot reconcile and the periodic drift-correction loop

pub mod backoff;
pub mod watch;

pub use backoff::{BackoffState, FibonacciBackoff};
pub use watch::{reconcile, run_watch_loop, ReconcileOutcome, WatchTarget};

#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}
