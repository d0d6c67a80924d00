//! Span and metric bookkeeping shared by every API call.

use crate::observability::metrics;
use std::time::{Duration, Instant};
use tracing::Span;

/// Tracks one API operation from request to response
#[derive(Debug)]
pub struct OperationTracker {
    operation: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTracker {
    #[must_use]
    pub fn new(operation: &'static str, span: Span) -> Self {
        Self {
            operation,
            start: Instant::now(),
            span,
        }
    }

    /// Record success on the span and in the operation histogram
    pub fn record_success(&self) {
        let elapsed = self.start.elapsed();
        self.span.record("operation.success", true);
        self.span.record("operation.duration_ms", duration_ms(elapsed));
        metrics::record_api_operation(self.operation, elapsed.as_secs_f64());
    }

    /// Record failure on the span and bump the error counter
    pub fn record_error(&self, status: Option<u16>, error_message: &str) {
        let elapsed = self.start.elapsed();
        self.span.record("operation.success", false);
        self.span.record("operation.duration_ms", duration_ms(elapsed));
        self.span.record("error.message", error_message);
        metrics::record_api_operation(self.operation, elapsed.as_secs_f64());
        metrics::increment_api_errors(self.operation, status);
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
