//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `fastly_service_reconciliations_total` - Total number of reconciliations
//! - `fastly_service_reconciliation_errors_total` - Total number of reconciliation errors
//! - `fastly_service_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `fastly_service_drift_detected_total` - Reconciliations that found remote drift
//! - `fastly_service_versions_activated_total` - Service versions activated
//! - `fastly_service_blocks_created_total{block}` - Sub-resources created, by block type
//! - `fastly_service_blocks_deleted_total{block}` - Sub-resources deleted, by block type
//! - `fastly_api_operations_total{operation}` - Fastly API calls
//! - `fastly_api_operation_duration_seconds{operation}` - Fastly API call latency
//! - `fastly_api_errors_total{operation,status}` - Failed Fastly API calls

use anyhow::Result;
use prometheus::core::Collector;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "fastly_service_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "fastly_service_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "fastly_service_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static DRIFT_DETECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "fastly_service_drift_detected_total",
        "Total number of reconciliations that found the remote service out of date",
    )
    .expect("Failed to create DRIFT_DETECTED_TOTAL metric - this should never happen")
});

static VERSIONS_ACTIVATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "fastly_service_versions_activated_total",
        "Total number of service versions activated",
    )
    .expect("Failed to create VERSIONS_ACTIVATED_TOTAL metric - this should never happen")
});

static BLOCKS_CREATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fastly_service_blocks_created_total",
            "Total number of sub-resources created, by block type",
        ),
        &["block"],
    )
    .expect("Failed to create BLOCKS_CREATED_TOTAL metric - this should never happen")
});

static BLOCKS_DELETED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fastly_service_blocks_deleted_total",
            "Total number of sub-resources deleted, by block type",
        ),
        &["block"],
    )
    .expect("Failed to create BLOCKS_DELETED_TOTAL metric - this should never happen")
});

static API_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fastly_api_operations_total",
            "Total number of Fastly API operations",
        ),
        &["operation"],
    )
    .expect("Failed to create API_OPERATIONS_TOTAL metric - this should never happen")
});

static API_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fastly_api_operation_duration_seconds",
            "Duration of Fastly API operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create API_OPERATION_DURATION metric - this should never happen")
});

static API_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("fastly_api_errors_total", "Total number of failed Fastly API operations"),
        &["operation", "status"],
    )
    .expect("Failed to create API_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the shared registry.
///
/// Safe to call more than once; collectors that are already registered are skipped.
#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails on descriptor conflicts, which are programming errors"
)]
pub fn register_metrics() -> Result<()> {
    register(RECONCILIATIONS_TOTAL.clone())?;
    register(RECONCILIATION_ERRORS_TOTAL.clone())?;
    register(RECONCILIATION_DURATION.clone())?;
    register(DRIFT_DETECTED_TOTAL.clone())?;
    register(VERSIONS_ACTIVATED_TOTAL.clone())?;
    register(BLOCKS_CREATED_TOTAL.clone())?;
    register(BLOCKS_DELETED_TOTAL.clone())?;
    register(API_OPERATIONS_TOTAL.clone())?;
    register(API_OPERATION_DURATION.clone())?;
    register(API_ERRORS_TOTAL.clone())?;
    Ok(())
}

fn register<C: Collector + 'static>(collector: C) -> Result<()> {
    match REGISTRY.register(Box::new(collector)) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_drift_detected() {
    DRIFT_DETECTED_TOTAL.inc();
}

pub fn increment_versions_activated() {
    VERSIONS_ACTIVATED_TOTAL.inc();
}

pub fn increment_blocks_created(block: &str) {
    BLOCKS_CREATED_TOTAL.with_label_values(&[block]).inc();
}

pub fn increment_blocks_deleted(block: &str) {
    BLOCKS_DELETED_TOTAL.with_label_values(&[block]).inc();
}

/// Count one API call and observe its latency
pub fn record_api_operation(operation: &str, duration: f64) {
    API_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    API_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

/// Count one failed API call; transport failures are labelled `none`
pub fn increment_api_errors(operation: &str, status: Option<u16>) {
    let status = status.map_or_else(|| "none".to_string(), |s| s.to_string());
    API_ERRORS_TOTAL
        .with_label_values(&[operation, status.as_str()])
        .inc();
}
