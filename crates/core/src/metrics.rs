//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Issuance runs (starts, outcomes, durations, failing stages)
//! - Polling waiter (poll outcomes per call site)
//! - External services (gateway request latency)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Issuance Runs
// =============================================================================

/// Runs started total.
pub static RUNS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("launchpad_runs_started_total", "Total issuance runs started").unwrap()
});

/// Finished runs by result.
pub static RUNS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("launchpad_runs_finished_total", "Total issuance runs finished"),
        &["result"], // "issued", "failed", "cancelled"
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("launchpad_run_duration_seconds", "Duration of issuance runs")
            .buckets(vec![1.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

/// Stage failures by stage.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("launchpad_stage_failures_total", "Total stage failures"),
        &["stage"],
    )
    .unwrap()
});

/// Mint transactions submitted.
pub static MINTS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "launchpad_mints_submitted_total",
        "Total mint transactions submitted",
    )
    .unwrap()
});

// =============================================================================
// Polling
// =============================================================================

/// Poll results by call site and outcome.
pub static POLLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("launchpad_polls_total", "Total waiter polls"),
        &["site", "outcome"], // outcome: "pending", "confirmed", "failed", "error", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// External Services
// =============================================================================

/// Gateway request duration in seconds.
pub static GATEWAY_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "launchpad_gateway_request_duration_seconds",
            "Duration of gateway requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation", "result"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_STARTED.clone()),
        Box::new(RUNS_FINISHED.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(STAGE_FAILURES.clone()),
        Box::new(MINTS_SUBMITTED.clone()),
        Box::new(POLLS_TOTAL.clone()),
        Box::new(GATEWAY_REQUEST_DURATION.clone()),
    ]
}
