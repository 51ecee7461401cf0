//! Metrics collection using Prometheus
//!
//! This module provides a centralized metrics registry for tracking:
//! - Tracker API traffic (requests by operation and outcome, retries)
//! - Clone stage item outcomes by phase
//!
//! Nothing here is exported over HTTP by the library; a host process may
//! gather `prometheus::gather()` and expose it however it likes.

// Registration fails only on a duplicate metric name, a programming error.
#![allow(clippy::expect_used)]

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};
use std::time::Duration;

/// Tracker API requests
/// Labels: operation (get_issue/create_link/...), outcome (ok/error)
pub static TRACKER_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "opsdesk_tracker_requests_total",
        "Total number of tracker API requests",
        &["operation", "outcome"]
    )
    .expect("register opsdesk_tracker_requests_total")
});

/// Tracker request duration in seconds
/// Labels: operation
pub static TRACKER_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "opsdesk_tracker_request_duration_seconds",
        "Time spent in tracker API requests",
        &["operation"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 60.0]
    )
    .expect("register opsdesk_tracker_request_duration_seconds")
});

/// Repeated tracker requests
/// Labels: operation
pub static TRACKER_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "opsdesk_tracker_retries_total",
        "Total number of repeated tracker requests",
        &["operation"]
    )
    .expect("register opsdesk_tracker_retries_total")
});

/// Clone stage items
/// Labels: phase (issues/parents/checklists/links/comments), outcome (done/skipped/failed)
pub static CLONE_ITEMS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "opsdesk_clone_items_total",
        "Items processed by the clone stage",
        &["phase", "outcome"]
    )
    .expect("register opsdesk_clone_items_total")
});

/// Records one tracker request outcome together with its duration.
pub fn record_tracker_request(operation: &str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    TRACKER_REQUESTS_TOTAL.with_label_values(&[operation, outcome]).inc();
    TRACKER_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
}
