//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Pipeline runs by outcome
//! - Broadcast and polling activity
//! - End-to-end latency
//!
//! Metrics live in the default registry; the host application decides how
//! to expose them. [`gather`] renders them in the text format.

use crate::error::ErrorStage;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    // Build and broadcast metrics
    pub static ref TX_BUILT: CounterVec = register_counter_vec!(
        "mm_tx_transactions_built_total",
        "Total transaction requests built",
        &["operation"]
    ).unwrap();

    pub static ref TX_BROADCAST: CounterVec = register_counter_vec!(
        "mm_tx_transactions_broadcast_total",
        "Total transactions accepted for broadcast",
        &["operation"]
    ).unwrap();

    pub static ref TX_REJECTED: CounterVec = register_counter_vec!(
        "mm_tx_broadcast_rejected_total",
        "Total transactions rejected or denied before broadcast",
        &["operation"]
    ).unwrap();

    // Poll metrics
    pub static ref POLL_ATTEMPTS: Counter = register_counter!(
        "mm_tx_poll_attempts_total",
        "Total finalized-record lookups"
    ).unwrap();

    pub static ref TX_TIMEOUT: CounterVec = register_counter_vec!(
        "mm_tx_poll_timeouts_total",
        "Total transactions not found within the poll budget",
        &["operation"]
    ).unwrap();

    // Outcome metrics
    pub static ref TX_SUCCEEDED: CounterVec = register_counter_vec!(
        "mm_tx_transactions_succeeded_total",
        "Total runs ending in SUCCEED",
        &["operation"]
    ).unwrap();

    pub static ref TX_DEGRADED: CounterVec = register_counter_vec!(
        "mm_tx_transactions_degraded_total",
        "Total successful runs whose receipts could not be produced",
        &["operation"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "mm_tx_transactions_failed_total",
        "Total runs ending in FAIL by stage",
        &["operation", "stage"]
    ).unwrap();

    pub static ref TX_CANCELLED: CounterVec = register_counter_vec!(
        "mm_tx_transactions_cancelled_total",
        "Total runs cancelled by the caller",
        &["operation"]
    ).unwrap();

    pub static ref TX_LATENCY: HistogramVec = register_histogram_vec!(
        "mm_tx_transaction_latency_seconds",
        "Run latency from build to terminal rendering",
        &["operation"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).unwrap();
}

/// Render the default registry in the Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_tx_built(operation: &str) {
    TX_BUILT.with_label_values(&[operation]).inc();
}

pub fn record_tx_broadcast(operation: &str) {
    TX_BROADCAST.with_label_values(&[operation]).inc();
}

pub fn record_broadcast_rejected(operation: &str) {
    TX_REJECTED.with_label_values(&[operation]).inc();
}

pub fn record_poll_attempt() {
    POLL_ATTEMPTS.inc();
}

pub fn record_tx_timeout(operation: &str) {
    TX_TIMEOUT.with_label_values(&[operation]).inc();
}

pub fn record_tx_succeeded(operation: &str) {
    TX_SUCCEEDED.with_label_values(&[operation]).inc();
}

pub fn record_tx_degraded(operation: &str) {
    TX_DEGRADED.with_label_values(&[operation]).inc();
}

pub fn record_tx_failed(operation: &str, stage: ErrorStage) {
    TX_FAILED
        .with_label_values(&[operation, stage.as_str()])
        .inc();
}

pub fn record_tx_cancelled(operation: &str) {
    TX_CANCELLED.with_label_values(&[operation]).inc();
}

pub fn record_tx_latency(operation: &str, latency_secs: f64) {
    TX_LATENCY
        .with_label_values(&[operation])
        .observe(latency_secs);
}
