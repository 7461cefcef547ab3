//! Prometheus metrics for the transaction manager.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means duplicate
//! metric names, which is a startup bug; it only happens during static
//! initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGaugeVec, TextEncoder,
};

use crate::error::TelemetryResult;

/// Queue depth by area.
/// Labels: area (main/delayed/tracked)
pub static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "swarm_queue_depth",
        "Number of requests held in each area",
        &["area"]
    )
    .unwrap()
});

/// Submission outcomes.
/// Labels: outcome (broadcast/confirmed/reverted/retry/failed/dropped), category
pub static SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "swarm_submissions_total",
        "Transaction submission outcomes",
        &["outcome", "category"]
    )
    .unwrap()
});

/// Fee bumps issued for stalled transactions.
pub static SPEED_UPS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "swarm_speed_ups_total",
        "Replacement submissions issued for stalled transactions"
    )
    .unwrap()
});

/// Requests evicted past their deadline.
pub static EXPIRED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "swarm_expired_total",
        "Requests evicted because their deadline passed"
    )
    .unwrap()
});

/// Requests drained per scheduler tick.
pub static BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "swarm_batch_size",
        "Requests drained per scheduler tick",
        vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set depth of main queue, delayed area and tracked table.
    pub fn queue_depth(main: usize, delayed: usize, tracked: usize) {
        QUEUE_DEPTH.with_label_values(&["main"]).set(main as i64);
        QUEUE_DEPTH.with_label_values(&["delayed"]).set(delayed as i64);
        QUEUE_DEPTH.with_label_values(&["tracked"]).set(tracked as i64);
    }

    /// Record a submission outcome.
    pub fn submission(outcome: &str, category: &str) {
        SUBMISSIONS_TOTAL
            .with_label_values(&[outcome, category])
            .inc();
    }

    pub fn speed_up() {
        SPEED_UPS_TOTAL.inc();
    }

    pub fn expired(count: usize) {
        EXPIRED_TOTAL.inc_by(count as u64);
    }

    pub fn batch_size(size: usize) {
        BATCH_SIZE.observe(size as f64);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
