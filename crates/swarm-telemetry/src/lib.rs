//! Prometheus metrics and structured logging for swarm.
//!
//! - Prometheus metrics for queue depth, submissions, speed-ups and expirations
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
