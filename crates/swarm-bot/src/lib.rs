//! swarm operator application.
//!
//! Loads the account roster, builds the chain clients and the transaction
//! manager, enqueues one request per account for the configured plan and
//! waits for every request to settle.

pub mod app;
pub mod config;
pub mod error;
pub mod plan;

pub use app::{Application, RunSummary};
pub use config::{AppConfig, Operation, PlanConfig, QueueConfig};
pub use error::{AppError, AppResult};
pub use plan::PlannedRequest;
