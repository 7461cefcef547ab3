//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] swarm_core::CoreError),

    #[error("Key error: {0}")]
    Key(#[from] swarm_chain::KeyError),

    #[error("RPC error: {0}")]
    Rpc(#[from] swarm_chain::RpcError),

    #[error("Chain error: {0}")]
    Chain(#[from] swarm_executor::ChainError),

    #[error("Executor error: {0}")]
    Executor(#[from] swarm_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] swarm_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
