//! Executor error types.

use alloy::primitives::Address;
use thiserror::Error;

/// Errors returned by chain collaborators (reader, quote source, submission channel).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Block not found")]
    BlockNotFound,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unknown account: {0}")]
    UnknownAccount(Address),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
