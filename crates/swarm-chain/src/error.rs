//! Chain client error types.

use alloy::primitives::Address;
use alloy::transports::TransportError;
use thiserror::Error;

use swarm_executor::ChainError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("ABI decode error: {0}")]
    Decode(#[from] alloy::sol_types::Error),

    #[error("Latest block not available")]
    BlockNotFound,
}

pub type RpcResult<T> = Result<T, RpcError>;

impl From<RpcError> for ChainError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::InvalidUrl(msg) => ChainError::Transport(msg),
            RpcError::Transport(e) => ChainError::Rpc(e.to_string()),
            RpcError::Decode(e) => ChainError::Decode(e.to_string()),
            RpcError::BlockNotFound => ChainError::BlockNotFound,
        }
    }
}

/// Key roster loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex on line {line}: {source}")]
    HexDecode {
        line: usize,
        #[source]
        source: hex::FromHexError,
    },

    #[error("Invalid private key on line {line}: {reason}")]
    InvalidKey { line: usize, reason: String },

    #[error("Duplicate key for address {0}")]
    Duplicate(Address),

    #[error("No keys found")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
