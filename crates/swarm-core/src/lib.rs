//! Core domain types for the swarm transaction manager.
//!
//! This crate provides the types shared by the executor, the chain client and
//! the operator binary:
//! - `TxDescriptor`, `RouterCall`: what a transaction does, resolved once at admission
//! - `Category`: dequeue priority class (approvals first)
//! - `TxRequest`, `QueuedRequest`, `TrackedTransaction`: request lifecycle records
//! - `StatusUpdate`, `CorrelationId`: terminal notifications for callers
//! - `ChainId`, `ChainSpec`: supported networks and their router deployments

pub mod chain;
pub mod descriptor;
pub mod error;
pub mod request;

pub use chain::{ChainId, ChainSpec};
pub use descriptor::{
    parse_address, parse_amount, Category, RouterCall, TxDescriptor, IUniswapV2Router02, IERC20,
    GAS_TRANSFER_LIMIT,
};
pub use error::{CoreError, Result};
pub use request::{CorrelationId, QueuedRequest, StatusUpdate, TrackedTransaction, TxRequest};

// Re-exported so downstream crates share one primitive set.
pub use alloy::primitives::{Address, Bytes, TxHash, U256};
