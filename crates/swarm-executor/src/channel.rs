//! Collaborator traits for chain access and per-account submission.
//!
//! The manager never talks to a node directly. It reads block time, fees and
//! receipts through a [`ChainReader`], quotes swaps through a [`QuoteSource`]
//! and broadcasts through one [`SubmissionChannel`] per account. This keeps
//! transport and signing out of the queue logic and lets tests run on the
//! in-memory implementations in [`crate::mock`].

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};

use crate::error::ChainError;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Result alias for collaborator calls.
pub type ChainResult<T> = Result<T, ChainError>;

// ============================================================================
// Value types
// ============================================================================

/// Current fee market estimate (wei per gas).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

impl ReceiptStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Call parameters for gas estimation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasQuery {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// A fully priced transaction, ready for the account to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    /// Explicit nonce; `None` lets the channel assign the next pending nonce.
    pub nonce: Option<u64>,
}

/// What the node accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Broadcast {
    pub hash: TxHash,
    pub nonce: u64,
}

// ============================================================================
// Traits
// ============================================================================

/// Read access to chain state.
pub trait ChainReader: Send + Sync {
    /// Timestamp of the latest block (Unix seconds).
    fn block_timestamp(&self) -> BoxFuture<'_, ChainResult<u64>>;

    /// Current fee estimate.
    fn fee_estimate(&self) -> BoxFuture<'_, ChainResult<FeeEstimate>>;

    /// Gas the call is expected to consume.
    fn estimate_gas(&self, query: GasQuery) -> BoxFuture<'_, ChainResult<u64>>;

    /// Receipt status, or `None` while the transaction is unmined.
    fn receipt(&self, hash: TxHash) -> BoxFuture<'_, ChainResult<Option<ReceiptStatus>>>;
}

/// Router price quotes.
pub trait QuoteSource: Send + Sync {
    /// The router's `getAmountsOut` for `amount_in` along `path`.
    fn amounts_out(&self, amount_in: U256, path: Vec<Address>)
        -> BoxFuture<'_, ChainResult<Vec<U256>>>;
}

/// Signing and broadcast for a single account.
pub trait SubmissionChannel: Send + Sync {
    /// The account this channel signs for.
    fn address(&self) -> Address;

    /// Sign and broadcast.
    fn send(&self, tx: PreparedTransaction) -> BoxFuture<'_, ChainResult<Broadcast>>;

    /// Wait for the receipt, giving up with `Ok(None)` after `timeout`.
    fn wait_for_receipt(
        &self,
        hash: TxHash,
        timeout: Duration,
    ) -> BoxFuture<'_, ChainResult<Option<ReceiptStatus>>>;
}

/// Arc wrappers for trait objects.
pub type DynChainReader = Arc<dyn ChainReader>;
pub type DynQuoteSource = Arc<dyn QuoteSource>;
pub type DynSubmissionChannel = Arc<dyn SubmissionChannel>;
