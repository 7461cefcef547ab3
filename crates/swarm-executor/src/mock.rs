//! In-memory collaborators for tests.
//!
//! `MockChain` implements both [`ChainReader`] and [`QuoteSource`];
//! `MockChannel` records every prepared transaction it is asked to send;
//! `ManualClock` only moves when told to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, TxHash, U256};
use parking_lot::Mutex;

use crate::channel::{
    Broadcast, BoxFuture, ChainReader, ChainResult, FeeEstimate, GasQuery, PreparedTransaction,
    QuoteSource, ReceiptStatus, SubmissionChannel,
};
use crate::clock::Clock;
use crate::error::ChainError;

// ============================================================================
// ManualClock
// ============================================================================

/// Clock that only advances explicitly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MockChain
// ============================================================================

/// Scriptable chain state.
#[derive(Debug)]
pub struct MockChain {
    block_time: AtomicU64,
    block_time_fails: Mutex<bool>,
    max_fee_per_gas: Mutex<Option<u128>>,
    gas_estimate: Mutex<Option<u64>>,
    receipts: Mutex<HashMap<TxHash, ReceiptStatus>>,
    receipt_errors: Mutex<HashMap<TxHash, ChainError>>,
    amounts_out: Mutex<Vec<U256>>,
    quote_calls: Mutex<Vec<(U256, Vec<Address>)>>,
}

impl MockChain {
    /// Chain at `block_time` with a 1 gwei fee estimate and 100k gas estimates.
    #[must_use]
    pub fn new(block_time: u64) -> Self {
        Self {
            block_time: AtomicU64::new(block_time),
            block_time_fails: Mutex::new(false),
            max_fee_per_gas: Mutex::new(Some(1_000_000_000)),
            gas_estimate: Mutex::new(Some(100_000)),
            receipts: Mutex::new(HashMap::new()),
            receipt_errors: Mutex::new(HashMap::new()),
            amounts_out: Mutex::new(Vec::new()),
            quote_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_block_time(&self, secs: u64) {
        self.block_time.store(secs, Ordering::SeqCst);
    }

    pub fn set_block_time_fails(&self, fails: bool) {
        *self.block_time_fails.lock() = fails;
    }

    /// `None` makes fee estimation fail.
    pub fn set_max_fee(&self, fee: Option<u128>) {
        *self.max_fee_per_gas.lock() = fee;
    }

    /// `None` makes gas estimation fail.
    pub fn set_gas_estimate(&self, gas: Option<u64>) {
        *self.gas_estimate.lock() = gas;
    }

    pub fn set_receipt(&self, hash: TxHash, status: ReceiptStatus) {
        self.receipts.lock().insert(hash, status);
    }

    pub fn set_receipt_error(&self, hash: TxHash, error: ChainError) {
        self.receipt_errors.lock().insert(hash, error);
    }

    /// Router output for every quote.
    pub fn set_amounts_out(&self, amounts: Vec<U256>) {
        *self.amounts_out.lock() = amounts;
    }

    /// Every `(amount_in, path)` quoted so far.
    pub fn quote_calls(&self) -> Vec<(U256, Vec<Address>)> {
        self.quote_calls.lock().clone()
    }
}

impl ChainReader for MockChain {
    fn block_timestamp(&self) -> BoxFuture<'_, ChainResult<u64>> {
        Box::pin(async move {
            if *self.block_time_fails.lock() {
                return Err(ChainError::BlockNotFound);
            }
            Ok(self.block_time.load(Ordering::SeqCst))
        })
    }

    fn fee_estimate(&self) -> BoxFuture<'_, ChainResult<FeeEstimate>> {
        Box::pin(async move {
            let fee = *self.max_fee_per_gas.lock();
            fee.map(|max_fee_per_gas| FeeEstimate {
                max_fee_per_gas,
                max_priority_fee_per_gas: 0,
            })
            .ok_or_else(|| ChainError::Rpc("fee estimate unavailable".to_string()))
        })
    }

    fn estimate_gas(&self, _query: GasQuery) -> BoxFuture<'_, ChainResult<u64>> {
        Box::pin(async move {
            let gas = *self.gas_estimate.lock();
            gas.ok_or_else(|| ChainError::Rpc("execution reverted".to_string()))
        })
    }

    fn receipt(&self, hash: TxHash) -> BoxFuture<'_, ChainResult<Option<ReceiptStatus>>> {
        Box::pin(async move {
            if let Some(err) = self.receipt_errors.lock().get(&hash) {
                return Err(err.clone());
            }
            Ok(self.receipts.lock().get(&hash).copied())
        })
    }
}

impl QuoteSource for MockChain {
    fn amounts_out(
        &self,
        amount_in: U256,
        path: Vec<Address>,
    ) -> BoxFuture<'_, ChainResult<Vec<U256>>> {
        Box::pin(async move {
            self.quote_calls.lock().push((amount_in, path));
            Ok(self.amounts_out.lock().clone())
        })
    }
}

// ============================================================================
// MockChannel
// ============================================================================

/// Recording submission channel for one account.
#[derive(Debug)]
pub struct MockChannel {
    address: Address,
    sends: Mutex<Vec<PreparedTransaction>>,
    hashes: Mutex<Vec<TxHash>>,
    failures_remaining: AtomicU32,
    next_nonce: AtomicU64,
    receipt: Mutex<Option<ReceiptStatus>>,
}

impl MockChannel {
    /// Channel whose broadcasts succeed and whose receipts never arrive.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            sends: Mutex::new(Vec::new()),
            hashes: Mutex::new(Vec::new()),
            failures_remaining: AtomicU32::new(0),
            next_nonce: AtomicU64::new(0),
            receipt: Mutex::new(None),
        }
    }

    /// Fail the next `count` broadcasts.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Status returned by `wait_for_receipt`; `None` simulates a timeout.
    pub fn set_receipt(&self, status: Option<ReceiptStatus>) {
        *self.receipt.lock() = status;
    }

    /// Every transaction this channel was asked to send, including failures.
    pub fn sends(&self) -> Vec<PreparedTransaction> {
        self.sends.lock().clone()
    }

    /// Hashes of successful broadcasts, in order.
    pub fn hashes(&self) -> Vec<TxHash> {
        self.hashes.lock().clone()
    }
}

impl SubmissionChannel for MockChannel {
    fn address(&self) -> Address {
        self.address
    }

    fn send(&self, tx: PreparedTransaction) -> BoxFuture<'_, ChainResult<Broadcast>> {
        Box::pin(async move {
            self.sends.lock().push(tx.clone());

            let failing = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(ChainError::Transport("connection refused".to_string()));
            }

            let nonce = match tx.nonce {
                Some(n) => n,
                None => self.next_nonce.fetch_add(1, Ordering::SeqCst),
            };
            let mut hashes = self.hashes.lock();
            let hash = keccak256(
                format!("{}:{nonce}:{}:{}", self.address, tx.max_fee_per_gas, hashes.len())
                    .as_bytes(),
            );
            hashes.push(hash);
            Ok(Broadcast { hash, nonce })
        })
    }

    fn wait_for_receipt(
        &self,
        _hash: TxHash,
        _timeout: Duration,
    ) -> BoxFuture<'_, ChainResult<Option<ReceiptStatus>>> {
        Box::pin(async move { Ok(*self.receipt.lock()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes};

    fn prepared(nonce: Option<u64>) -> PreparedTransaction {
        PreparedTransaction {
            to: Address::ZERO,
            value: U256::ZERO,
            data: Bytes::new(),
            gas_limit: 21_000,
            max_fee_per_gas: 1,
            max_priority_fee_per_gas: 1,
            nonce,
        }
    }

    #[tokio::test]
    async fn test_mock_channel_assigns_nonces_and_unique_hashes() {
        let channel = MockChannel::new(address!("3333333333333333333333333333333333333333"));
        let a = channel.send(prepared(None)).await.unwrap();
        let b = channel.send(prepared(None)).await.unwrap();
        let c = channel.send(prepared(Some(0))).await.unwrap();

        assert_eq!((a.nonce, b.nonce, c.nonce), (0, 1, 0));
        assert_ne!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
        assert_eq!(channel.hashes().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_channel_fail_next() {
        let channel = MockChannel::new(Address::ZERO);
        channel.fail_next(1);
        assert!(channel.send(prepared(None)).await.is_err());
        assert!(channel.send(prepared(None)).await.is_ok());
        assert_eq!(channel.sends().len(), 2);
        assert_eq!(channel.hashes().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_chain_scripted_values() {
        let chain = MockChain::new(1_000);
        assert_eq!(chain.block_timestamp().await.unwrap(), 1_000);

        chain.set_block_time_fails(true);
        assert!(chain.block_timestamp().await.is_err());

        chain.set_max_fee(None);
        assert!(chain.fee_estimate().await.is_err());

        let hash = TxHash::repeat_byte(1);
        assert_eq!(chain.receipt(hash).await.unwrap(), None);
        chain.set_receipt(hash, ReceiptStatus::Reverted);
        assert_eq!(chain.receipt(hash).await.unwrap(), Some(ReceiptStatus::Reverted));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_ms(), 1_010);
        clock.set(5);
        assert_eq!(clock.now_ms(), 5);
    }
}
