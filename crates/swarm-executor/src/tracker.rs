//! In-flight transaction table.
//!
//! Keyed by broadcast hash. A speed-up moves the stalled entry into the
//! superseded set instead of dropping it: the replacement reuses its nonce,
//! so either one may be mined and both stay watched until the request
//! settles. Hashes given up on are remembered in a bounded removal history
//! so late receipts can be recognised.

use std::collections::{HashSet, VecDeque};

use alloy::primitives::TxHash;
use dashmap::DashMap;
use parking_lot::Mutex;

use swarm_core::TrackedTransaction;

/// Abandoned hashes remembered before the oldest are forgotten.
pub const REMOVED_HISTORY: usize = 4_096;

/// A broadcast replaced by a higher-fee resend on the same nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superseded {
    pub tx: TrackedTransaction,
    /// Set once the request has no live replacement left. The watch ends one
    /// stall window after this (Unix milliseconds).
    pub orphaned_at_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct RemovedHashes {
    set: HashSet<TxHash>,
    order: VecDeque<TxHash>,
}

#[derive(Debug)]
pub struct TxTracker {
    entries: DashMap<TxHash, TrackedTransaction>,
    superseded: DashMap<TxHash, Superseded>,
    removed: Mutex<RemovedHashes>,
    removed_capacity: usize,
}

impl Default for TxTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TxTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_removed_capacity(REMOVED_HISTORY)
    }

    #[must_use]
    pub fn with_removed_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            superseded: DashMap::new(),
            removed: Mutex::new(RemovedHashes::default()),
            removed_capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, tx: TrackedTransaction) {
        self.entries.insert(tx.hash, tx);
    }

    /// Remove an entry. Exactly one concurrent caller gets `Some`.
    pub fn remove(&self, hash: &TxHash) -> Option<TrackedTransaction> {
        self.entries.remove(hash).map(|(_, tx)| tx)
    }

    #[must_use]
    pub fn get(&self, hash: &TxHash) -> Option<TrackedTransaction> {
        self.entries.get(hash).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn contains(&self, hash: &TxHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Copy of every live entry, taken without holding any shard lock afterwards.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TrackedTransaction> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// Live entries; superseded broadcasts are not counted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ------------------------------------------------------------------------
    // Superseded broadcasts
    // ------------------------------------------------------------------------

    /// Move a live entry into the superseded set and return it.
    ///
    /// Same exclusivity as [`remove`](Self::remove).
    pub fn supersede(&self, hash: &TxHash) -> Option<TrackedTransaction> {
        let tx = self.remove(hash)?;
        self.superseded.insert(
            tx.hash,
            Superseded {
                tx: tx.clone(),
                orphaned_at_ms: None,
            },
        );
        Some(tx)
    }

    /// Remove a superseded broadcast. Exactly one concurrent caller gets `Some`.
    pub fn take_superseded(&self, hash: &TxHash) -> Option<Superseded> {
        self.superseded.remove(hash).map(|(_, s)| s)
    }

    #[must_use]
    pub fn superseded_snapshot(&self) -> Vec<Superseded> {
        self.superseded.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn superseded_len(&self) -> usize {
        self.superseded.len()
    }

    /// Start the orphan clock on every superseded broadcast of request `seq`.
    ///
    /// Returns false when the request has none.
    pub fn orphan(&self, seq: u64, now_ms: u64) -> bool {
        let mut found = false;
        for mut entry in self.superseded.iter_mut() {
            if entry.tx.request.seq == seq {
                if entry.orphaned_at_ms.is_none() {
                    entry.orphaned_at_ms = Some(now_ms);
                }
                found = true;
            }
        }
        found
    }

    /// Drop every live and superseded entry belonging to request `seq`.
    pub fn forget(&self, seq: u64) {
        self.entries.retain(|_, tx| tx.request.seq != seq);
        self.superseded.retain(|_, s| s.tx.request.seq != seq);
    }

    // ------------------------------------------------------------------------
    // Removal history
    // ------------------------------------------------------------------------

    /// Record an abandoned hash, forgetting the oldest past capacity.
    pub fn mark_removed(&self, hash: TxHash) {
        let mut removed = self.removed.lock();
        if !removed.set.insert(hash) {
            return;
        }
        removed.order.push_back(hash);
        while removed.order.len() > self.removed_capacity {
            if let Some(oldest) = removed.order.pop_front() {
                removed.set.remove(&oldest);
            }
        }
    }

    #[must_use]
    pub fn was_removed(&self, hash: &TxHash) -> bool {
        self.removed.lock().set.contains(hash)
    }

    #[must_use]
    pub fn removed_len(&self) -> usize {
        self.removed.lock().order.len()
    }
}
