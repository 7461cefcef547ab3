//! Reconciliation loop over tracked transactions.
//!
//! Each pass takes a snapshot of the tracking table and, per hash:
//! - receipt present: settle it (`Confirmed` / `Reverted`)
//! - stalled with retries left: replace it at a higher fee on the same nonce
//! - stalled with no retries left: abandon it (`Dropped`)
//!
//! Replaced broadcasts stay watched. A receipt for one settles the request
//! with that hash; once no replacement is live any more, an unmined original
//! is dropped after one more stall window.
//!
//! No lock is held across a network call. Whoever removes an entry from the
//! table owns its outcome, so a concurrent submission path and this loop
//! never both act on the same hash.

use std::sync::Arc;

use tracing::{debug, info, warn};

use swarm_core::{StatusUpdate, TrackedTransaction};
use swarm_telemetry::Metrics;

use crate::channel::ReceiptStatus;
use crate::error::ExecutorResult;
use crate::manager::{outcome_label, TransactionManager};
use crate::submit::{bump_gas_price, MAX_PRIORITY_FEE_PER_GAS};
use crate::tracker::Superseded;

/// What a reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub checked: usize,
    pub settled: usize,
    pub sped_up: usize,
    pub dropped: usize,
    pub errors: usize,
}

/// Per-hash result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconciled {
    Pending,
    Settled,
    SpedUp,
    Dropped,
    /// Another path removed the entry first.
    Unchanged,
}

impl ReconcileSummary {
    fn record(&mut self, result: Reconciled) {
        match result {
            Reconciled::Settled => self.settled += 1,
            Reconciled::SpedUp => self.sped_up += 1,
            Reconciled::Dropped => self.dropped += 1,
            Reconciled::Pending | Reconciled::Unchanged => {}
        }
    }
}

impl TransactionManager {
    pub(crate) async fn run_monitor(self: Arc<Self>) {
        loop {
            self.reconcile_tick().await;
            tokio::time::sleep(self.config.monitor_interval).await;
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Live entries are checked before superseded ones.
    pub async fn reconcile_tick(&self) -> ReconcileSummary {
        let snapshot = self.tracker.snapshot();
        let superseded = self.tracker.superseded_snapshot();
        let mut summary = ReconcileSummary {
            checked: snapshot.len() + superseded.len(),
            ..ReconcileSummary::default()
        };

        for tx in &snapshot {
            match self.reconcile_one(tx).await {
                Ok(result) => summary.record(result),
                Err(e) => {
                    summary.errors += 1;
                    warn!(hash = %tx.hash, error = %e, "Failed to reconcile tracked transaction");
                }
            }
        }

        for entry in &superseded {
            match self.reconcile_superseded(entry).await {
                Ok(result) => summary.record(result),
                Err(e) => {
                    summary.errors += 1;
                    warn!(
                        hash = %entry.tx.hash,
                        error = %e,
                        "Failed to reconcile superseded transaction"
                    );
                }
            }
        }

        if summary.checked > 0 {
            debug!(
                checked = summary.checked,
                settled = summary.settled,
                sped_up = summary.sped_up,
                dropped = summary.dropped,
                errors = summary.errors,
                "Reconciliation pass complete"
            );
        }
        self.record_depths();
        summary
    }

    async fn reconcile_one(&self, tx: &TrackedTransaction) -> ExecutorResult<Reconciled> {
        let hash = tx.hash;
        if !self.is_open(tx.request.seq) {
            self.tracker.remove(&hash);
            return Ok(Reconciled::Unchanged);
        }
        match self.chain.receipt(hash).await? {
            Some(ReceiptStatus::Success) => {
                let settled = self.settle_tracked(&hash, StatusUpdate::Confirmed(hash));
                if settled {
                    info!(%hash, "Transaction confirmed");
                }
                Ok(if settled {
                    Reconciled::Settled
                } else {
                    Reconciled::Unchanged
                })
            }
            Some(ReceiptStatus::Reverted) => {
                warn!(%hash, "Transaction reverted");
                Ok(if self.settle_tracked(&hash, StatusUpdate::Reverted(hash)) {
                    Reconciled::Settled
                } else {
                    Reconciled::Unchanged
                })
            }
            None => {
                let elapsed_ms = tx.elapsed_ms(self.clock.now_ms());
                let stalled = u128::from(elapsed_ms) > self.config.stall_threshold.as_millis();
                let retries = tx.request.retries;
                let max_retries = self.config.max_retries;

                if stalled && retries < max_retries {
                    self.speed_up(tx, elapsed_ms).await
                } else if stalled || retries > max_retries {
                    Ok(self.abandon(tx, elapsed_ms))
                } else {
                    Ok(Reconciled::Pending)
                }
            }
        }
    }

    /// Replace a stalled transaction: same nonce, strictly higher max fee and
    /// priority fee. The original stays watched as superseded.
    async fn speed_up(&self, tx: &TrackedTransaction, elapsed_ms: u64) -> ExecutorResult<Reconciled> {
        let original_fee = match tx.gas_price {
            Some(price) => price,
            None => self.chain.fee_estimate().await?.max_fee_per_gas,
        };
        let original_tip = tx
            .priority_fee
            .unwrap_or_else(|| MAX_PRIORITY_FEE_PER_GAS.min(original_fee));
        let bumped_fee = bump_gas_price(original_fee);
        let bumped_tip = bump_gas_price(original_tip).min(bumped_fee);

        let Some(entry) = self.tracker.supersede(&tx.hash) else {
            return Ok(Reconciled::Unchanged);
        };
        let mut replacement = entry.request;
        replacement.retries += 1;
        replacement.gas_price = Some(bumped_fee);
        replacement.priority_fee = Some(bumped_tip);
        replacement.nonce = Some(entry.nonce);

        info!(
            hash = %entry.hash,
            account = %replacement.account,
            nonce = entry.nonce,
            elapsed_ms,
            retries = replacement.retries,
            old_max_fee = original_fee,
            new_max_fee = bumped_fee,
            old_priority_fee = original_tip,
            new_priority_fee = bumped_tip,
            "Stalled transaction, speeding up"
        );
        Metrics::speed_up();
        self.queue.lock().requeue(replacement);
        Ok(Reconciled::SpedUp)
    }

    /// Give up on a stalled transaction.
    fn abandon(&self, tx: &TrackedTransaction, elapsed_ms: u64) -> Reconciled {
        let Some(entry) = self.tracker.remove(&tx.hash) else {
            return Reconciled::Unchanged;
        };
        self.tracker.mark_removed(entry.hash);

        warn!(
            hash = %entry.hash,
            account = %entry.request.account,
            elapsed_ms,
            retries = entry.request.retries,
            "Stalled transaction abandoned"
        );
        Metrics::submission("dropped", &entry.request.category.to_string());
        self.settle_request(&entry.request, StatusUpdate::Dropped(entry.hash));
        Reconciled::Dropped
    }

    async fn reconcile_superseded(&self, entry: &Superseded) -> ExecutorResult<Reconciled> {
        let hash = entry.tx.hash;
        if !self.is_open(entry.tx.request.seq) {
            self.tracker.take_superseded(&hash);
            return Ok(Reconciled::Unchanged);
        }

        match self.chain.receipt(hash).await? {
            Some(status) => {
                let Some(taken) = self.tracker.take_superseded(&hash) else {
                    return Ok(Reconciled::Unchanged);
                };
                let update = match status {
                    ReceiptStatus::Success => StatusUpdate::Confirmed(hash),
                    ReceiptStatus::Reverted => StatusUpdate::Reverted(hash),
                };
                if !self.settle_request(&taken.tx.request, update) {
                    return Ok(Reconciled::Unchanged);
                }
                info!(
                    %hash,
                    account = %taken.tx.request.account,
                    nonce = taken.tx.nonce,
                    outcome = outcome_label(&update),
                    "Superseded transaction mined"
                );
                Metrics::submission(outcome_label(&update), &taken.tx.request.category.to_string());
                Ok(Reconciled::Settled)
            }
            None => {
                let Some(orphaned_at) = entry.orphaned_at_ms else {
                    return Ok(Reconciled::Pending);
                };
                let waited_ms = self.clock.now_ms().saturating_sub(orphaned_at);
                if u128::from(waited_ms) <= self.config.stall_threshold.as_millis() {
                    return Ok(Reconciled::Pending);
                }
                let Some(taken) = self.tracker.take_superseded(&hash) else {
                    return Ok(Reconciled::Unchanged);
                };
                self.tracker.mark_removed(hash);

                warn!(
                    %hash,
                    account = %taken.tx.request.account,
                    waited_ms,
                    "Superseded transaction abandoned"
                );
                Metrics::submission("dropped", &taken.tx.request.category.to_string());
                self.settle_request(&taken.tx.request, StatusUpdate::Dropped(hash));
                Ok(Reconciled::Dropped)
            }
        }
    }
}
