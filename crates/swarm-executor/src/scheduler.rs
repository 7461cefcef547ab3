//! Scheduler loop: expiry, promotion, batching and submission.
//!
//! One tick:
//! 1. idle if both the main queue and the delayed area are empty
//! 2. read the latest block timestamp
//! 3. evict expired requests, promote ready ones, drain a batch (one lock)
//! 4. submit the batch concurrently and wait for every item

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error, info, trace, warn};

use swarm_core::{QueuedRequest, StatusUpdate, TrackedTransaction};
use swarm_telemetry::Metrics;

use crate::channel::{Broadcast, DynSubmissionChannel, ReceiptStatus};
use crate::error::{ExecutorError, ExecutorResult};
use crate::manager::TransactionManager;
use crate::submit::prepare_transaction;

/// What a scheduler tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Nothing was queued or delayed.
    pub idle: bool,
    pub expired: usize,
    pub promoted: usize,
    /// Requests drained into the batch.
    pub batch: usize,
}

impl TransactionManager {
    pub(crate) async fn run_scheduler(self: Arc<Self>) {
        loop {
            self.scheduler_tick().await;
            tokio::time::sleep(self.config.queue_interval).await;
        }
    }

    /// Run one scheduler pass.
    pub async fn scheduler_tick(&self) -> TickSummary {
        if self.queue.lock().is_empty() {
            trace!("Scheduler idle");
            return TickSummary {
                idle: true,
                ..TickSummary::default()
            };
        }

        let now = match self.chain.block_timestamp().await {
            Ok(now) => now,
            Err(e) => {
                warn!(error = %e, "Failed to read block timestamp, skipping tick");
                return TickSummary::default();
            }
        };

        let (expired, promoted, batch) = {
            let mut queue = self.queue.lock();
            let expired = queue.evict_expired(now);
            let promoted = queue.promote_ready(now);
            let batch = queue.drain_batch(now, self.config.batch_size, self.config.swap_cap());
            (expired, promoted, batch)
        };

        let summary = TickSummary {
            idle: false,
            expired: expired.len(),
            promoted,
            batch: batch.len(),
        };

        if !expired.is_empty() {
            Metrics::expired(expired.len());
            for request in expired {
                self.on_expired(request, now);
            }
        }

        if !batch.is_empty() {
            Metrics::batch_size(batch.len());
            debug!(
                batch = summary.batch,
                promoted,
                block_time = now,
                "Submitting batch"
            );
            join_all(batch.into_iter().map(|request| self.process(request))).await;
        }

        self.record_depths();
        summary
    }

    fn on_expired(&self, request: QueuedRequest, now: u64) {
        if self.tracker.orphan(request.seq, self.clock.now_ms()) {
            warn!(
                account = %request.account,
                function = request.function_name(),
                deadline = request.deadline,
                block_time = now,
                "Replacement expired, still watching superseded broadcast"
            );
            return;
        }
        warn!(
            account = %request.account,
            function = request.function_name(),
            deadline = request.deadline,
            block_time = now,
            retries = request.retries,
            "Request expired before submission"
        );
        self.settle_request(&request, StatusUpdate::Expired);
    }

    /// Submit one request, then wait for its receipt.
    async fn process(&self, mut request: QueuedRequest) {
        if !self.is_open(request.seq) {
            debug!(
                account = %request.account,
                seq = request.seq,
                "Request already settled, skipping submission"
            );
            return;
        }
        let Some(channel) = self.accounts.get(&request.account).cloned() else {
            error!(account = %request.account, "No submission channel for account");
            self.settle_request(&request, StatusUpdate::Failed);
            return;
        };

        let (broadcast, max_fee_per_gas, priority_fee) = match self.broadcast(&channel, &mut request).await {
            Ok(sent) => sent,
            Err(e) => {
                self.on_submission_failure(request, e);
                return;
            }
        };

        let hash = broadcast.hash;
        let category = request.category.to_string();
        info!(
            account = %request.account,
            %hash,
            nonce = broadcast.nonce,
            function = request.function_name(),
            retries = request.retries,
            max_fee_per_gas,
            priority_fee,
            "Transaction broadcast"
        );
        Metrics::submission("broadcast", &category);

        let seq = request.seq;
        let tracked = TrackedTransaction::new(
            request,
            hash,
            broadcast.nonce,
            Some(max_fee_per_gas),
            self.clock.now_ms(),
        )
        .with_priority_fee(priority_fee);
        self.tracker.insert(tracked);

        // A superseded broadcast may have settled the request meanwhile.
        if !self.is_open(seq) {
            self.tracker.remove(&hash);
            debug!(%hash, seq, "Request settled during broadcast, not tracking");
            return;
        }

        match channel
            .wait_for_receipt(hash, self.config.receipt_timeout)
            .await
        {
            Ok(Some(ReceiptStatus::Success)) => {
                if self.settle_tracked(&hash, StatusUpdate::Confirmed(hash)) {
                    info!(%hash, "Transaction confirmed");
                }
            }
            Ok(Some(ReceiptStatus::Reverted)) => {
                warn!(%hash, "Transaction reverted");
                self.settle_tracked(&hash, StatusUpdate::Reverted(hash));
            }
            Ok(None) => {
                debug!(%hash, "No receipt within timeout, left to monitor");
            }
            Err(e) => {
                warn!(%hash, error = %e, "Receipt wait failed, left to monitor");
            }
        }
    }

    async fn broadcast(
        &self,
        channel: &DynSubmissionChannel,
        request: &mut QueuedRequest,
    ) -> ExecutorResult<(Broadcast, u128, u128)> {
        self.slippage.apply(&mut request.descriptor).await?;
        let prepared =
            prepare_transaction(self.chain.as_ref(), request, self.config.fallback_gas_limit)
                .await?;
        let (max_fee, priority_fee) = (prepared.max_fee_per_gas, prepared.max_priority_fee_per_gas);
        let broadcast = channel.send(prepared).await?;
        Ok((broadcast, max_fee, priority_fee))
    }

    /// Nothing was broadcast: retry immediately, or give up with `Failed`.
    ///
    /// A failed replacement whose original is still watched is not a failure
    /// of the request: the original gets one more stall window to be mined.
    fn on_submission_failure(&self, mut request: QueuedRequest, error: ExecutorError) {
        if !self.is_open(request.seq) {
            debug!(seq = request.seq, %error, "Request already settled, dropping failed resend");
            return;
        }
        let category = request.category.to_string();
        if request.retries < self.config.max_retries {
            request.retries += 1;
            warn!(
                account = %request.account,
                function = request.function_name(),
                retries = request.retries,
                max_retries = self.config.max_retries,
                %error,
                "Submission failed, requeueing"
            );
            Metrics::submission("retry", &category);
            self.queue.lock().requeue(request);
        } else if self.tracker.orphan(request.seq, self.clock.now_ms()) {
            warn!(
                account = %request.account,
                function = request.function_name(),
                retries = request.retries,
                %error,
                "Replacement failed, still watching superseded broadcast"
            );
        } else {
            error!(
                account = %request.account,
                function = request.function_name(),
                retries = request.retries,
                %error,
                "Submission failed, retries exhausted"
            );
            Metrics::submission("failed", &category);
            self.settle_request(&request, StatusUpdate::Failed);
        }
    }
}
