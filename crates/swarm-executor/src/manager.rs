//! Transaction manager: admission, subscriptions and loop lifecycle.
//!
//! The manager owns the queue, the tracking table and the notification bus.
//! Two background loops drive it once [`TransactionManager::start`] is called:
//!
//! - the scheduler (`scheduler_tick`, every `queue_interval`) evicts expired
//!   requests, promotes delayed ones, drains a batch and submits it;
//! - the monitor (`reconcile_tick`, every `monitor_interval`) polls tracked
//!   hashes, settles mined ones and speeds up or abandons stalled ones.
//!
//! Both ticks are public so they can be driven directly in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use dashmap::DashSet;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use swarm_core::{
    ChainId, CorrelationId, QueuedRequest, StatusUpdate, TrackedTransaction, TxRequest,
};
use swarm_telemetry::Metrics;

use crate::channel::{DynChainReader, DynQuoteSource, DynSubmissionChannel};
use crate::clock::Clock;
use crate::error::{ExecutorError, ExecutorResult};
use crate::notify::{NotificationBus, SubscriptionId};
use crate::queue::RequestQueue;
use crate::slippage::{SlippageCalculator, DEFAULT_SLIPPAGE_BPS};
use crate::submit::DEFAULT_FALLBACK_GAS_LIMIT;
use crate::tracker::TxTracker;

// ============================================================================
// ManagerConfig
// ============================================================================

/// Configuration for the transaction manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Network the manager submits to.
    pub chain: ChainId,
    /// Pause between scheduler ticks.
    pub queue_interval: Duration,
    /// Pause between reconciliation passes.
    pub monitor_interval: Duration,
    /// Retries allowed after a failed broadcast or a stall.
    pub max_retries: u32,
    /// Requests drained per scheduler tick.
    pub batch_size: usize,
    /// Swap-category requests allowed per batch. Defaults to `batch_size`.
    pub max_swaps_per_batch: Option<usize>,
    /// How long a submission waits for its receipt before handing off to the monitor.
    pub receipt_timeout: Duration,
    /// Age after which an unmined transaction counts as stalled.
    pub stall_threshold: Duration,
    /// Gas limit used when estimation fails.
    pub fallback_gas_limit: u64,
    /// Slippage tolerance for swaps, in basis points.
    pub slippage_bps: u32,
    /// Publish `StatusUpdate::Expired` when a request is evicted.
    pub notify_expired: bool,
}

impl ManagerConfig {
    /// Defaults for `chain`, with both loop intervals set to its block time.
    #[must_use]
    pub fn for_chain(chain: ChainId) -> Self {
        let block_time = chain.spec().block_time;
        Self {
            chain,
            queue_interval: block_time,
            monitor_interval: block_time,
            max_retries: 3,
            batch_size: 2,
            max_swaps_per_batch: None,
            receipt_timeout: Duration::from_secs(60),
            stall_threshold: Duration::from_secs(300),
            fallback_gas_limit: DEFAULT_FALLBACK_GAS_LIMIT,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            notify_expired: false,
        }
    }

    /// Effective per-batch swap cap.
    #[must_use]
    pub fn swap_cap(&self) -> usize {
        self.max_swaps_per_batch.unwrap_or(self.batch_size)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::for_chain(ChainId::default())
    }
}

// ============================================================================
// TransactionManager
// ============================================================================

pub struct TransactionManager {
    pub(crate) config: ManagerConfig,
    pub(crate) chain: DynChainReader,
    pub(crate) slippage: SlippageCalculator,
    pub(crate) accounts: HashMap<Address, DynSubmissionChannel>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Main queue and delayed area, under one lock.
    pub(crate) queue: Mutex<RequestQueue>,
    pub(crate) tracker: TxTracker,
    bus: NotificationBus,
    /// Admission sequences of requests still waiting for a terminal update.
    open: DashSet<u64>,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("chain", &self.config.chain)
            .field("accounts", &self.accounts.len())
            .field("queue_len", &self.queue_len())
            .field("delayed_len", &self.delayed_len())
            .field("tracked_len", &self.tracked_len())
            .finish()
    }
}

impl TransactionManager {
    /// Build a manager over the given account channels.
    ///
    /// Each channel is registered under its own address.
    pub fn new(
        config: ManagerConfig,
        chain: DynChainReader,
        quotes: DynQuoteSource,
        accounts: impl IntoIterator<Item = DynSubmissionChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|channel| (channel.address(), channel))
            .collect();
        Self {
            slippage: SlippageCalculator::new(quotes, config.slippage_bps),
            config,
            chain,
            accounts,
            clock,
            queue: Mutex::new(RequestQueue::new()),
            tracker: TxTracker::new(),
            bus: NotificationBus::new(),
            open: DashSet::new(),
            running: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Enqueue `request` for `account`.
    ///
    /// The request waits in the delayed area while its not-before time is
    /// ahead of the latest block.
    ///
    /// # Errors
    /// `UnknownAccount` if no channel is registered for `account`; `Chain`
    /// if the block timestamp cannot be read.
    pub async fn add_transaction(&self, request: TxRequest, account: Address) -> ExecutorResult<()> {
        if !self.accounts.contains_key(&account) {
            return Err(ExecutorError::UnknownAccount(account));
        }
        let block_time = self.chain.block_timestamp().await?;

        let request = QueuedRequest::admit(request, account);
        let function = request.function_name().to_string();
        let category = request.category;
        let (placement, seq) = {
            let mut queue = self.queue.lock();
            let placement = queue.admit(request, block_time);
            let seq = queue.last_seq();
            self.open.insert(seq);
            (placement, seq)
        };

        debug!(
            %account,
            function = %function,
            %category,
            ?placement,
            seq,
            block_time,
            "Transaction admitted"
        );
        self.record_depths();
        Ok(())
    }

    /// Spawn the scheduler and monitor loops.
    ///
    /// Returns false, without spawning anything, if already started.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        let scheduler = tokio::spawn(self.clone().run_scheduler());
        let monitor = tokio::spawn(self.clone().run_monitor());
        self.tasks.lock().extend([scheduler, monitor]);

        info!(
            chain = %self.config.chain,
            accounts = self.accounts.len(),
            queue_interval_ms = self.config.queue_interval.as_millis() as u64,
            monitor_interval_ms = self.config.monitor_interval.as_millis() as u64,
            "Transaction manager started"
        );
        true
    }

    /// Abort both loops. In-flight submissions are dropped with their tasks.
    pub fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Transaction manager stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Subscribe to the terminal status of requests tagged with `id`.
    pub fn on_status<F>(&self, id: CorrelationId, handler: F) -> SubscriptionId
    where
        F: Fn(&StatusUpdate) + Send + Sync + 'static,
    {
        self.bus.subscribe(id, handler)
    }

    pub fn off_status(&self, id: &CorrelationId, sub: SubscriptionId) -> bool {
        self.bus.unsubscribe(id, sub)
    }

    /// Close `request` with its terminal update, publishing it to subscribers
    /// of its correlation id. Returns false if the request was already closed.
    ///
    /// Every broadcast of the request, live or superseded, stops being watched.
    /// `Expired` is only published when `notify_expired` is set.
    pub(crate) fn settle_request(&self, request: &QueuedRequest, update: StatusUpdate) -> bool {
        if self.open.remove(&request.seq).is_none() {
            debug!(seq = request.seq, %update, "Request already settled, update suppressed");
            return false;
        }
        self.tracker.forget(request.seq);

        if update == StatusUpdate::Expired && !self.config.notify_expired {
            return true;
        }
        let Some(id) = request.correlation_id.as_ref() else {
            trace!(seq = request.seq, %update, "No correlation id, update not published");
            return true;
        };
        let delivered = self.bus.publish(id, &update);
        debug!(correlation_id = %id, seq = request.seq, %update, delivered, "Status published");
        true
    }

    /// Settle a hash if it is still tracked. Returns false if another path
    /// already removed it or the request was closed elsewhere.
    pub(crate) fn settle_tracked(&self, hash: &TxHash, update: StatusUpdate) -> bool {
        let Some(entry) = self.tracker.remove(hash) else {
            return false;
        };
        if !self.settle_request(&entry.request, update) {
            return false;
        }
        Metrics::submission(outcome_label(&update), &entry.request.category.to_string());
        true
    }

    /// Request has not yet reached a terminal update.
    #[must_use]
    pub(crate) fn is_open(&self, seq: u64) -> bool {
        self.open.contains(&seq)
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    #[must_use]
    pub fn delayed_len(&self) -> usize {
        self.queue.lock().delayed_len()
    }

    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.tracker.len()
    }

    /// Replaced broadcasts still watched for a receipt.
    #[must_use]
    pub fn superseded_len(&self) -> usize {
        self.tracker.superseded_len()
    }

    /// Requests admitted and not yet settled.
    #[must_use]
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn status_subscribers(&self, id: &CorrelationId) -> usize {
        self.bus.subscriber_count(id)
    }

    #[must_use]
    pub fn tracked_snapshot(&self) -> Vec<TrackedTransaction> {
        self.tracker.snapshot()
    }

    /// Hash abandoned after repeated stalls.
    #[must_use]
    pub fn was_dropped(&self, hash: &TxHash) -> bool {
        self.tracker.was_removed(hash)
    }

    /// Nothing queued, delayed, in flight or superseded.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.lock().is_empty()
            && self.tracker.is_empty()
            && self.tracker.superseded_len() == 0
    }

    pub(crate) fn record_depths(&self) {
        let (main, delayed) = {
            let queue = self.queue.lock();
            (queue.len(), queue.delayed_len())
        };
        Metrics::queue_depth(main, delayed, self.tracker.len());
    }
}

/// Metrics label for a terminal update.
pub(crate) fn outcome_label(update: &StatusUpdate) -> &'static str {
    match update {
        StatusUpdate::Confirmed(_) => "confirmed",
        StatusUpdate::Reverted(_) => "reverted",
        StatusUpdate::Failed => "failed",
        StatusUpdate::Dropped(_) => "dropped",
        StatusUpdate::Expired => "expired",
    }
}
