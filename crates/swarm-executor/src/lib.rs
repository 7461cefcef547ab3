//! Transaction queue, submission and reconciliation for swarm.
//!
//! # Key Components
//!
//! - [`TransactionManager`]: admission, scheduler and monitor loops, subscriptions
//! - [`RequestQueue`]: approval-first priority queue plus delayed area
//! - [`TxTracker`]: in-flight transactions keyed by hash
//! - [`NotificationBus`]: per-correlation-id status handlers
//! - [`SlippageCalculator`]: swap minimum-output recomputation
//! - [`ChainReader`], [`QuoteSource`], [`SubmissionChannel`]: collaborator seams
//!
//! # Request lifecycle
//!
//! 1. `add_transaction` -> delayed area (not-before ahead of the block) or main queue
//! 2. scheduler tick -> evict expired, promote ready, drain batch, broadcast
//! 3. broadcast -> tracked; receipt settles it (`Confirmed` / `Reverted`)
//! 4. broadcast failure -> requeue until `max_retries`, then `Failed`
//! 5. monitor tick -> stalled entries are sped up, then `Dropped`

pub mod channel;
pub mod clock;
pub mod error;
pub mod manager;
pub mod mock;
pub mod notify;
pub mod queue;
pub mod reconcile;
pub mod scheduler;
pub mod slippage;
pub mod submit;
pub mod tracker;

pub use channel::{
    Broadcast, BoxFuture, ChainReader, ChainResult, DynChainReader, DynQuoteSource,
    DynSubmissionChannel, FeeEstimate, GasQuery, PreparedTransaction, QuoteSource, ReceiptStatus,
    SubmissionChannel,
};
pub use clock::{Clock, SystemClock};
pub use error::{ChainError, ExecutorError, ExecutorResult};
pub use manager::{ManagerConfig, TransactionManager};
pub use mock::{ManualClock, MockChain, MockChannel};
pub use notify::{NotificationBus, StatusHandler, SubscriptionId};
pub use queue::{Placement, RequestQueue};
pub use reconcile::ReconcileSummary;
pub use scheduler::TickSummary;
pub use slippage::{SlippageCalculator, DEFAULT_SLIPPAGE_BPS};
pub use submit::{
    bump_gas_price, prepare_transaction, DEFAULT_FALLBACK_GAS_LIMIT, GAS_LIMIT_MULTIPLIER_BPS,
    GAS_PRICE_MULTIPLIER_BPS, MAX_PRIORITY_FEE_PER_GAS,
};
pub use tracker::{Superseded, TxTracker, REMOVED_HISTORY};
