//! Application orchestration.
//!
//! Builds the manager over the account roster, enqueues the plan and waits
//! until every request has a terminal status or Ctrl-C arrives.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use swarm_chain::{RpcChainClient, WalletChannel};
use swarm_core::{CorrelationId, StatusUpdate};
use swarm_executor::{
    Clock, DynChainReader, DynQuoteSource, DynSubmissionChannel, SubscriptionId, SystemClock,
    TransactionManager,
};
use swarm_telemetry::Metrics;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::plan::{build_plan, PlannedRequest};

type StatusSender = mpsc::UnboundedSender<(CorrelationId, StatusUpdate)>;

/// Terminal outcomes of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub confirmed: usize,
    pub reverted: usize,
    pub failed: usize,
    pub dropped: usize,
    pub expired: usize,
    /// Requests still open when the run was interrupted.
    pub interrupted: usize,
}

impl RunSummary {
    fn record(&mut self, update: &StatusUpdate) {
        match update {
            StatusUpdate::Confirmed(_) => self.confirmed += 1,
            StatusUpdate::Reverted(_) => self.reverted += 1,
            StatusUpdate::Failed => self.failed += 1,
            StatusUpdate::Dropped(_) => self.dropped += 1,
            StatusUpdate::Expired => self.expired += 1,
        }
    }
}

pub struct Application {
    config: AppConfig,
    chain: DynChainReader,
    accounts: Vec<Address>,
    manager: Arc<TransactionManager>,
}

impl Application {
    /// Load keys and connect to the configured node.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let spec = config.chain.spec();
        let signers = config.keys.load()?;
        let client = Arc::new(RpcChainClient::new(&config.rpc_url, spec.router)?);

        let channels = signers
            .into_iter()
            .map(|signer| {
                WalletChannel::new(&config.rpc_url, spec.id, signer)
                    .map(|c| Arc::new(c) as DynSubmissionChannel)
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(accounts = channels.len(), chain = %config.chain, "Account roster loaded");

        Ok(Self::with_parts(
            config,
            client.clone(),
            client,
            channels,
            Arc::new(SystemClock),
        ))
    }

    /// Assemble from explicit collaborators.
    pub fn with_parts(
        config: AppConfig,
        chain: DynChainReader,
        quotes: DynQuoteSource,
        channels: Vec<DynSubmissionChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let accounts = channels.iter().map(|c| c.address()).collect();
        let manager = Arc::new(TransactionManager::new(
            config.manager_config(),
            chain.clone(),
            quotes,
            channels,
            clock,
        ));
        Self {
            config,
            chain,
            accounts,
            manager,
        }
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Run the plan to completion.
    pub async fn run(&self) -> AppResult<RunSummary> {
        self.manager.start();
        let result = self.execute().await;
        self.manager.stop();

        match Metrics::render() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }
        result
    }

    async fn execute(&self) -> AppResult<RunSummary> {
        let now = self.chain.block_timestamp().await?;
        let planned = build_plan(&self.config.plan, self.config.chain.spec(), &self.accounts, now)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<(CorrelationId, StatusUpdate)>();
        let mut pending = self.enqueue(planned, &tx).await?;
        drop(tx);

        info!(
            operation = %self.config.plan.operation,
            requests = pending.len(),
            "Plan enqueued"
        );

        let mut summary = RunSummary::default();
        while !pending.is_empty() {
            tokio::select! {
                received = rx.recv() => {
                    let Some((id, update)) = received else {
                        break;
                    };
                    if let Some(sub) = pending.remove(&id) {
                        self.manager.off_status(&id, sub);
                        summary.record(&update);
                        info!(
                            correlation_id = %id,
                            status = %update,
                            remaining = pending.len(),
                            "Request settled"
                        );
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(remaining = pending.len(), "Shutdown signal received");
                    summary.interrupted = pending.len();
                    break;
                }
            }
        }

        Ok(summary)
    }

    /// Subscribe to and enqueue every planned request.
    ///
    /// If one cannot be enqueued, every subscription made so far is removed
    /// before the error is returned.
    async fn enqueue(
        &self,
        planned: Vec<PlannedRequest>,
        tx: &StatusSender,
    ) -> AppResult<HashMap<CorrelationId, SubscriptionId>> {
        let mut pending = HashMap::new();
        for p in planned {
            if let Some(id) = p.correlation_id().cloned() {
                let tx = tx.clone();
                let tag = id.clone();
                let sub = self.manager.on_status(id.clone(), move |update| {
                    let _ = tx.send((tag.clone(), *update));
                });
                pending.insert(id, sub);
            }
            let account = p.account;
            if let Err(e) = self.manager.add_transaction(p.request, account).await {
                warn!(
                    %account,
                    error = %e,
                    subscriptions = pending.len(),
                    "Enqueue failed, unsubscribing"
                );
                for (id, sub) in pending.drain() {
                    self.manager.off_status(&id, sub);
                }
                return Err(e.into());
            }
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};
    use swarm_core::{TxDescriptor, TxRequest};
    use swarm_executor::{ManualClock, MockChain, MockChannel};

    const ALICE: Address = address!("A11CE00000000000000000000000000000000001");
    const STRANGER: Address = address!("5757000000000000000000000000000000000009");

    fn planned(account: Address, id: &str) -> PlannedRequest {
        PlannedRequest {
            account,
            request: TxRequest::new(TxDescriptor::native_transfer(ALICE, U256::from(1)), 2_000)
                .with_correlation_id(CorrelationId::from(id)),
        }
    }

    #[tokio::test]
    async fn test_enqueue_failure_removes_subscriptions() {
        let chain = Arc::new(MockChain::new(1_000));
        let alice: DynSubmissionChannel = Arc::new(MockChannel::new(ALICE));
        let app = Application::with_parts(
            AppConfig::default(),
            chain.clone(),
            chain,
            vec![alice],
            Arc::new(ManualClock::new(0)),
        );
        let (tx, _rx) = mpsc::unbounded_channel();

        let plan = vec![planned(ALICE, "first"), planned(STRANGER, "second")];
        assert!(app.enqueue(plan, &tx).await.is_err());

        let manager = app.manager();
        assert_eq!(manager.status_subscribers(&CorrelationId::from("first")), 0);
        assert_eq!(manager.status_subscribers(&CorrelationId::from("second")), 0);
        assert_eq!(manager.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_keeps_subscriptions_on_success() {
        let chain = Arc::new(MockChain::new(1_000));
        let alice: DynSubmissionChannel = Arc::new(MockChannel::new(ALICE));
        let app = Application::with_parts(
            AppConfig::default(),
            chain.clone(),
            chain,
            vec![alice],
            Arc::new(ManualClock::new(0)),
        );
        let (tx, _rx) = mpsc::unbounded_channel();

        let pending = app
            .enqueue(vec![planned(ALICE, "a"), planned(ALICE, "b")], &tx)
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(app.manager().status_subscribers(&CorrelationId::from("a")), 1);
    }
}
