//! Full runs of the application over in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, Address, U256};
use swarm_bot::{AppConfig, Application, Operation, RunSummary};
use swarm_executor::{DynSubmissionChannel, ManualClock, MockChain, MockChannel, ReceiptStatus};

const ALICE: Address = address!("A11CE00000000000000000000000000000000001");
const BOB: Address = address!("B0B0000000000000000000000000000000000002");
const SINK: Address = address!("5111100000000000000000000000000000000003");

fn withdraw_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.queue.queue_interval_ms = Some(10);
    config.queue.monitor_interval_ms = Some(10);
    config.plan.operation = Operation::Withdraw;
    config.plan.recipient = Some(SINK);
    config.plan.amount = "5".to_string();
    config.plan.deadline_secs = 60;
    config
}

fn build(config: AppConfig, chain: &Arc<MockChain>, channels: &[Arc<MockChannel>]) -> Application {
    let channels: Vec<DynSubmissionChannel> = channels
        .iter()
        .map(|c| c.clone() as DynSubmissionChannel)
        .collect();
    Application::with_parts(
        config,
        chain.clone(),
        chain.clone(),
        channels,
        Arc::new(ManualClock::new(1_000_000)),
    )
}

#[tokio::test]
async fn test_run_confirms_every_account() {
    let chain = Arc::new(MockChain::new(1_000));
    let alice = Arc::new(MockChannel::new(ALICE));
    let bob = Arc::new(MockChannel::new(BOB));
    alice.set_receipt(Some(ReceiptStatus::Success));
    bob.set_receipt(Some(ReceiptStatus::Success));

    let app = build(withdraw_config(), &chain, &[alice.clone(), bob.clone()]);
    let summary = tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run timed out")
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            confirmed: 2,
            ..RunSummary::default()
        }
    );
    let sent = alice.sends();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, SINK);
    assert_eq!(sent[0].value, U256::from(5));
    assert_eq!(bob.sends().len(), 1);
    assert!(!app.manager().is_running());
}

#[tokio::test]
async fn test_run_reports_expired_delayed_requests() {
    let chain = Arc::new(MockChain::new(1_000));
    let alice = Arc::new(MockChannel::new(ALICE));

    let mut config = withdraw_config();
    // Held until after its own deadline, so it can only expire.
    config.plan.delay_secs = Some(120);

    let app = build(config, &chain, &[alice.clone()]);

    let mover = chain.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        mover.set_block_time(1_100);
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run timed out")
        .unwrap();

    assert_eq!(summary.expired, 1);
    assert_eq!(summary.confirmed, 0);
    assert!(alice.sends().is_empty());
}
