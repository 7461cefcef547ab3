//! Turns the configured operation into one request per account.
//!
//! Every request carries a fresh correlation id so the application can
//! subscribe to its terminal status before enqueueing it.

use alloy::primitives::Address;
use swarm_core::{ChainSpec, CorrelationId, RouterCall, TxDescriptor, TxRequest, U256};

use crate::config::{Operation, PlanConfig};
use crate::error::AppResult;

/// A request and the account that submits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRequest {
    pub account: Address,
    pub request: TxRequest,
}

impl PlannedRequest {
    fn new(account: Address, descriptor: TxDescriptor, deadline: u64) -> Self {
        Self {
            account,
            request: TxRequest::new(descriptor, deadline).with_correlation_id(CorrelationId::new()),
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.request.correlation_id.as_ref()
    }
}

/// Approve the router to spend `token` without limit.
pub fn approve_all(
    accounts: &[Address],
    spec: &ChainSpec,
    token: Address,
    deadline: u64,
) -> Vec<PlannedRequest> {
    accounts
        .iter()
        .map(|&account| {
            let call = RouterCall::Approve {
                spender: spec.router,
                amount: U256::MAX,
            };
            PlannedRequest::new(
                account,
                TxDescriptor::contract_call(token, call, U256::ZERO),
                deadline,
            )
        })
        .collect()
}

/// Swap `value` of native currency for `token`.
///
/// The minimum output is left at zero; the manager fills it from a fresh quote.
pub fn buy_all(
    accounts: &[Address],
    spec: &ChainSpec,
    token: Address,
    value: U256,
    deadline: u64,
) -> Vec<PlannedRequest> {
    accounts
        .iter()
        .map(|&account| {
            let call = RouterCall::SwapExactEthForTokens {
                amount_out_min: U256::ZERO,
                path: vec![spec.wrapped_native, token],
                to: account,
                deadline: U256::from(deadline),
            };
            PlannedRequest::new(
                account,
                TxDescriptor::contract_call(spec.router, call, value),
                deadline,
            )
        })
        .collect()
}

/// Swap `amount_in` of `token` for native currency.
pub fn sell_all(
    accounts: &[Address],
    spec: &ChainSpec,
    token: Address,
    amount_in: U256,
    deadline: u64,
) -> Vec<PlannedRequest> {
    accounts
        .iter()
        .map(|&account| {
            let call = RouterCall::SwapExactTokensForEth {
                amount_in,
                amount_out_min: U256::ZERO,
                path: vec![token, spec.wrapped_native],
                to: account,
                deadline: U256::from(deadline),
            };
            PlannedRequest::new(
                account,
                TxDescriptor::contract_call(spec.router, call, U256::ZERO),
                deadline,
            )
        })
        .collect()
}

/// Send `amount` to `recipient`: native currency, or `token` when given.
pub fn withdraw_all(
    accounts: &[Address],
    token: Option<Address>,
    recipient: Address,
    amount: U256,
    deadline: u64,
) -> Vec<PlannedRequest> {
    accounts
        .iter()
        .map(|&account| {
            let descriptor = match token {
                Some(token) => TxDescriptor::contract_call(
                    token,
                    RouterCall::Transfer { recipient, amount },
                    U256::ZERO,
                ),
                None => TxDescriptor::native_transfer(recipient, amount),
            };
            PlannedRequest::new(account, descriptor, deadline)
        })
        .collect()
}

/// Build the full plan relative to the current block time `now`.
pub fn build_plan(
    plan: &PlanConfig,
    spec: &ChainSpec,
    accounts: &[Address],
    now: u64,
) -> AppResult<Vec<PlannedRequest>> {
    let deadline = now.saturating_add(plan.deadline_secs);
    let amount = plan.amount()?;

    let mut planned = match plan.operation {
        Operation::Approve => approve_all(accounts, spec, plan.require_token()?, deadline),
        Operation::Buy => buy_all(accounts, spec, plan.require_token()?, amount, deadline),
        Operation::Sell => sell_all(accounts, spec, plan.require_token()?, amount, deadline),
        Operation::Withdraw => withdraw_all(
            accounts,
            plan.token,
            plan.require_recipient()?,
            amount,
            deadline,
        ),
    };

    if let Some(delay) = plan.delay_secs {
        let not_before = now.saturating_add(delay);
        for p in &mut planned {
            p.request.not_before = Some(not_before);
        }
    }
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use swarm_core::{Category, ChainId};

    const ALICE: Address = address!("1000000000000000000000000000000000000001");
    const BOB: Address = address!("1000000000000000000000000000000000000002");
    const TOKEN: Address = address!("2000000000000000000000000000000000000002");
    const SINK: Address = address!("3000000000000000000000000000000000000003");

    fn spec() -> &'static ChainSpec {
        ChainId::Sepolia.spec()
    }

    #[test]
    fn test_approve_all_targets_token_with_router_spender() {
        let planned = approve_all(&[ALICE, BOB], spec(), TOKEN, 500);
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[1].account, BOB);

        let descriptor = &planned[0].request.descriptor;
        assert_eq!(descriptor.to(), TOKEN);
        assert_eq!(descriptor.category(), Category::Approval);
        assert_eq!(
            descriptor.call(),
            Some(&RouterCall::Approve {
                spender: spec().router,
                amount: U256::MAX
            })
        );
    }

    #[test]
    fn test_buy_and_sell_paths() {
        let buy = buy_all(&[ALICE], spec(), TOKEN, U256::from(7), 500);
        let d = &buy[0].request.descriptor;
        assert_eq!(d.to(), spec().router);
        assert_eq!(d.value(), U256::from(7));
        match d.call() {
            Some(RouterCall::SwapExactEthForTokens { path, to, deadline, .. }) => {
                assert_eq!(path, &vec![spec().wrapped_native, TOKEN]);
                assert_eq!(*to, ALICE);
                assert_eq!(*deadline, U256::from(500));
            }
            other => panic!("unexpected call {other:?}"),
        }

        let sell = sell_all(&[ALICE], spec(), TOKEN, U256::from(9), 500);
        let d = &sell[0].request.descriptor;
        assert_eq!(d.value(), U256::ZERO);
        match d.call() {
            Some(RouterCall::SwapExactTokensForEth { amount_in, path, .. }) => {
                assert_eq!(*amount_in, U256::from(9));
                assert_eq!(path, &vec![TOKEN, spec().wrapped_native]);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_withdraw_native_and_token() {
        let native = withdraw_all(&[ALICE], None, SINK, U256::from(3), 500);
        assert!(native[0].request.descriptor.is_native_transfer());
        assert_eq!(native[0].request.descriptor.to(), SINK);

        let token = withdraw_all(&[ALICE], Some(TOKEN), SINK, U256::from(3), 500);
        let d = &token[0].request.descriptor;
        assert_eq!(d.to(), TOKEN);
        assert_eq!(d.category(), Category::Transfer);
    }

    #[test]
    fn test_build_plan_sets_deadline_delay_and_unique_ids() {
        let plan = PlanConfig {
            operation: Operation::Buy,
            token: Some(TOKEN),
            amount: "100".to_string(),
            deadline_secs: 60,
            delay_secs: Some(24),
            recipient: None,
        };
        let planned = build_plan(&plan, spec(), &[ALICE, BOB], 1_000).unwrap();

        assert_eq!(planned.len(), 2);
        for p in &planned {
            assert_eq!(p.request.deadline, 1_060);
            assert_eq!(p.request.not_before, Some(1_024));
        }
        assert_ne!(planned[0].correlation_id(), planned[1].correlation_id());
    }

    #[test]
    fn test_build_plan_requires_token() {
        let plan = PlanConfig {
            operation: Operation::Approve,
            ..PlanConfig::default()
        };
        assert!(build_plan(&plan, spec(), &[ALICE], 1_000).is_err());
    }
}
