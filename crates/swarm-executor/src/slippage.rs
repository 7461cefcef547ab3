//! Minimum-output computation for swaps, applied just before submission.

use alloy::primitives::{Address, U256};
use tracing::debug;

use swarm_core::TxDescriptor;

use crate::channel::DynQuoteSource;
use crate::error::ExecutorResult;

/// Default slippage tolerance (8%).
pub const DEFAULT_SLIPPAGE_BPS: u32 = 800;

const BPS_DENOMINATOR: u64 = 10_000;

pub struct SlippageCalculator {
    quotes: DynQuoteSource,
    slippage_bps: u32,
}

impl std::fmt::Debug for SlippageCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlippageCalculator")
            .field("slippage_bps", &self.slippage_bps)
            .finish()
    }
}

impl SlippageCalculator {
    #[must_use]
    pub fn new(quotes: DynQuoteSource, slippage_bps: u32) -> Self {
        Self {
            quotes,
            slippage_bps,
        }
    }

    #[must_use]
    pub fn slippage_bps(&self) -> u32 {
        self.slippage_bps
    }

    /// Expected output for `amount_in` along `path`; zero when the router returns nothing.
    pub async fn amounts_out(&self, amount_in: U256, path: &[Address]) -> ExecutorResult<U256> {
        let amounts = self.quotes.amounts_out(amount_in, path.to_vec()).await?;
        Ok(amounts.last().copied().unwrap_or(U256::ZERO))
    }

    /// `amount` reduced by the slippage tolerance.
    #[must_use]
    pub fn min_amount_with_slippage(&self, amount: U256) -> U256 {
        let bps = U256::from(self.slippage_bps);
        let denom = U256::from(BPS_DENOMINATOR);
        let cut = match amount.checked_mul(bps) {
            Some(scaled) => scaled / denom,
            None => amount / denom * bps,
        };
        amount.saturating_sub(cut)
    }

    /// Re-quote a swap descriptor and overwrite its minimum output.
    ///
    /// Returns the new minimum, or `None` for descriptors that are not swaps.
    pub async fn apply(&self, descriptor: &mut TxDescriptor) -> ExecutorResult<Option<U256>> {
        let value = descriptor.value();
        let Some(call) = descriptor.call_mut() else {
            return Ok(None);
        };
        let Some((amount_in, path)) = call.quote_input(value) else {
            return Ok(None);
        };
        let path = path.to_vec();

        let quoted = self.amounts_out(amount_in, &path).await?;
        let min = self.min_amount_with_slippage(quoted);
        call.set_amount_out_min(min);

        debug!(
            function = call.function_name(),
            %amount_in,
            %quoted,
            amount_out_min = %min,
            "Recomputed swap minimum output"
        );
        Ok(Some(min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;
    use alloy::primitives::address;
    use std::sync::Arc;
    use swarm_core::RouterCall;

    const WETH: Address = address!("7b79995e5f793A07Bc00c21412e50Ecae098E7f9");
    const TOKEN: Address = address!("1111111111111111111111111111111111111111");

    fn calculator(chain: &Arc<MockChain>) -> SlippageCalculator {
        SlippageCalculator::new(chain.clone(), DEFAULT_SLIPPAGE_BPS)
    }

    #[test]
    fn test_min_amount_with_slippage() {
        let chain = Arc::new(MockChain::new(0));
        let calc = calculator(&chain);
        assert_eq!(calc.min_amount_with_slippage(U256::from(10_000)), U256::from(9_200));
        assert_eq!(calc.min_amount_with_slippage(U256::ZERO), U256::ZERO);
        // No overflow on the largest amount.
        assert!(calc.min_amount_with_slippage(U256::MAX) < U256::MAX);
    }

    #[tokio::test]
    async fn test_amounts_out_takes_last_or_zero() {
        let chain = Arc::new(MockChain::new(0));
        let calc = calculator(&chain);

        assert_eq!(calc.amounts_out(U256::from(1), &[WETH, TOKEN]).await.unwrap(), U256::ZERO);

        chain.set_amounts_out(vec![U256::from(1), U256::from(500)]);
        assert_eq!(
            calc.amounts_out(U256::from(1), &[WETH, TOKEN]).await.unwrap(),
            U256::from(500)
        );
    }

    #[tokio::test]
    async fn test_apply_rewrites_eth_in_swap_using_value() {
        let chain = Arc::new(MockChain::new(0));
        chain.set_amounts_out(vec![U256::from(100), U256::from(10_000)]);
        let calc = calculator(&chain);

        let call = RouterCall::SwapExactEthForTokens {
            amount_out_min: U256::ZERO,
            path: vec![WETH, TOKEN],
            to: TOKEN,
            deadline: U256::from(1),
        };
        let mut descriptor = TxDescriptor::contract_call(WETH, call, U256::from(100));

        let min = calc.apply(&mut descriptor).await.unwrap();
        assert_eq!(min, Some(U256::from(9_200)));
        assert_eq!(chain.quote_calls(), vec![(U256::from(100), vec![WETH, TOKEN])]);
        match descriptor.call() {
            Some(RouterCall::SwapExactEthForTokens { amount_out_min, .. }) => {
                assert_eq!(*amount_out_min, U256::from(9_200))
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_quotes_token_in_swap_by_amount_in() {
        let chain = Arc::new(MockChain::new(0));
        chain.set_amounts_out(vec![U256::from(50), U256::from(2_000)]);
        let calc = calculator(&chain);

        let call = RouterCall::SwapExactTokensForEth {
            amount_in: U256::from(50),
            amount_out_min: U256::from(1),
            path: vec![TOKEN, WETH],
            to: TOKEN,
            deadline: U256::from(1),
        };
        // Attached value plays no part in a token-in quote.
        let mut descriptor = TxDescriptor::contract_call(WETH, call, U256::from(7));

        let min = calc.apply(&mut descriptor).await.unwrap();
        assert_eq!(min, Some(U256::from(1_840)));
        assert_eq!(chain.quote_calls(), vec![(U256::from(50), vec![TOKEN, WETH])]);
        match descriptor.call() {
            Some(RouterCall::SwapExactTokensForEth {
                amount_in,
                amount_out_min,
                ..
            }) => {
                assert_eq!(*amount_in, U256::from(50));
                assert_eq!(*amount_out_min, U256::from(1_840));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_ignores_non_swaps() {
        let chain = Arc::new(MockChain::new(0));
        let calc = calculator(&chain);

        let mut transfer = TxDescriptor::native_transfer(TOKEN, U256::from(5));
        assert_eq!(calc.apply(&mut transfer).await.unwrap(), None);

        let approve = RouterCall::Approve {
            spender: WETH,
            amount: U256::MAX,
        };
        let mut approve = TxDescriptor::contract_call(TOKEN, approve, U256::ZERO);
        assert_eq!(calc.apply(&mut approve).await.unwrap(), None);
        assert!(chain.quote_calls().is_empty());
    }
}
