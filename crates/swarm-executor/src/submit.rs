//! Gas and fee parameters for a submission.
//!
//! Plain transfers (and calls without calldata) use the fixed transfer gas
//! limit. Contract calls use the node's estimate scaled by 1.1, or the
//! configured fallback when estimation fails. The max fee is the speed-up
//! override when present, otherwise the oracle estimate scaled by 1.1. The
//! priority fee follows its own override and never exceeds the max fee.

use tracing::warn;

use swarm_core::{QueuedRequest, GAS_TRANSFER_LIMIT};

use crate::channel::{ChainReader, GasQuery, PreparedTransaction};
use crate::error::ExecutorResult;

/// Basis points denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;
/// Fee-per-gas multiplier over the oracle estimate (1.1x).
pub const GAS_PRICE_MULTIPLIER_BPS: u128 = 11_000;
/// Gas limit multiplier over the node's estimate (1.1x).
pub const GAS_LIMIT_MULTIPLIER_BPS: u128 = 11_000;
/// Fixed priority fee: 0.001 gwei.
pub const MAX_PRIORITY_FEE_PER_GAS: u128 = 1_000_000;
/// Gas limit used when estimation fails.
pub const DEFAULT_FALLBACK_GAS_LIMIT: u64 = 1_000_000;

/// `value * bps / 10_000`, saturating.
#[must_use]
pub fn scale_bps(value: u128, bps: u128) -> u128 {
    value.saturating_mul(bps) / BPS_DENOMINATOR
}

/// Replacement fee for a stalled transaction: 1.1x rounded up, and always strictly higher.
///
/// Nodes reject a same-nonce replacement unless both the max fee and the
/// priority fee rise by at least 10%, so both go through this.
#[must_use]
pub fn bump_gas_price(original: u128) -> u128 {
    let scaled = original
        .saturating_mul(GAS_PRICE_MULTIPLIER_BPS)
        .div_ceil(BPS_DENOMINATOR);
    scaled.max(original.saturating_add(1))
}

/// Price and size `request` against current chain state.
pub async fn prepare_transaction(
    chain: &dyn ChainReader,
    request: &QueuedRequest,
    fallback_gas_limit: u64,
) -> ExecutorResult<PreparedTransaction> {
    let descriptor = &request.descriptor;
    let to = descriptor.to();
    let value = descriptor.value();
    let data = descriptor.data();

    let gas_limit = if descriptor.is_native_transfer() || data.is_empty() {
        GAS_TRANSFER_LIMIT
    } else {
        let query = GasQuery {
            from: request.account,
            to,
            value,
            data: data.clone(),
        };
        match chain.estimate_gas(query).await {
            Ok(estimate) => {
                let scaled = scale_bps(u128::from(estimate), GAS_LIMIT_MULTIPLIER_BPS);
                u64::try_from(scaled).unwrap_or(u64::MAX)
            }
            Err(e) => {
                warn!(
                    account = %request.account,
                    function = descriptor.function_name(),
                    error = %e,
                    fallback_gas_limit,
                    "Gas estimation failed, using fallback limit"
                );
                fallback_gas_limit
            }
        }
    };

    let max_fee_per_gas = match request.gas_price {
        Some(price) => price,
        None => {
            let estimate = chain.fee_estimate().await?;
            scale_bps(estimate.max_fee_per_gas, GAS_PRICE_MULTIPLIER_BPS)
        }
    };

    let max_priority_fee_per_gas = request
        .priority_fee
        .unwrap_or(MAX_PRIORITY_FEE_PER_GAS)
        .min(max_fee_per_gas);

    Ok(PreparedTransaction {
        to,
        value,
        data,
        gas_limit,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        nonce: request.nonce,
    })
}
