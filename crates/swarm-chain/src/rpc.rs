//! Read-only JSON-RPC client: block time, fees, gas, receipts and router quotes.

use alloy::eips::BlockId;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::{Client, Url};
use alloy::transports::http::Http;
use tracing::debug;

use swarm_core::IUniswapV2Router02;
use swarm_executor::{
    BoxFuture, ChainReader, ChainResult, FeeEstimate, GasQuery, QuoteSource, ReceiptStatus,
};

use crate::error::{RpcError, RpcResult};

pub(crate) type HttpTransport = Http<Client>;

/// Parse an RPC endpoint.
pub(crate) fn parse_url(rpc_url: &str) -> RpcResult<Url> {
    Url::parse(rpc_url).map_err(|e| RpcError::InvalidUrl(format!("{rpc_url}: {e}")))
}

/// Chain reader and quote source over an HTTP provider.
#[derive(Clone)]
pub struct RpcChainClient {
    provider: RootProvider<HttpTransport>,
    router: Address,
}

impl RpcChainClient {
    /// Connect to `rpc_url`, quoting against `router`.
    pub fn new(rpc_url: &str, router: Address) -> RpcResult<Self> {
        let provider = ProviderBuilder::new().on_http(parse_url(rpc_url)?);
        Ok(Self { provider, router })
    }

    async fn latest_timestamp(&self) -> RpcResult<u64> {
        let block = self
            .provider
            .get_block(BlockId::latest(), BlockTransactionsKind::Hashes)
            .await?
            .ok_or(RpcError::BlockNotFound)?;
        Ok(block.header.timestamp)
    }

    async fn fees(&self) -> RpcResult<FeeEstimate> {
        match self.provider.estimate_eip1559_fees(None).await {
            Ok(est) => Ok(FeeEstimate {
                max_fee_per_gas: est.max_fee_per_gas,
                max_priority_fee_per_gas: est.max_priority_fee_per_gas,
            }),
            Err(e) => {
                // Nodes without fee history still answer eth_gasPrice.
                debug!(error = %e, "EIP-1559 fee estimate unavailable, using gas price");
                let gas_price = self.provider.get_gas_price().await?;
                Ok(FeeEstimate {
                    max_fee_per_gas: gas_price,
                    max_priority_fee_per_gas: 0,
                })
            }
        }
    }

    async fn gas(&self, query: GasQuery) -> RpcResult<u64> {
        let tx = TransactionRequest::default()
            .with_from(query.from)
            .with_to(query.to)
            .with_value(query.value)
            .with_input(query.data);
        Ok(self.provider.estimate_gas(&tx).await?)
    }

    async fn receipt_status(&self, hash: TxHash) -> RpcResult<Option<ReceiptStatus>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|r| {
            if r.status() {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Reverted
            }
        }))
    }

    async fn quote(&self, amount_in: U256, path: Vec<Address>) -> RpcResult<Vec<U256>> {
        let call = IUniswapV2Router02::getAmountsOutCall {
            amountIn: amount_in,
            path,
        };
        let tx = TransactionRequest::default()
            .with_to(self.router)
            .with_input(call.abi_encode());
        let output = self.provider.call(&tx).await?;
        let decoded = IUniswapV2Router02::getAmountsOutCall::abi_decode_returns(&output, true)?;
        Ok(decoded.amounts)
    }
}

impl ChainReader for RpcChainClient {
    fn block_timestamp(&self) -> BoxFuture<'_, ChainResult<u64>> {
        Box::pin(async move { Ok(self.latest_timestamp().await?) })
    }

    fn fee_estimate(&self) -> BoxFuture<'_, ChainResult<FeeEstimate>> {
        Box::pin(async move { Ok(self.fees().await?) })
    }

    fn estimate_gas(&self, query: GasQuery) -> BoxFuture<'_, ChainResult<u64>> {
        Box::pin(async move { Ok(self.gas(query).await?) })
    }

    fn receipt(&self, hash: TxHash) -> BoxFuture<'_, ChainResult<Option<ReceiptStatus>>> {
        Box::pin(async move { Ok(self.receipt_status(hash).await?) })
    }
}

impl QuoteSource for RpcChainClient {
    fn amounts_out(
        &self,
        amount_in: U256,
        path: Vec<Address>,
    ) -> BoxFuture<'_, ChainResult<Vec<U256>>> {
        Box::pin(async move { Ok(self.quote(amount_in, path).await?) })
    }
}
