//! Per-account signing channel.
//!
//! Each account gets its own wallet-filled provider. Nonces come from a local
//! counter seeded from the pending transaction count, so several requests for
//! the same account in one batch get distinct nonces before any of them is
//! mined.

use std::time::Duration;

use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash};
use alloy::providers::fillers::{FillProvider, JoinFill, WalletFiller};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Client;
use alloy::transports::http::Http;
use parking_lot::Mutex;
use tracing::{debug, warn};

use swarm_executor::{
    Broadcast, BoxFuture, ChainError, ChainResult, PreparedTransaction, ReceiptStatus,
    SubmissionChannel,
};

use crate::error::{RpcError, RpcResult};
use crate::rpc::{parse_url, HttpTransport};

type SigningProvider = FillProvider<
    JoinFill<Identity, WalletFiller<EthereumWallet>>,
    RootProvider<HttpTransport>,
    Http<Client>,
    Ethereum,
>;

/// Receipt polling interval inside `wait_for_receipt`.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Signs and broadcasts for one account.
pub struct WalletChannel {
    address: Address,
    chain_id: u64,
    provider: SigningProvider,
    /// Next nonce this channel will hand out, once known.
    next_nonce: Mutex<Option<u64>>,
}

impl WalletChannel {
    pub fn new(rpc_url: &str, chain_id: u64, signer: PrivateKeySigner) -> RpcResult<Self> {
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(parse_url(rpc_url)?);
        Ok(Self {
            address,
            chain_id,
            provider,
            next_nonce: Mutex::new(None),
        })
    }

    /// Reserve the next nonce: `max(pending count, local counter)`.
    async fn reserve_nonce(&self) -> RpcResult<u64> {
        let pending = self
            .provider
            .get_transaction_count(self.address)
            .pending()
            .await?;
        let mut next = self.next_nonce.lock();
        let nonce = next.map_or(pending, |local| local.max(pending));
        *next = Some(nonce + 1);
        Ok(nonce)
    }

    /// Forget the local counter so the next send resyncs from the node.
    fn reset_nonce(&self) {
        *self.next_nonce.lock() = None;
    }

    async fn broadcast(&self, tx: PreparedTransaction) -> RpcResult<Broadcast> {
        let (nonce, reserved) = match tx.nonce {
            Some(n) => (n, false),
            None => (self.reserve_nonce().await?, true),
        };

        let request = TransactionRequest::default()
            .with_from(self.address)
            .with_to(tx.to)
            .with_value(tx.value)
            .with_input(tx.data)
            .with_chain_id(self.chain_id)
            .with_nonce(nonce)
            .with_gas_limit(tx.gas_limit)
            .with_max_fee_per_gas(tx.max_fee_per_gas)
            .with_max_priority_fee_per_gas(tx.max_priority_fee_per_gas);

        match self.provider.send_transaction(request).await {
            Ok(pending) => {
                let hash = *pending.tx_hash();
                debug!(account = %self.address, nonce, %hash, "Transaction sent");
                Ok(Broadcast { hash, nonce })
            }
            Err(e) => {
                if reserved {
                    self.reset_nonce();
                }
                Err(e.into())
            }
        }
    }

    async fn poll_receipt(&self, hash: TxHash) -> RpcResult<ReceiptStatus> {
        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(hash).await? {
                return Ok(if receipt.status() {
                    ReceiptStatus::Success
                } else {
                    ReceiptStatus::Reverted
                });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

impl SubmissionChannel for WalletChannel {
    fn address(&self) -> Address {
        self.address
    }

    fn send(&self, tx: PreparedTransaction) -> BoxFuture<'_, ChainResult<Broadcast>> {
        Box::pin(async move { Ok(self.broadcast(tx).await?) })
    }

    fn wait_for_receipt(
        &self,
        hash: TxHash,
        timeout: Duration,
    ) -> BoxFuture<'_, ChainResult<Option<ReceiptStatus>>> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, self.poll_receipt(hash)).await {
                Ok(status) => status.map(Some).map_err(ChainError::from),
                Err(_) => {
                    warn!(account = %self.address, %hash, "Receipt wait timed out");
                    Ok(None)
                }
            }
        })
    }
}
