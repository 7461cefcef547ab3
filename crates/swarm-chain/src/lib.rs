//! Chain access for the swarm transaction manager.
//!
//! - [`RpcChainClient`]: block time, fee and gas estimates, receipts and
//!   router quotes over JSON-RPC
//! - [`WalletChannel`]: per-account signing and broadcast
//! - [`KeySource`]: loads the account roster

pub mod error;
pub mod keys;
pub mod rpc;
pub mod wallet;

pub use error::{KeyError, RpcError, RpcResult};
pub use keys::{parse_roster, KeySource};
pub use rpc::RpcChainClient;
pub use wallet::WalletChannel;
