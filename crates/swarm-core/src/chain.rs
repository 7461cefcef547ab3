//! Supported networks and their Uniswap V2 router deployments.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Network the manager submits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Mainnet,
    #[default]
    Sepolia,
}

/// Static deployment data for a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSpec {
    pub id: u64,
    pub router: Address,
    pub wrapped_native: Address,
    pub block_time: Duration,
}

const MAINNET: ChainSpec = ChainSpec {
    id: 1,
    router: address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
    wrapped_native: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
    block_time: Duration::from_secs(12),
};

const SEPOLIA: ChainSpec = ChainSpec {
    id: 11_155_111,
    router: address!("C532a74256D3Db42D0Bf7a0400fEFDbad7694008"),
    wrapped_native: address!("7b79995e5f793A07Bc00c21412e50Ecae098E7f9"),
    block_time: Duration::from_secs(12),
};

impl ChainId {
    #[must_use]
    pub fn spec(&self) -> &'static ChainSpec {
        match self {
            Self::Mainnet => &MAINNET,
            Self::Sepolia => &SEPOLIA,
        }
    }

    /// Numeric EIP-155 chain id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.spec().id
    }

    pub fn from_id(id: u64) -> Result<Self> {
        match id {
            1 => Ok(Self::Mainnet),
            11_155_111 => Ok(Self::Sepolia),
            other => Err(CoreError::UnsupportedChain(other)),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Sepolia => write!(f, "sepolia"),
        }
    }
}

impl FromStr for ChainId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "sepolia" => Ok(Self::Sepolia),
            other => Err(CoreError::InvalidConfig(format!("unknown chain: {other}"))),
        }
    }
}
