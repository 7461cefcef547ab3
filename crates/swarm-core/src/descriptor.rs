//! Transaction descriptors and router call encoding.
//!
//! A descriptor is resolved once, at admission, into either a plain value
//! transfer or a typed contract call. Calldata is produced with `sol!`
//! bindings for the Uniswap V2 router and ERC-20.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Gas limit used for plain value transfers.
pub const GAS_TRANSFER_LIMIT: u64 = 21_000;

sol! {
    interface IUniswapV2Router02 {
        function swapExactETHForTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable returns (uint256[] memory amounts);
        function swapExactETHForTokensSupportingFeeOnTransferTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable;
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
        function swapExactTokensForETHSupportingFeeOnTransferTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external;
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }

    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address recipient, uint256 amount) external returns (bool);
    }
}

// ============================================================================
// Category
// ============================================================================

/// Priority class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Approval,
    Swap,
    Transfer,
    Other,
}

impl Category {
    /// Dequeue rank. Approvals always sort ahead of everything else.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Approval => 0,
            Self::Swap | Self::Transfer | Self::Other => 1,
        }
    }

    #[must_use]
    pub fn is_swap(&self) -> bool {
        matches!(self, Self::Swap)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approval => write!(f, "approval"),
            Self::Swap => write!(f, "swap"),
            Self::Transfer => write!(f, "transfer"),
            Self::Other => write!(f, "other"),
        }
    }
}

// ============================================================================
// Router Calls
// ============================================================================

/// A typed contract call understood by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum RouterCall {
    Approve {
        spender: Address,
        amount: U256,
    },
    Transfer {
        recipient: Address,
        amount: U256,
    },
    SwapExactEthForTokens {
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
    SwapExactEthForTokensSupportingFeeOnTransferTokens {
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
    SwapExactTokensForEth {
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
    SwapExactTokensForEthSupportingFeeOnTransferTokens {
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
    /// Pre-encoded calldata for any other function.
    Raw { function: String, data: Bytes },
}

impl RouterCall {
    /// ABI function name, as it appears in logs.
    #[must_use]
    pub fn function_name(&self) -> &str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Transfer { .. } => "transfer",
            Self::SwapExactEthForTokens { .. } => "swapExactETHForTokens",
            Self::SwapExactEthForTokensSupportingFeeOnTransferTokens { .. } => {
                "swapExactETHForTokensSupportingFeeOnTransferTokens"
            }
            Self::SwapExactTokensForEth { .. } => "swapExactTokensForETH",
            Self::SwapExactTokensForEthSupportingFeeOnTransferTokens { .. } => {
                "swapExactTokensForETHSupportingFeeOnTransferTokens"
            }
            Self::Raw { function, .. } => function.as_str(),
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Approve { .. } => Category::Approval,
            Self::Transfer { .. } => Category::Transfer,
            Self::SwapExactEthForTokens { .. }
            | Self::SwapExactEthForTokensSupportingFeeOnTransferTokens { .. }
            | Self::SwapExactTokensForEth { .. }
            | Self::SwapExactTokensForEthSupportingFeeOnTransferTokens { .. } => Category::Swap,
            Self::Raw { .. } => Category::Other,
        }
    }

    /// ABI-encoded calldata (selector + arguments).
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let data = match self {
            Self::Approve { spender, amount } => IERC20::approveCall {
                spender: *spender,
                amount: *amount,
            }
            .abi_encode(),
            Self::Transfer { recipient, amount } => IERC20::transferCall {
                recipient: *recipient,
                amount: *amount,
            }
            .abi_encode(),
            Self::SwapExactEthForTokens {
                amount_out_min,
                path,
                to,
                deadline,
            } => IUniswapV2Router02::swapExactETHForTokensCall {
                amountOutMin: *amount_out_min,
                path: path.clone(),
                to: *to,
                deadline: *deadline,
            }
            .abi_encode(),
            Self::SwapExactEthForTokensSupportingFeeOnTransferTokens {
                amount_out_min,
                path,
                to,
                deadline,
            } => IUniswapV2Router02::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
                amountOutMin: *amount_out_min,
                path: path.clone(),
                to: *to,
                deadline: *deadline,
            }
            .abi_encode(),
            Self::SwapExactTokensForEth {
                amount_in,
                amount_out_min,
                path,
                to,
                deadline,
            } => IUniswapV2Router02::swapExactTokensForETHCall {
                amountIn: *amount_in,
                amountOutMin: *amount_out_min,
                path: path.clone(),
                to: *to,
                deadline: *deadline,
            }
            .abi_encode(),
            Self::SwapExactTokensForEthSupportingFeeOnTransferTokens {
                amount_in,
                amount_out_min,
                path,
                to,
                deadline,
            } => IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
                amountIn: *amount_in,
                amountOutMin: *amount_out_min,
                path: path.clone(),
                to: *to,
                deadline: *deadline,
            }
            .abi_encode(),
            Self::Raw { data, .. } => return data.clone(),
        };
        Bytes::from(data)
    }

    /// Input amount and path to quote before submission, for swaps only.
    ///
    /// ETH-in swaps quote the attached `value`; when no value is attached the
    /// existing first argument is used instead.
    #[must_use]
    pub fn quote_input(&self, value: U256) -> Option<(U256, &[Address])> {
        match self {
            Self::SwapExactEthForTokens {
                amount_out_min,
                path,
                ..
            }
            | Self::SwapExactEthForTokensSupportingFeeOnTransferTokens {
                amount_out_min,
                path,
                ..
            } => {
                let amount_in = if value.is_zero() { *amount_out_min } else { value };
                Some((amount_in, path.as_slice()))
            }
            Self::SwapExactTokensForEth {
                amount_in, path, ..
            }
            | Self::SwapExactTokensForEthSupportingFeeOnTransferTokens {
                amount_in, path, ..
            } => Some((*amount_in, path.as_slice())),
            _ => None,
        }
    }

    /// Overwrites the minimum output of a swap. Returns false for non-swaps.
    pub fn set_amount_out_min(&mut self, min: U256) -> bool {
        match self {
            Self::SwapExactEthForTokens { amount_out_min, .. }
            | Self::SwapExactEthForTokensSupportingFeeOnTransferTokens { amount_out_min, .. }
            | Self::SwapExactTokensForEth { amount_out_min, .. }
            | Self::SwapExactTokensForEthSupportingFeeOnTransferTokens { amount_out_min, .. } => {
                *amount_out_min = min;
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// Immutable description of one on-chain operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxDescriptor {
    /// Plain value transfer; no calldata.
    NativeTransfer { to: Address, value: U256 },
    /// Call into a contract, optionally attaching native value.
    ContractCall {
        to: Address,
        call: RouterCall,
        #[serde(default)]
        value: U256,
    },
}

impl TxDescriptor {
    #[must_use]
    pub fn native_transfer(to: Address, value: U256) -> Self {
        Self::NativeTransfer { to, value }
    }

    #[must_use]
    pub fn contract_call(to: Address, call: RouterCall, value: U256) -> Self {
        Self::ContractCall { to, call, value }
    }

    #[must_use]
    pub fn to(&self) -> Address {
        match self {
            Self::NativeTransfer { to, .. } | Self::ContractCall { to, .. } => *to,
        }
    }

    #[must_use]
    pub fn value(&self) -> U256 {
        match self {
            Self::NativeTransfer { value, .. } | Self::ContractCall { value, .. } => *value,
        }
    }

    /// Calldata; empty for a native transfer.
    #[must_use]
    pub fn data(&self) -> Bytes {
        match self {
            Self::NativeTransfer { .. } => Bytes::new(),
            Self::ContractCall { call, .. } => call.encode(),
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::NativeTransfer { .. } => Category::Transfer,
            Self::ContractCall { call, .. } => call.category(),
        }
    }

    #[must_use]
    pub fn function_name(&self) -> &str {
        match self {
            Self::NativeTransfer { .. } => "transfer",
            Self::ContractCall { call, .. } => call.function_name(),
        }
    }

    #[must_use]
    pub fn is_native_transfer(&self) -> bool {
        matches!(self, Self::NativeTransfer { .. })
    }

    #[must_use]
    pub fn call(&self) -> Option<&RouterCall> {
        match self {
            Self::NativeTransfer { .. } => None,
            Self::ContractCall { call, .. } => Some(call),
        }
    }

    pub fn call_mut(&mut self) -> Option<&mut RouterCall> {
        match self {
            Self::NativeTransfer { .. } => None,
            Self::ContractCall { call, .. } => Some(call),
        }
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Parse a hex address (with or without `0x`).
pub fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s.trim()).map_err(|e| CoreError::InvalidAddress(format!("{s}: {e}")))
}

/// Parse a base-unit integer amount (decimal, or hex with `0x`).
pub fn parse_amount(s: &str) -> Result<U256> {
    U256::from_str(s.trim()).map_err(|e| CoreError::InvalidAmount(format!("{s}: {e}")))
}
