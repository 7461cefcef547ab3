//! Application configuration.

use std::fmt;
use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use swarm_chain::KeySource;
use swarm_core::{parse_amount, ChainId, U256};
use swarm_executor::{ManagerConfig, DEFAULT_FALLBACK_GAS_LIMIT, DEFAULT_SLIPPAGE_BPS};

use crate::error::{AppError, AppResult};

/// What the run does for every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Approve the router to spend `token`.
    #[default]
    Approve,
    /// Swap native currency for `token`.
    Buy,
    /// Swap `token` for native currency.
    Sell,
    /// Send native currency, or `token` when set, to `recipient`.
    Withdraw,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Queue and lifecycle tuning. Unset intervals follow the chain block time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub queue_interval_ms: Option<u64>,
    #[serde(default)]
    pub monitor_interval_ms: Option<u64>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_swaps_per_batch: Option<usize>,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    /// Pending time after which a tracked transaction is sped up.
    #[serde(default = "default_stall_threshold_ms")]
    pub stall_threshold_ms: u64,
    #[serde(default = "default_fallback_gas_limit")]
    pub fallback_gas_limit: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    /// The bot waits for a terminal update per request, so expirations are
    /// reported by default.
    #[serde(default = "default_notify_expired")]
    pub notify_expired: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_batch_size() -> usize {
    2
}

fn default_receipt_timeout_ms() -> u64 {
    60_000
}

fn default_stall_threshold_ms() -> u64 {
    300_000
}

fn default_fallback_gas_limit() -> u64 {
    DEFAULT_FALLBACK_GAS_LIMIT
}

fn default_slippage_bps() -> u32 {
    DEFAULT_SLIPPAGE_BPS
}

fn default_notify_expired() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_interval_ms: None,
            monitor_interval_ms: None,
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
            max_swaps_per_batch: None,
            receipt_timeout_ms: default_receipt_timeout_ms(),
            stall_threshold_ms: default_stall_threshold_ms(),
            fallback_gas_limit: default_fallback_gas_limit(),
            slippage_bps: default_slippage_bps(),
            notify_expired: default_notify_expired(),
        }
    }
}

/// The operation to run and its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub operation: Operation,
    /// ERC-20 token. Required for approve, buy and sell.
    #[serde(default)]
    pub token: Option<Address>,
    /// Base units: native value for buy and native withdraw, token amount otherwise.
    /// Ignored by approve, which always grants the maximum allowance.
    #[serde(default = "default_amount")]
    pub amount: String,
    /// Seconds from the current block time until each request expires.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Hold every request until this many seconds after the current block time.
    #[serde(default)]
    pub delay_secs: Option<u64>,
    /// Destination for withdraw.
    #[serde(default)]
    pub recipient: Option<Address>,
}

fn default_amount() -> String {
    "0".to_string()
}

fn default_deadline_secs() -> u64 {
    600
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            operation: Operation::default(),
            token: None,
            amount: default_amount(),
            deadline_secs: default_deadline_secs(),
            delay_secs: None,
            recipient: None,
        }
    }
}

impl PlanConfig {
    /// Parsed `amount`.
    pub fn amount(&self) -> AppResult<U256> {
        Ok(parse_amount(&self.amount)?)
    }

    /// The token, or a config error naming the operation that needs it.
    pub fn require_token(&self) -> AppResult<Address> {
        self.token
            .ok_or_else(|| AppError::Config(format!("plan.token is required for {}", self.operation)))
    }

    pub fn require_recipient(&self) -> AppResult<Address> {
        self.recipient
            .ok_or_else(|| AppError::Config("plan.recipient is required for withdraw".to_string()))
    }
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_keys() -> KeySource {
    KeySource::EnvVar {
        var_name: "SWARM_KEYS".to_string(),
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub chain: ChainId,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default = "default_keys")]
    pub keys: KeySource,
    #[serde(default)]
    pub plan: PlanConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain: ChainId::default(),
            queue: QueueConfig::default(),
            keys: default_keys(),
            plan: PlanConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.queue.batch_size == 0 {
            return Err(AppError::Config("queue.batch_size must be at least 1".to_string()));
        }
        if self.queue.max_swaps_per_batch == Some(0) && self.plan.operation.is_swap() {
            return Err(AppError::Config(
                "queue.max_swaps_per_batch of 0 would never submit a swap".to_string(),
            ));
        }
        if self.plan.deadline_secs == 0 {
            return Err(AppError::Config("plan.deadline_secs must be positive".to_string()));
        }
        self.plan.amount()?;
        match self.plan.operation {
            Operation::Approve | Operation::Buy | Operation::Sell => {
                self.plan.require_token()?;
            }
            Operation::Withdraw => {
                self.plan.require_recipient()?;
            }
        }
        Ok(())
    }

    /// Manager settings derived from the chain defaults and `[queue]`.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        let q = &self.queue;
        let mut config = ManagerConfig::for_chain(self.chain);
        if let Some(ms) = q.queue_interval_ms {
            config.queue_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = q.monitor_interval_ms {
            config.monitor_interval = Duration::from_millis(ms);
        }
        config.max_retries = q.max_retries;
        config.batch_size = q.batch_size;
        config.max_swaps_per_batch = q.max_swaps_per_batch;
        config.receipt_timeout = Duration::from_millis(q.receipt_timeout_ms);
        config.stall_threshold = Duration::from_millis(q.stall_threshold_ms);
        config.fallback_gas_limit = q.fallback_gas_limit;
        config.slippage_bps = q.slippage_bps;
        config.notify_expired = q.notify_expired;
        config
    }
}

impl Operation {
    #[must_use]
    pub fn is_swap(&self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::path::PathBuf;

    const FULL: &str = r#"
rpc_url = "https://sepolia.example.org"
chain = "sepolia"

[queue]
queue_interval_ms = 500
max_retries = 5
batch_size = 4
max_swaps_per_batch = 1
slippage_bps = 300

[keys]
source = "file"
path = "/etc/swarm/keys.txt"

[plan]
operation = "buy"
token = "0x1111111111111111111111111111111111111111"
amount = "1000000000000000"
deadline_secs = 120
delay_secs = 30
"#;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chain, ChainId::Sepolia);
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.queue.batch_size, 2);
        assert!(config.queue.notify_expired);
        assert_eq!(config.plan.deadline_secs, 600);
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml(FULL).unwrap();
        assert_eq!(config.rpc_url, "https://sepolia.example.org");
        assert_eq!(config.plan.operation, Operation::Buy);
        assert_eq!(
            config.plan.token,
            Some(address!("1111111111111111111111111111111111111111"))
        );
        assert_eq!(config.plan.amount().unwrap(), U256::from(1_000_000_000_000_000u64));
        assert_eq!(config.plan.delay_secs, Some(30));
        assert_eq!(
            config.keys,
            KeySource::File {
                path: PathBuf::from("/etc/swarm/keys.txt")
            }
        );
    }

    #[test]
    fn test_manager_config_overrides() {
        let config = AppConfig::from_toml(FULL).unwrap();
        let manager = config.manager_config();
        assert_eq!(manager.queue_interval, Duration::from_millis(500));
        // Unset interval keeps the chain block time.
        assert_eq!(manager.monitor_interval, ChainId::Sepolia.spec().block_time);
        assert_eq!(manager.max_retries, 5);
        assert_eq!(manager.batch_size, 4);
        assert_eq!(manager.swap_cap(), 1);
        assert_eq!(manager.slippage_bps, 300);
        assert!(manager.notify_expired);
    }

    #[test]
    fn test_validation_errors() {
        let missing_token = "[plan]\noperation = \"sell\"\namount = \"5\"";
        assert!(matches!(
            AppConfig::from_toml(missing_token),
            Err(AppError::Config(msg)) if msg.contains("sell")
        ));

        let missing_recipient = "[plan]\noperation = \"withdraw\"\namount = \"5\"";
        assert!(matches!(
            AppConfig::from_toml(missing_recipient),
            Err(AppError::Config(_))
        ));

        let bad_amount = "[plan]\noperation = \"withdraw\"\namount = \"lots\"\nrecipient = \"0x1111111111111111111111111111111111111111\"";
        assert!(matches!(
            AppConfig::from_toml(bad_amount),
            Err(AppError::Core(_))
        ));

        let zero_batch = "[queue]\nbatch_size = 0\n[plan]\ntoken = \"0x1111111111111111111111111111111111111111\"";
        assert!(AppConfig::from_toml(zero_batch).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("rpc_url"));
        assert!(toml_str.contains("[queue]"));
    }
}
