//! Configuration Loader
//!
//! Loads and validates configuration from TOML files.

use std::path::Path;
use std::time::Duration;

use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::adapters::rpc::RpcConfig;
use crate::application::{OrchestratorConfig, DEFAULT_FEE_RESERVE};
use crate::domain::{parse_address, BPS_DENOMINATOR, DEFAULT_PROFIT_BPS};

pub const RPC_URL_ENV: &str = "GOLDMINT_RPC_URL";
pub const ACCOUNT_ENV: &str = "GOLDMINT_ACCOUNT";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chain: ChainSection,
    #[serde(default)]
    pub wallet: WalletSection,
    #[serde(default)]
    pub purchase: PurchaseSection,
    #[serde(default)]
    pub rpc: RpcSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Chain and contract
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSection {
    /// JSON-RPC endpoint that can sign for the account
    pub rpc_url: String,
    /// Expected chain id (11155111 = Sepolia)
    pub chain_id: u64,
    /// Deployed token contract
    pub contract_address: String,
}

impl ChainSection {
    /// Get RPC URL with environment variable override
    pub fn get_rpc_url(&self) -> String {
        std::env::var(RPC_URL_ENV).unwrap_or_else(|_| self.rpc_url.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletSection {
    /// Signing account; the endpoint's first account when unset
    #[serde(default)]
    pub account: Option<String>,
}

impl WalletSection {
    /// Get account with environment variable override
    pub fn get_account(&self) -> Option<String> {
        std::env::var(ACCOUNT_ENV)
            .ok()
            .filter(|a| !a.is_empty())
            .or_else(|| self.account.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseSection {
    /// ETH kept back by the max-amount helper
    #[serde(default = "default_fee_reserve")]
    pub fee_reserve: Decimal,
    /// Profit share the contract mints, in basis points
    #[serde(default = "default_profit_bps")]
    pub profit_bps: u32,
    /// 0 waits for a receipt indefinitely
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

impl Default for PurchaseSection {
    fn default() -> Self {
        Self {
            fee_reserve: default_fee_reserve(),
            profit_bps: default_profit_bps(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
        }
    }
}

fn default_fee_reserve() -> Decimal {
    DEFAULT_FEE_RESERVE
}

fn default_profit_bps() -> u32 {
    DEFAULT_PROFIT_BPS
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_receipt_poll_interval_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attempts for reads; sends are never retried
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file. `~` in the path is expanded.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let raw = path.as_ref().to_string_lossy();
    let expanded = shellexpand::tilde(&raw).to_string();
    let content = std::fs::read_to_string(expanded)?;
    parse_config(&content)
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.get_rpc_url().trim().is_empty() {
            return Err(ConfigError::ValidationError("rpc_url cannot be empty".to_string()));
        }

        if self.chain.chain_id == 0 {
            return Err(ConfigError::ValidationError("chain_id must be > 0".to_string()));
        }

        self.contract()?;
        self.account()?;

        if self.purchase.fee_reserve < Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "fee_reserve must be >= 0, got {}",
                self.purchase.fee_reserve
            )));
        }

        if self.purchase.profit_bps > BPS_DENOMINATOR {
            return Err(ConfigError::ValidationError(format!(
                "profit_bps must be 0-{}, got {}",
                BPS_DENOMINATOR, self.purchase.profit_bps
            )));
        }

        if self.purchase.receipt_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "receipt_poll_interval_ms must be > 0".to_string(),
            ));
        }

        if self.rpc.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.rpc.max_retries == 0 {
            return Err(ConfigError::ValidationError("max_retries must be >= 1".to_string()));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }

    pub fn contract(&self) -> Result<Address, ConfigError> {
        parse_address(self.chain.contract_address.trim()).map_err(|e| {
            ConfigError::ValidationError(format!(
                "contract_address {:?}: {}",
                self.chain.contract_address, e
            ))
        })
    }

    /// Configured signing account, after the environment override
    pub fn account(&self) -> Result<Option<Address>, ConfigError> {
        self.wallet
            .get_account()
            .map(|raw| {
                parse_address(raw.trim())
                    .map_err(|e| ConfigError::ValidationError(format!("account {:?}: {}", raw, e)))
            })
            .transpose()
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        match self.purchase.confirmation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.purchase.receipt_poll_interval_ms)
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        OrchestratorConfig {
            profit_bps: config.purchase.profit_bps,
            confirmation_timeout: config.confirmation_timeout(),
            fee_reserve: config.purchase.fee_reserve,
        }
    }
}

impl From<&Config> for RpcConfig {
    fn from(config: &Config) -> Self {
        RpcConfig {
            url: config.chain.get_rpc_url(),
            timeout: Duration::from_secs(config.rpc.request_timeout_secs),
            max_retries: config.rpc.max_retries,
            ..RpcConfig::default()
        }
    }
}
