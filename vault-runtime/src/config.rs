//! Deployment configuration, read from environment-style variables.
//!
//! Unset contract addresses fall back to the zero address, which every
//! consumer treats as "not configured".

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::error::ConfigError;
use crate::gas::DEFAULT_GAS_BUFFER_PERCENT;
use crate::networks::NETWORKS;

pub const DEFAULT_CHAIN_ID: u64 = 11155111;
pub const DEFAULT_DEPOSIT_POLL_SECS: u64 = 12;

/// Addresses of the two protocol contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContractAddresses {
    pub vault: Address,
    pub strategy_manager: Address,
}

impl ContractAddresses {
    pub fn vault_configured(&self) -> bool {
        !self.vault.is_zero()
    }

    pub fn strategy_manager_configured(&self) -> bool {
        !self.strategy_manager.is_zero()
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub addresses: ContractAddresses,
    /// Chain the local wallet starts on.
    pub chain_id: u64,
    /// Overrides the registry endpoint for `chain_id`.
    pub rpc_url: Option<String>,
    pub wallet_keys: Vec<PrivateKeySigner>,
    pub gas_buffer_percent: u64,
    pub deposit_poll_interval: Duration,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let addresses = ContractAddresses {
            vault: parse_address("VAULT_ADDRESS", get("VAULT_ADDRESS"))?,
            strategy_manager: parse_address(
                "STRATEGY_MANAGER_ADDRESS",
                get("STRATEGY_MANAGER_ADDRESS"),
            )?,
        };

        let chain_id = parse_u64("CHAIN_ID", get("CHAIN_ID"), DEFAULT_CHAIN_ID)?;
        let gas_buffer_percent = parse_u64(
            "GAS_BUFFER_PERCENT",
            get("GAS_BUFFER_PERCENT"),
            DEFAULT_GAS_BUFFER_PERCENT,
        )?;
        if gas_buffer_percent < 100 {
            return Err(ConfigError::InvalidValue {
                key: "GAS_BUFFER_PERCENT".into(),
                message: format!("{gas_buffer_percent} would shrink the estimate (minimum 100)"),
            });
        }
        let poll_secs = parse_u64(
            "DEPOSIT_POLL_INTERVAL_SECS",
            get("DEPOSIT_POLL_INTERVAL_SECS"),
            DEFAULT_DEPOSIT_POLL_SECS,
        )?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DEPOSIT_POLL_INTERVAL_SECS".into(),
                message: "poll interval must be at least 1 second".into(),
            });
        }

        let wallet_keys = get("WALLET_PRIVATE_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|key| {
                key.parse::<PrivateKeySigner>()
                    .map_err(|e| ConfigError::InvalidKey(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            addresses,
            chain_id,
            rpc_url: get("RPC_URL"),
            wallet_keys,
            gas_buffer_percent,
            deposit_poll_interval: Duration::from_secs(poll_secs),
        })
    }

    /// RPC endpoint per chain: the registry, with `rpc_url` applied to `chain_id`.
    pub fn rpc_urls(&self) -> HashMap<u64, String> {
        let mut urls: HashMap<u64, String> = NETWORKS
            .iter()
            .map(|n| (n.chain_id, n.rpc_url.to_string()))
            .collect();
        if let Some(url) = &self.rpc_url {
            urls.insert(self.chain_id, url.clone());
        }
        urls
    }

    pub fn active_rpc_url(&self) -> Option<String> {
        self.rpc_urls().remove(&self.chain_id)
    }
}

fn parse_address(key: &str, value: Option<String>) -> Result<Address, ConfigError> {
    match value {
        None => Ok(Address::ZERO),
        Some(v) => v.parse().map_err(|e| ConfigError::InvalidAddress {
            key: key.to_string(),
            message: format!("'{v}': {e}"),
        }),
    }
}

fn parse_u64(key: &str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{v}': {e}"),
        }),
    }
}
