//! The injected wallet provider boundary.
//!
//! Mirrors the EIP-1193 surface: JSON-RPC style `request`s plus an event
//! channel carrying `accountsChanged` and `chainChanged` notifications.
//! Listeners are registered and removed by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::backend::ContractBackend;
use crate::chain::AlloyBackend;
use crate::config::DashboardConfig;
use crate::error::ProviderError;
use crate::events::{Callback, ListenerId, SubscriberRegistry};

pub mod methods {
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const ACCOUNTS: &str = "eth_accounts";
    pub const CHAIN_ID: &str = "eth_chainId";
    pub const SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
}

/// EIP-1193 provider error codes.
pub mod codes {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
}

/// Notification pushed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// Ordered account list; empty when the wallet locked or revoked access.
    AccountsChanged(Vec<String>),
    /// Hex-encoded chain id, e.g. `"0x89"`.
    ChainChanged(String),
}

pub type WalletListener = Callback<WalletEvent>;

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn subscribe(&self, listener: WalletListener) -> ListenerId;

    /// Remove exactly the listener registered under `id`.
    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// Signing capability for an authorized `account` on the current chain.
    fn signer(&self, account: Address) -> Result<Arc<dyn ContractBackend>, ProviderError>;
}

/// Parse a hex chain id as delivered by `chainChanged` / `eth_chainId`.
pub fn parse_chain_id(hex: &str) -> Option<u64> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    u64::from_str_radix(digits, 16).ok()
}

pub fn format_chain_id(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}

/// A wallet holding local private keys.
///
/// Behaves like an injected browser wallet: accounts are only exposed after
/// `eth_requestAccounts`, and chain switches are announced on the event
/// channel.
pub struct LocalWalletProvider {
    signers: RwLock<Vec<PrivateKeySigner>>,
    chain_id: AtomicU64,
    rpc_urls: HashMap<u64, String>,
    authorized: AtomicBool,
    reject_next: AtomicBool,
    listeners: SubscriberRegistry<WalletEvent>,
}

impl LocalWalletProvider {
    pub fn new(
        signers: Vec<PrivateKeySigner>,
        chain_id: u64,
        rpc_urls: HashMap<u64, String>,
    ) -> Self {
        Self {
            signers: RwLock::new(signers),
            chain_id: AtomicU64::new(chain_id),
            rpc_urls,
            authorized: AtomicBool::new(false),
            reject_next: AtomicBool::new(false),
            listeners: SubscriberRegistry::new(),
        }
    }

    /// `None` when the configuration carries no keys, i.e. no wallet is installed.
    pub fn from_config(config: &DashboardConfig) -> Option<Self> {
        if config.wallet_keys.is_empty() {
            return None;
        }
        Some(Self::new(
            config.wallet_keys.clone(),
            config.chain_id,
            config.rpc_urls(),
        ))
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::Acquire)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Make the next `eth_requestAccounts` prompt fail as if the user declined it.
    pub fn reject_next_request(&self) {
        self.reject_next.store(true, Ordering::Release);
    }

    /// Replace the wallet's accounts and announce the change.
    ///
    /// An empty list also revokes the dapp's authorization.
    pub fn set_accounts(&self, signers: Vec<PrivateKeySigner>) {
        let addresses: Vec<String> = signers.iter().map(|s| s.address().to_string()).collect();
        *self.signers.write().unwrap_or_else(PoisonError::into_inner) = signers;
        if addresses.is_empty() {
            self.authorized.store(false, Ordering::Release);
        }
        if self.authorized.load(Ordering::Acquire) || addresses.is_empty() {
            self.listeners.emit(&WalletEvent::AccountsChanged(addresses));
        }
    }

    fn addresses(&self) -> Vec<String> {
        self.signers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.address().to_string())
            .collect()
    }

    fn switch_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let requested = params
            .pointer("/0/chainId")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::with_code(-32602, "Expected [{ chainId }] params"))?;
        let target = parse_chain_id(requested).ok_or_else(|| {
            ProviderError::with_code(-32602, format!("Invalid chainId '{requested}'"))
        })?;

        if !self.rpc_urls.contains_key(&target) {
            return Err(ProviderError::with_code(
                codes::UNRECOGNIZED_CHAIN,
                format!(
                    "Unrecognized chain ID \"{requested}\". Try adding the chain using wallet_addEthereumChain first."
                ),
            ));
        }

        let previous = self.chain_id.swap(target, Ordering::AcqRel);
        if previous != target {
            tracing::info!("Wallet switched chain {previous} -> {target}");
            self.listeners
                .emit(&WalletEvent::ChainChanged(format_chain_id(target)));
        }
        Ok(Value::Null)
    }
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        tracing::debug!("Wallet request: {method}");
        match method {
            methods::REQUEST_ACCOUNTS => {
                if self.reject_next.swap(false, Ordering::AcqRel) {
                    return Err(ProviderError::with_code(
                        codes::USER_REJECTED,
                        "user rejected the request",
                    ));
                }
                self.authorized.store(true, Ordering::Release);
                Ok(json!(self.addresses()))
            }
            methods::ACCOUNTS => {
                if self.authorized.load(Ordering::Acquire) {
                    Ok(json!(self.addresses()))
                } else {
                    Ok(json!([]))
                }
            }
            methods::CHAIN_ID => Ok(json!(format_chain_id(self.chain_id()))),
            methods::SWITCH_CHAIN => self.switch_chain(&params),
            other => Err(ProviderError::with_code(
                codes::UNSUPPORTED_METHOD,
                format!("Unsupported method: {other}"),
            )),
        }
    }

    fn subscribe(&self, listener: WalletListener) -> ListenerId {
        self.listeners.insert(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn signer(&self, account: Address) -> Result<Arc<dyn ContractBackend>, ProviderError> {
        if !self.authorized.load(Ordering::Acquire) {
            return Err(ProviderError::with_code(
                codes::UNAUTHORIZED,
                "The requested account has not been authorized by the user.",
            ));
        }
        let signer = self
            .signers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.address() == account)
            .cloned()
            .ok_or_else(|| {
                ProviderError::with_code(codes::UNAUTHORIZED, format!("Unknown account {account}"))
            })?;

        let chain_id = self.chain_id();
        let rpc_url = self
            .rpc_urls
            .get(&chain_id)
            .ok_or_else(|| ProviderError::new(format!("No RPC endpoint for chain {chain_id}")))?;

        let backend = AlloyBackend::with_signer(rpc_url, signer)
            .map_err(|e| ProviderError::new(e.to_string()))?;
        Ok(Arc::new(backend))
    }
}
