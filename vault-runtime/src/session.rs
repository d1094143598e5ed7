//! Wallet session lifecycle.
//!
//! The [`SessionManager`] is the single owner of the wallet provider's event
//! subscription: one listener per manager, registered on construction and
//! removed on [`SessionManager::detach`] or drop.
//!
//! States: Disconnected → Connecting on `connect()`; Connecting → Connected
//! on success, back to Disconnected on failure; Connected → Disconnected on
//! `disconnect()` or an empty `accountsChanged`. `chainChanged` updates the
//! chain id in place. A `disconnect()` racing an in-flight `connect()` is not
//! prevented; whichever write lands last wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alloy::primitives::Address;
use serde_json::Value;
use tokio::sync::watch;

use crate::backend::ContractBackend;
use crate::config::ContractAddresses;
use crate::error::{NormalizedError, ProviderError, normalize};
use crate::gateway::ContractGateway;
use crate::wallet::{WalletEvent, WalletListener, WalletProvider, format_chain_id, methods, parse_chain_id};

/// Current session as seen by consumers.
///
/// `account` is set exactly when a signing capability is held.
#[derive(Clone, Default)]
pub struct SessionState {
    account: Option<Address>,
    chain_id: Option<u64>,
    signer: Option<Arc<dyn ContractBackend>>,
    is_connecting: bool,
}

impl SessionState {
    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn signer(&self) -> Option<Arc<dyn ContractBackend>> {
        self.signer.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub fn is_connecting(&self) -> bool {
        self.is_connecting
    }

    /// `0x1234...abcd` form of the active account.
    pub fn shortened_account(&self) -> Option<String> {
        self.account.map(|a| shorten_address(&a))
    }

    fn clear(&mut self) -> bool {
        let changed = self.account.is_some() || self.chain_id.is_some() || self.signer.is_some();
        self.account = None;
        self.chain_id = None;
        self.signer = None;
        changed
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .field("has_signer", &self.signer.is_some())
            .field("is_connecting", &self.is_connecting)
            .finish()
    }
}

pub fn shorten_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Result of a `connect()` call. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Address),
    /// Another `connect()` is still waiting on the wallet; no new prompt was issued.
    AlreadyConnecting,
    /// No wallet provider is installed.
    Unavailable,
    Failed(NormalizedError),
}

pub struct SessionManager {
    provider: Option<Arc<dyn WalletProvider>>,
    state: Arc<watch::Sender<SessionState>>,
    connecting: AtomicBool,
    /// 0 when no listener is registered.
    listener: AtomicU64,
}

impl SessionManager {
    /// Create a manager over the injected `provider` (if any) and subscribe
    /// to its account and chain notifications.
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let manager = Self {
            provider,
            state: Arc::new(state),
            connecting: AtomicBool::new(false),
            listener: AtomicU64::new(0),
        };
        manager.attach();
        manager
    }

    fn attach(&self) {
        let Some(provider) = &self.provider else {
            return;
        };
        let state = self.state.clone();
        let weak_provider = Arc::downgrade(provider);
        let listener: WalletListener = Arc::new(move |event: &WalletEvent| {
            let provider = weak_provider.upgrade();
            reconcile(&state, provider.as_deref(), event);
        });
        let id = provider.subscribe(listener);
        self.listener.store(id, Ordering::Release);
        tracing::debug!("Session listener {id} registered");
    }

    /// Remove this manager's provider listener. Safe to call repeatedly.
    pub fn detach(&self) {
        let id = self.listener.swap(0, Ordering::AcqRel);
        if id == 0 {
            return;
        }
        if let Some(provider) = &self.provider {
            provider.unsubscribe(id);
            tracing::debug!("Session listener {id} removed");
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every session change.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Ask the wallet for an account and adopt it, its chain and its signer together.
    pub async fn connect(&self) -> ConnectOutcome {
        let Some(provider) = self.provider.clone() else {
            tracing::warn!("No wallet provider available; install a browser wallet");
            return ConnectOutcome::Unavailable;
        };

        if self
            .connecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("connect() ignored: a connection attempt is already in flight");
            return ConnectOutcome::AlreadyConnecting;
        }
        let _guard = ConnectingGuard::new(self);

        match establish(provider.as_ref()).await {
            Ok((account, chain_id, signer)) => {
                self.state.send_modify(|s| {
                    s.account = Some(account);
                    s.chain_id = Some(chain_id);
                    s.signer = Some(signer);
                });
                tracing::info!("Wallet connected: {account} on chain {chain_id}");
                ConnectOutcome::Connected(account)
            }
            Err(e) => {
                tracing::error!("Connection error: {e}");
                ConnectOutcome::Failed(normalize(&e))
            }
        }
    }

    /// Drop the session. Calling it when already disconnected does nothing.
    pub fn disconnect(&self) {
        if self.state.send_if_modified(SessionState::clear) {
            tracing::info!("Wallet disconnected");
        }
    }

    /// Ask the wallet to switch to `chain_id`.
    ///
    /// The local chain id is left alone; it follows the wallet's own
    /// `chainChanged` notification. Returns whether the wallet accepted.
    pub async fn switch_network(&self, chain_id: u64) -> bool {
        let Some(provider) = &self.provider else {
            tracing::warn!("Cannot switch network: no wallet provider");
            return false;
        };
        let params = serde_json::json!([{ "chainId": format_chain_id(chain_id) }]);
        match provider.request(methods::SWITCH_CHAIN, params).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Network switch error: {e}");
                false
            }
        }
    }

    /// A gateway bound to the current signing capability, if connected.
    pub fn gateway(&self, addresses: &ContractAddresses) -> Option<ContractGateway> {
        let signer = self.state.borrow().signer.clone()?;
        Some(ContractGateway::new(signer, addresses))
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Clears the in-flight flag however `connect()` exits, including cancellation.
struct ConnectingGuard<'a> {
    manager: &'a SessionManager,
}

impl<'a> ConnectingGuard<'a> {
    fn new(manager: &'a SessionManager) -> Self {
        manager.state.send_modify(|s| s.is_connecting = true);
        Self { manager }
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.manager.state.send_modify(|s| s.is_connecting = false);
        self.manager.connecting.store(false, Ordering::Release);
    }
}

async fn establish(
    provider: &dyn WalletProvider,
) -> Result<(Address, u64, Arc<dyn ContractBackend>), ProviderError> {
    let accounts = provider
        .request(methods::REQUEST_ACCOUNTS, Value::Array(Vec::new()))
        .await?;
    let first = accounts
        .as_array()
        .and_then(|list| list.first())
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::new("Wallet returned no accounts"))?;
    let account: Address = first
        .parse()
        .map_err(|e| ProviderError::new(format!("Wallet returned invalid account '{first}': {e}")))?;

    let chain = provider
        .request(methods::CHAIN_ID, Value::Array(Vec::new()))
        .await?;
    let chain_id = chain
        .as_str()
        .and_then(parse_chain_id)
        .ok_or_else(|| ProviderError::new(format!("Wallet returned invalid chain id {chain}")))?;

    let signer = provider.signer(account)?;
    Ok((account, chain_id, signer))
}

/// Apply a wallet notification to the session.
fn reconcile(
    state: &watch::Sender<SessionState>,
    provider: Option<&dyn WalletProvider>,
    event: &WalletEvent,
) {
    match event {
        WalletEvent::AccountsChanged(accounts) => {
            let Some(first) = accounts.first() else {
                if state.send_if_modified(SessionState::clear) {
                    tracing::info!("Wallet reported no accounts; session closed");
                }
                return;
            };
            let account: Address = match first.parse() {
                Ok(account) => account,
                Err(e) => {
                    tracing::warn!("Ignoring accountsChanged with invalid account '{first}': {e}");
                    return;
                }
            };

            let current = state.borrow().account;
            // Only a live session follows the wallet's account selection.
            if current.is_none() || current == Some(account) {
                return;
            }
            let Some(provider) = provider else {
                return;
            };
            match provider.signer(account) {
                Ok(signer) => {
                    state.send_modify(|s| {
                        s.account = Some(account);
                        s.signer = Some(signer);
                    });
                    tracing::info!("Active account changed to {account}");
                }
                Err(e) => {
                    tracing::warn!("No signer for new account {account}: {e}; closing session");
                    state.send_if_modified(SessionState::clear);
                }
            }
        }
        WalletEvent::ChainChanged(hex) => {
            let Some(chain_id) = parse_chain_id(hex) else {
                tracing::warn!("Ignoring chainChanged with invalid payload '{hex}'");
                return;
            };
            let current = state.borrow().account;
            let Some(account) = current else {
                state.send_modify(|s| s.chain_id = Some(chain_id));
                tracing::info!("Chain changed to {chain_id}");
                return;
            };
            // A live session must sign on the chain it reports.
            let rebound = provider
                .ok_or_else(|| ProviderError::new("wallet provider is gone"))
                .and_then(|provider| provider.signer(account));
            match rebound {
                Ok(signer) => state.send_modify(|s| {
                    s.chain_id = Some(chain_id);
                    s.signer = Some(signer);
                }),
                Err(e) => {
                    tracing::warn!(
                        "No signer for {account} on chain {chain_id}: {e}; closing session"
                    );
                    state.send_if_modified(SessionState::clear);
                    return;
                }
            }
            tracing::info!("Chain changed to {chain_id}");
        }
    }
}
