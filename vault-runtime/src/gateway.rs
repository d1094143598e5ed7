//! Entry point bundling the vault and strategy services over one backend.

use std::sync::Arc;

use alloy::primitives::Address;

use crate::backend::ContractBackend;
use crate::config::ContractAddresses;
use crate::strategy::StrategyService;
use crate::vault_client::VaultService;

/// Typed access to the protocol contracts through a single backend.
///
/// Bound to one signing capability (or a read-only backend); build a new
/// gateway whenever the session changes.
pub struct ContractGateway {
    backend: Arc<dyn ContractBackend>,
    pub vault: VaultService,
    pub strategies: StrategyService,
}

impl ContractGateway {
    pub fn new(backend: Arc<dyn ContractBackend>, addresses: &ContractAddresses) -> Self {
        Self {
            vault: VaultService::new(backend.clone(), addresses.vault),
            strategies: StrategyService::new(backend.clone(), addresses.strategy_manager),
            backend,
        }
    }

    pub fn with_gas_buffer(mut self, buffer_percent: u64) -> Self {
        self.vault = self.vault.with_gas_buffer(buffer_percent);
        self
    }

    /// Whether write operations can be signed.
    pub fn has_signer(&self) -> bool {
        self.backend.account().is_some()
    }

    pub fn account(&self) -> Option<Address> {
        self.backend.account()
    }

    pub fn backend(&self) -> &Arc<dyn ContractBackend> {
        &self.backend
    }
}
