//! Strategy manager and per-strategy reads.

use std::sync::Arc;

use alloy::primitives::{Address, U256};

use crate::backend::{ContractBackend, read};
use crate::contracts::{IStrategy, IStrategyManager};
use crate::error::ProviderError;
use crate::types::StrategyInfo;

pub struct StrategyService {
    backend: Arc<dyn ContractBackend>,
    manager: Address,
}

impl StrategyService {
    pub fn new(backend: Arc<dyn ContractBackend>, manager: Address) -> Self {
        Self { backend, manager }
    }

    pub fn manager_address(&self) -> Address {
        self.manager
    }

    pub fn is_configured(&self) -> bool {
        !self.manager.is_zero()
    }

    /// Total assets actively deployed in strategies; zero if the query fails.
    pub async fn get_total_assets_in_strategies(&self) -> U256 {
        if !self.is_configured() {
            return U256::ZERO;
        }
        read(
            self.backend.as_ref(),
            self.manager,
            IStrategyManager::totalAssetsInStrategiesCall {},
        )
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to get strategy assets: {e}");
            U256::ZERO
        })
    }

    /// Name, APR, status and allocation of one strategy.
    ///
    /// The four reads run concurrently. If any of them fails the whole
    /// record is reported absent; a partial record is never returned.
    pub async fn get_strategy_info(&self, strategy: Address) -> Option<StrategyInfo> {
        match self.fetch_strategy_info(strategy).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::error!("Failed to fetch info for strategy {strategy}: {e}");
                None
            }
        }
    }

    async fn fetch_strategy_info(&self, strategy: Address) -> Result<StrategyInfo, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::new(
                "Strategy manager contract address is not configured.",
            ));
        }

        let backend = self.backend.as_ref();
        let (name, apr, is_active, allocation) = futures::try_join!(
            read(backend, strategy, IStrategy::nameCall {}),
            read(backend, strategy, IStrategy::aprCall {}),
            read(backend, strategy, IStrategy::isActiveCall {}),
            read(
                backend,
                self.manager,
                IStrategyManager::getStrategyAllocationCall { strategy },
            ),
        )?;

        Ok(StrategyInfo {
            address: strategy,
            name,
            apr,
            is_active,
            allocation,
        })
    }

    /// Every strategy registered with the manager that could be fully read.
    pub async fn list_strategies(&self) -> Vec<StrategyInfo> {
        if !self.is_configured() {
            return Vec::new();
        }
        let addresses = match read(
            self.backend.as_ref(),
            self.manager,
            IStrategyManager::getStrategiesCall {},
        )
        .await
        {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::error!("Failed to enumerate strategies: {e}");
                return Vec::new();
            }
        };

        let lookups = addresses.iter().map(|addr| self.get_strategy_info(*addr));
        futures::future::join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}
