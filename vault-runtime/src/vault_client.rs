//! Vault operations: deposits, withdrawals and display-path reads.
//!
//! Writes carry a buffered gas limit, wait for one block of inclusion and
//! surface every failure as a [`NormalizedError`]. Reads never fail: each has a documented fallback
//! (zero, or identity for share conversion) and logs the underlying error.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;

use crate::backend::{ContractBackend, call_request, read};
use crate::contracts::IVault;
use crate::error::{ErrorCategory, NormalizedError, ProviderError, normalize};
use crate::events::{DepositWatcher, SubscriberRegistry, Subscription};
use crate::gas::{DEFAULT_GAS_BUFFER_PERCENT, estimate_gas_with_buffer};
use crate::types::{DepositEvent, TransactionOutcome, VaultSnapshot};

/// Share amount whose asset value is reported as the share price.
pub const ONE_SHARE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

pub struct VaultService {
    backend: Arc<dyn ContractBackend>,
    address: Address,
    gas_buffer_percent: u64,
    deposits: Arc<SubscriberRegistry<DepositEvent>>,
}

impl VaultService {
    pub fn new(backend: Arc<dyn ContractBackend>, address: Address) -> Self {
        Self {
            backend,
            address,
            gas_buffer_percent: DEFAULT_GAS_BUFFER_PERCENT,
            deposits: Arc::new(SubscriberRegistry::new()),
        }
    }

    pub fn with_gas_buffer(mut self, buffer_percent: u64) -> Self {
        self.gas_buffer_percent = buffer_percent;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The zero address means no vault was configured for this deployment.
    pub fn is_configured(&self) -> bool {
        !self.address.is_zero()
    }

    // ── Transaction encoding ────────────────────────────────────────────

    /// `deposit(uint256 assets, address receiver)`
    pub fn deposit_request(&self, assets: U256, receiver: Address) -> TransactionRequest {
        self.request(&IVault::depositCall { assets, receiver })
    }

    /// `withdraw(uint256 assets, address receiver, address owner)`
    pub fn withdraw_request(&self, assets: U256, receiver: Address, owner: Address) -> TransactionRequest {
        self.request(&IVault::withdrawCall {
            assets,
            receiver,
            owner,
        })
    }

    /// `redeem(uint256 shares, address receiver, address owner)`
    pub fn redeem_request(&self, shares: U256, receiver: Address, owner: Address) -> TransactionRequest {
        self.request(&IVault::redeemCall {
            shares,
            receiver,
            owner,
        })
    }

    fn request<C: SolCall>(&self, call: &C) -> TransactionRequest {
        let tx = call_request(self.address, call);
        match self.backend.account() {
            Some(from) => tx.from(from),
            None => tx,
        }
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Deposit `assets` of the underlying token, minting shares to `receiver`.
    pub async fn deposit(
        &self,
        assets: U256,
        receiver: Address,
    ) -> Result<TransactionOutcome, NormalizedError> {
        self.execute_tx("deposit", self.deposit_request(assets, receiver))
            .await
    }

    /// Withdraw `assets` of the underlying token to `receiver`, burning `owner`'s shares.
    pub async fn withdraw(
        &self,
        assets: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<TransactionOutcome, NormalizedError> {
        self.execute_tx("withdraw", self.withdraw_request(assets, receiver, owner))
            .await
    }

    /// Burn exactly `shares` of `owner`'s shares, sending the assets to `receiver`.
    pub async fn redeem(
        &self,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<TransactionOutcome, NormalizedError> {
        self.execute_tx("redeem", self.redeem_request(shares, receiver, owner))
            .await
    }

    async fn execute_tx(
        &self,
        label: &str,
        tx: TransactionRequest,
    ) -> Result<TransactionOutcome, NormalizedError> {
        if !self.is_configured() {
            return Err(NormalizedError::not_configured("Vault"));
        }
        if self.backend.account().is_none() {
            return Err(NormalizedError::new(
                ErrorCategory::ProviderUnavailable,
                "Connect a wallet to send transactions.",
            ));
        }

        let gas_limit =
            estimate_gas_with_buffer(self.backend.as_ref(), tx.clone(), self.gas_buffer_percent)
                .await
                .map_err(|e| {
                    tracing::warn!("Vault {label} gas estimation failed: {e}");
                    normalize(&e)
                })?;
        let tx = tx.gas_limit(gas_limit);

        let outcome = self.backend.send_and_confirm(tx).await.map_err(|e| {
            tracing::warn!("Vault {label} failed: {e}");
            normalize(&e)
        })?;

        let Some(outcome) = outcome else {
            tracing::warn!("Vault {label} produced no receipt");
            return Err(normalize(&ProviderError::new(
                "Transaction failed or receipt is null",
            )));
        };

        if !outcome.success {
            tracing::warn!("Vault {label} reverted in tx {}", outcome.tx_hash);
            return Err(NormalizedError::new(
                ErrorCategory::ContractRevert,
                "Transaction reverted on-chain.",
            ));
        }

        tracing::info!(
            "Vault {label} confirmed: tx={}, block={:?}, gas={}",
            outcome.tx_hash,
            outcome.block_number,
            outcome.gas_used
        );
        Ok(outcome)
    }

    // ── Gas ─────────────────────────────────────────────────────────────

    pub async fn estimate_deposit_gas(
        &self,
        assets: U256,
        receiver: Address,
    ) -> Result<u64, ProviderError> {
        self.estimate(self.deposit_request(assets, receiver)).await
    }

    pub async fn estimate_withdraw_gas(
        &self,
        assets: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<u64, ProviderError> {
        self.estimate(self.withdraw_request(assets, receiver, owner))
            .await
    }

    pub async fn estimate_redeem_gas(
        &self,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<u64, ProviderError> {
        self.estimate(self.redeem_request(shares, receiver, owner))
            .await
    }

    async fn estimate(&self, tx: TransactionRequest) -> Result<u64, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::new("Vault contract address is not configured."));
        }
        estimate_gas_with_buffer(self.backend.as_ref(), tx, self.gas_buffer_percent).await
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Vault share balance of `account`; zero if the query fails.
    pub async fn get_balance(&self, account: Address) -> U256 {
        self.read_or("balance", IVault::balanceOfCall { account }, U256::ZERO)
            .await
    }

    /// Total assets managed by the vault; zero if the query fails.
    pub async fn get_total_assets(&self) -> U256 {
        self.read_or("total assets", IVault::totalAssetsCall {}, U256::ZERO)
            .await
    }

    /// Asset value of `shares`; `shares` itself (1:1) if the query fails.
    pub async fn convert_to_assets(&self, shares: U256) -> U256 {
        self.read_or(
            "share conversion",
            IVault::convertToAssetsCall { shares },
            shares,
        )
        .await
    }

    /// Fresh snapshot of the vault for `account`.
    pub async fn snapshot(&self, account: Address) -> VaultSnapshot {
        let (total_assets, caller_share_balance, share_price) = tokio::join!(
            self.get_total_assets(),
            self.get_balance(account),
            self.convert_to_assets(ONE_SHARE),
        );
        VaultSnapshot {
            total_assets,
            caller_share_balance,
            share_price,
        }
    }

    async fn read_or<C: SolCall>(&self, what: &str, call: C, fallback: C::Return) -> C::Return {
        if !self.is_configured() {
            tracing::debug!("Vault not configured; {what} falls back");
            return fallback;
        }
        match read(self.backend.as_ref(), self.address, call).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Error fetching {what}: {e}");
                fallback
            }
        }
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Register `callback` for `Deposit` events.
    ///
    /// The returned [`Subscription`] removes exactly this callback.
    pub fn on_deposit(
        &self,
        callback: impl Fn(&DepositEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.deposits.subscribe(Arc::new(callback))
    }

    pub fn deposit_subscribers(&self) -> &Arc<SubscriberRegistry<DepositEvent>> {
        &self.deposits
    }

    /// A watcher that feeds this vault's `Deposit` logs to `on_deposit` callbacks.
    pub fn deposit_watcher(&self, poll_interval: Duration) -> DepositWatcher {
        DepositWatcher::new(
            self.backend.clone(),
            self.address,
            self.deposits.clone(),
            poll_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_share_is_1e18() {
        assert_eq!(ONE_SHARE, U256::from(10u64).pow(U256::from(18u64)));
    }
}
