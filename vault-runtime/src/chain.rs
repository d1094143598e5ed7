//! alloy-backed implementation of [`ContractBackend`].
//!
//! Provides a read-only HTTP backend and a signing backend that fills nonce,
//! gas and chain ID and signs with a local private key.

use alloy::network::{Ethereum, EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, Bytes};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::backend::ContractBackend;
use crate::error::{ConfigError, ProviderError};
use crate::types::TransactionOutcome;

/// The concrete provider type produced by `ProviderBuilder::new().wallet(...).connect_http(...)`.
pub type HttpProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
    Ethereum,
>;

/// A [`ContractBackend`] over any alloy provider.
pub struct AlloyBackend<P> {
    provider: P,
    account: Option<Address>,
}

impl<P: Provider> AlloyBackend<P> {
    pub fn new(provider: P, account: Option<Address>) -> Self {
        Self { provider, account }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl AlloyBackend<RootProvider<Ethereum>> {
    /// A backend that can only read.
    pub fn read_only(rpc_url: &str) -> Result<Self, ConfigError> {
        let url = parse_url(rpc_url)?;
        Ok(Self::new(RootProvider::new_http(url), None))
    }
}

impl AlloyBackend<HttpProvider> {
    /// A backend that signs with `signer`.
    pub fn with_signer(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self, ConfigError> {
        let url = parse_url(rpc_url)?;
        let account = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url);
        Ok(Self::new(provider, Some(account)))
    }

    /// Like [`AlloyBackend::with_signer`], from a hex private key (with or without `0x`).
    pub fn with_private_key(rpc_url: &str, private_key: &str) -> Result<Self, ConfigError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| ConfigError::InvalidKey(format!("{e}")))?;
        Self::with_signer(rpc_url, signer)
    }
}

fn parse_url(rpc_url: &str) -> Result<url::Url, ConfigError> {
    rpc_url
        .parse()
        .map_err(|e| ConfigError::InvalidUrl(format!("'{rpc_url}': {e}")))
}

#[async_trait]
impl<P: Provider + 'static> ContractBackend for AlloyBackend<P> {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, ProviderError> {
        Ok(self.provider.call(tx).await?)
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, ProviderError> {
        Ok(self.provider.estimate_gas(tx).await?)
    }

    async fn send_and_confirm(
        &self,
        tx: TransactionRequest,
    ) -> Result<Option<TransactionOutcome>, ProviderError> {
        let pending = self.provider.send_transaction(tx).await?;
        tracing::debug!("Transaction submitted: {}", pending.tx_hash());

        let tx_hash = pending
            .with_required_confirmations(1)
            .watch()
            .await
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;

        Ok(receipt.map(|r| TransactionOutcome {
            tx_hash,
            block_number: r.block_number,
            gas_used: r.gas_used,
            success: r.status(),
        }))
    }

    async fn get_logs(&self, filter: Filter) -> Result<Vec<Log>, ProviderError> {
        Ok(self.provider.get_logs(&filter).await?)
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        Ok(self.provider.get_block_number().await?)
    }
}
