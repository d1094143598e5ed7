//! The read/write RPC boundary the gateway talks through.
//!
//! Everything above this trait deals in typed `sol!` calls; everything below
//! it is a JSON-RPC round trip. Tests substitute scripted backends here.

use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::TransactionOutcome;

#[async_trait]
pub trait ContractBackend: Send + Sync {
    /// Address that signs outgoing transactions, or `None` for a read-only backend.
    fn account(&self) -> Option<Address>;

    /// `eth_call` against the latest block.
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, ProviderError>;

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, ProviderError>;

    /// Submit a transaction and wait for one block of inclusion.
    ///
    /// `Ok(None)` means the node never produced a receipt for it.
    async fn send_and_confirm(
        &self,
        tx: TransactionRequest,
    ) -> Result<Option<TransactionOutcome>, ProviderError>;

    async fn get_logs(&self, filter: Filter) -> Result<Vec<Log>, ProviderError>;

    async fn block_number(&self) -> Result<u64, ProviderError>;
}

/// Build a transaction request carrying the ABI-encoded `call` to `to`.
pub fn call_request<C: SolCall>(to: Address, call: &C) -> TransactionRequest {
    TransactionRequest::default()
        .to(to)
        .input(Bytes::from(call.abi_encode()).into())
}

/// Run a view call and decode its return value.
pub async fn read<C: SolCall>(
    backend: &dyn ContractBackend,
    to: Address,
    call: C,
) -> Result<C::Return, ProviderError> {
    let data = backend.call(call_request(to, &call)).await?;
    C::abi_decode_returns(&data).map_err(|e| {
        ProviderError::new(format!("Failed to decode {} return data: {e}", C::SIGNATURE))
    })
}
