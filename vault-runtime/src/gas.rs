//! Gas estimation with a safety buffer.

use alloy::rpc::types::TransactionRequest;

use crate::backend::ContractBackend;
use crate::error::ProviderError;

/// 120% of the estimate, i.e. a 20% buffer.
pub const DEFAULT_GAS_BUFFER_PERCENT: u64 = 120;

/// Scale `estimate` by `buffer_percent / 100`, saturating at `u64::MAX`.
pub fn apply_gas_buffer(estimate: u64, buffer_percent: u64) -> u64 {
    let scaled = u128::from(estimate) * u128::from(buffer_percent) / 100;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Estimate gas for `tx` and inflate it by `buffer_percent`.
///
/// Estimation failures are returned untouched: a failed estimate usually
/// means the call itself would revert.
pub async fn estimate_gas_with_buffer(
    backend: &dyn ContractBackend,
    tx: TransactionRequest,
    buffer_percent: u64,
) -> Result<u64, ProviderError> {
    match backend.estimate_gas(tx).await {
        Ok(estimate) => {
            let buffered = apply_gas_buffer(estimate, buffer_percent);
            tracing::debug!("Gas estimate {estimate} buffered to {buffered} ({buffer_percent}%)");
            Ok(buffered)
        }
        Err(e) => {
            tracing::warn!("Gas estimation failed: {e}");
            Err(e)
        }
    }
}
