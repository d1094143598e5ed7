use alloy::primitives::{Address, B256, U256};

/// Outcome of a transaction that was included on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// `false` when the transaction was included but reverted.
    pub success: bool,
}

/// Point-in-time view of the vault for one account.
///
/// Always fetched fresh; on-chain state can change every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultSnapshot {
    pub total_assets: U256,
    pub caller_share_balance: U256,
    /// Assets redeemable for one whole share (`10^18` share units).
    pub share_price: U256,
}

/// Display data for one strategy, keyed by its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyInfo {
    pub address: Address,
    pub name: String,
    pub apr: U256,
    pub is_active: bool,
    pub allocation: U256,
}

/// A decoded `Deposit` event emitted by the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub sender: Address,
    pub owner: Address,
    pub assets: U256,
    pub shares: U256,
    pub block_number: Option<u64>,
    pub tx_hash: Option<B256>,
}
