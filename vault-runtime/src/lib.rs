pub mod error;
pub mod types;
pub mod contracts;
pub mod backend;
pub mod chain;
pub mod gas;
pub mod events;
pub mod vault_client;
pub mod strategy;
pub mod gateway;
pub mod wallet;
pub mod session;
pub mod networks;
pub mod config;

pub use error::{ErrorCategory, NormalizedError, ProviderError, normalize};
pub use gateway::ContractGateway;
pub use session::{ConnectOutcome, SessionManager, SessionState};
pub use types::*;
pub use wallet::{LocalWalletProvider, WalletEvent, WalletProvider};
