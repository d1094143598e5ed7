//! Display metadata for the chains the dashboard knows about.
//!
//! Chains outside this table are still usable; they just have no metadata.

use alloy::primitives::{Address, B256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub chain_id: u64,
    pub name: &'static str,
    pub currency: &'static str,
    pub rpc_url: &'static str,
    pub explorer: &'static str,
}

pub const NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        chain_id: 1,
        name: "Ethereum Mainnet",
        currency: "ETH",
        rpc_url: "https://ethereum-rpc.publicnode.com",
        explorer: "https://etherscan.io",
    },
    NetworkInfo {
        chain_id: 5,
        name: "Goerli Testnet",
        currency: "ETH",
        rpc_url: "https://ethereum-goerli-rpc.publicnode.com",
        explorer: "https://goerli.etherscan.io",
    },
    NetworkInfo {
        chain_id: 11155111,
        name: "Sepolia Testnet",
        currency: "ETH",
        rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
        explorer: "https://sepolia.etherscan.io",
    },
    NetworkInfo {
        chain_id: 137,
        name: "Polygon",
        currency: "MATIC",
        rpc_url: "https://polygon-rpc.com",
        explorer: "https://polygonscan.com",
    },
];

pub fn network(chain_id: u64) -> Option<&'static NetworkInfo> {
    NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

pub fn is_supported(chain_id: u64) -> bool {
    network(chain_id).is_some()
}

/// Human-readable chain name, falling back to the raw id.
pub fn display_name(chain_id: u64) -> String {
    match network(chain_id) {
        Some(n) => n.name.to_string(),
        None => format!("Unknown network ({chain_id})"),
    }
}

impl NetworkInfo {
    pub fn tx_url(&self, tx_hash: &B256) -> String {
        format!("{}/tx/{tx_hash}", self.explorer)
    }

    pub fn address_url(&self, address: &Address) -> String {
        format!("{}/address/{address}", self.explorer)
    }
}
