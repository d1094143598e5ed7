//! Vault Dashboard - terminal front end for the yield vault and its strategies.
//!
//! Reads run over a plain RPC connection when no wallet is configured;
//! anything that signs connects the local wallet first.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use vault_runtime::backend::ContractBackend;
use vault_runtime::chain::AlloyBackend;
use vault_runtime::config::DashboardConfig;
use vault_runtime::networks::{self, NETWORKS};
use vault_runtime::{ConnectOutcome, ContractGateway, LocalWalletProvider, SessionManager, WalletProvider};

#[derive(Parser)]
#[command(name = "vault-dashboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Vault totals, share price and an account's balance
    Status {
        /// Account to report on (default: the connected wallet)
        #[arg(long)]
        account: Option<Address>,
    },

    /// Deposit assets into the vault, minting shares to the connected account
    Deposit {
        /// Amount in the asset's smallest unit
        assets: U256,
    },

    /// Withdraw assets from the vault to the connected account
    Withdraw {
        /// Amount in the asset's smallest unit
        assets: U256,
    },

    /// Burn shares for their underlying assets
    Redeem {
        /// Shares in their smallest unit
        shares: U256,
    },

    /// List every strategy registered with the manager
    Strategies,

    /// Show one strategy
    Strategy { address: Address },

    /// Ask the wallet to switch chains
    SwitchNetwork { chain_id: u64 },

    /// Show the supported networks
    Networks,

    /// Print vault deposits as they are mined
    Watch,
}

fn setup_log() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};
    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .is_err()
    {}
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_log();

    let cli = Cli::parse();
    let config = DashboardConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Networks => print_networks(config.chain_id),
        Commands::Status { account } => {
            let (session, gateway) = open(&config, false).await?;
            let account = account
                .or_else(|| session.as_ref().and_then(|s| s.state().account()))
                .unwrap_or(Address::ZERO);
            print_status(&config, &gateway, account).await;
        }
        Commands::Deposit { assets } => {
            let (_session, gateway) = open(&config, true).await?;
            let receiver = signing_account(&gateway)?;
            let outcome = gateway.vault.deposit(assets, receiver).await?;
            print_outcome(config.chain_id, &outcome);
        }
        Commands::Withdraw { assets } => {
            let (_session, gateway) = open(&config, true).await?;
            let owner = signing_account(&gateway)?;
            let outcome = gateway.vault.withdraw(assets, owner, owner).await?;
            print_outcome(config.chain_id, &outcome);
        }
        Commands::Redeem { shares } => {
            let (_session, gateway) = open(&config, true).await?;
            let owner = signing_account(&gateway)?;
            let outcome = gateway.vault.redeem(shares, owner, owner).await?;
            print_outcome(config.chain_id, &outcome);
        }
        Commands::Strategies => {
            let (_session, gateway) = open(&config, false).await?;
            let strategies = gateway.strategies.list_strategies().await;
            if strategies.is_empty() {
                println!("No strategies found.");
            }
            for info in &strategies {
                print_strategy(info);
            }
        }
        Commands::Strategy { address } => {
            let (_session, gateway) = open(&config, false).await?;
            match gateway.strategies.get_strategy_info(address).await {
                Some(info) => print_strategy(&info),
                None => return Err(anyhow!("Strategy {address} could not be read.")),
            }
        }
        Commands::SwitchNetwork { chain_id } => {
            let (session, _gateway) = open(&config, true).await?;
            let session = session.ok_or_else(|| anyhow!("No wallet configured"))?;
            if !session.switch_network(chain_id).await {
                return Err(anyhow!(
                    "Wallet refused to switch to {}",
                    networks::display_name(chain_id)
                ));
            }
            let current = session.state().chain_id().unwrap_or(chain_id);
            println!("Wallet is now on {}", networks::display_name(current));
        }
        Commands::Watch => watch(&config).await?,
    }

    Ok(())
}

/// Connect the local wallet (if any) and build a gateway.
///
/// Without a wallet, reads fall back to a read-only backend unless `signing` is required.
async fn open(
    config: &DashboardConfig,
    signing: bool,
) -> Result<(Option<SessionManager>, ContractGateway)> {
    match LocalWalletProvider::from_config(config) {
        Some(wallet) => {
            let provider: Arc<dyn WalletProvider> = Arc::new(wallet);
            let session = SessionManager::new(Some(provider));
            match session.connect().await {
                ConnectOutcome::Connected(account) => {
                    tracing::info!("Connected as {}", vault_runtime::session::shorten_address(&account));
                }
                ConnectOutcome::Failed(e) => return Err(e.into()),
                ConnectOutcome::AlreadyConnecting | ConnectOutcome::Unavailable => {
                    return Err(anyhow!("Wallet connection did not complete"));
                }
            }
            let gateway = session
                .gateway(&config.addresses)
                .ok_or_else(|| anyhow!("Wallet connected without a signer"))?
                .with_gas_buffer(config.gas_buffer_percent);
            Ok((Some(session), gateway))
        }
        None if signing => Err(vault_runtime::NormalizedError::provider_unavailable().into()),
        None => Ok((None, read_only_gateway(config)?)),
    }
}

fn read_only_gateway(config: &DashboardConfig) -> Result<ContractGateway> {
    let rpc_url = config
        .active_rpc_url()
        .ok_or_else(|| anyhow!("No RPC endpoint for chain {}; set RPC_URL", config.chain_id))?;
    let backend: Arc<dyn ContractBackend> = Arc::new(AlloyBackend::read_only(&rpc_url)?);
    Ok(ContractGateway::new(backend, &config.addresses).with_gas_buffer(config.gas_buffer_percent))
}

fn signing_account(gateway: &ContractGateway) -> Result<Address> {
    gateway
        .account()
        .ok_or_else(|| vault_runtime::NormalizedError::provider_unavailable().into())
}

async fn print_status(config: &DashboardConfig, gateway: &ContractGateway, account: Address) {
    if !config.addresses.vault_configured() {
        println!("Vault address is not configured (set VAULT_ADDRESS).");
    }
    let (snapshot, in_strategies) = tokio::join!(
        gateway.vault.snapshot(account),
        gateway.strategies.get_total_assets_in_strategies(),
    );

    println!("Network:               {}", networks::display_name(config.chain_id));
    println!("Vault:                 {}", config.addresses.vault);
    println!("Total assets:          {}", snapshot.total_assets);
    println!("Assets in strategies:  {in_strategies}");
    println!("Share price (1e18):    {}", snapshot.share_price);
    if !account.is_zero() {
        println!(
            "Shares of {}: {}",
            vault_runtime::session::shorten_address(&account),
            snapshot.caller_share_balance
        );
    }
}

fn print_outcome(chain_id: u64, outcome: &vault_runtime::TransactionOutcome) {
    println!("Transaction confirmed");
    println!("  hash:     {}", outcome.tx_hash);
    if let Some(block) = outcome.block_number {
        println!("  block:    {block}");
    }
    println!("  gas used: {}", outcome.gas_used);
    if let Some(network) = networks::network(chain_id) {
        println!("  explorer: {}", network.tx_url(&outcome.tx_hash));
    }
}

fn print_strategy(info: &vault_runtime::StrategyInfo) {
    let status = if info.is_active { "active" } else { "inactive" };
    println!(
        "{} {:<24} apr={} allocation={} [{status}]",
        info.address, info.name, info.apr, info.allocation
    );
}

fn print_networks(current: u64) {
    for network in NETWORKS {
        let marker = if network.chain_id == current { "*" } else { " " };
        println!(
            "{marker} {:>9}  {:<18} {:<6} {}",
            network.chain_id, network.name, network.currency, network.explorer
        );
    }
}

async fn watch(config: &DashboardConfig) -> Result<()> {
    if !config.addresses.vault_configured() {
        return Err(vault_runtime::NormalizedError::not_configured("Vault").into());
    }
    let gateway = read_only_gateway(config)?;
    let explorer = networks::network(config.chain_id);

    let subscription = gateway.vault.on_deposit(move |event| {
        let link = match (explorer, event.tx_hash) {
            (Some(network), Some(hash)) => network.tx_url(&hash),
            _ => String::new(),
        };
        println!(
            "Deposit: {} assets -> {} shares for {} {link}",
            event.assets, event.shares, event.owner
        );
    });

    println!(
        "Watching deposits on {} every {}s (Ctrl-C to stop)",
        networks::display_name(config.chain_id),
        config.deposit_poll_interval.as_secs()
    );
    gateway
        .vault
        .deposit_watcher(config.deposit_poll_interval)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {e}");
            }
        })
        .await;

    subscription.unsubscribe();
    Ok(())
}
