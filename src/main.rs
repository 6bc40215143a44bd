//! Donation Portal CLI
//!
//! Command-line interface for connecting a wallet to the donation contract.

use clap::{Parser, Subcommand};
use donation_portal::config::PRIVATE_KEY_ENV;
use donation_portal::portal::amount::parse_eth;
use donation_portal::portal::{ConnectOutcome, SessionPhase};
use donation_portal::wallet::{RpcWalletProvider, SecureWallet, WalletProvider};
use donation_portal::{Config, Error, PortalState, Result, RpcConfig, SessionController};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "donation-portal")]
#[command(about = "Donate to and manage an on-chain donation contract")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and show the session and contract statistics
    Status,

    /// Donate to the contract
    Donate {
        /// Amount in ETH (defaults to the configured donation, raised to the minimum)
        #[arg(short, long)]
        amount: Option<String>,
    },

    /// Withdraw funds to the owner
    Withdraw {
        /// Amount in ETH
        #[arg(short, long)]
        amount: String,
    },

    /// Stay connected and print state changes until Ctrl-C
    Watch,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    let (text, json) = if cli.json {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    if let Commands::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let provider = load_provider(&config)?;
    let wallet = provider
        .clone()
        .map(|p| -> Arc<dyn WalletProvider> { p });
    let controller = Arc::new(SessionController::new(config, wallet));

    match cli.command {
        Commands::Status => {
            connect(&controller).await?;
            print_state(&controller.state());
        }
        Commands::Donate { amount } => {
            connect(&controller).await?;
            run_donate(&controller, amount).await?;
        }
        Commands::Withdraw { amount } => {
            connect(&controller).await?;
            run_withdraw(&controller, &amount).await?;
        }
        Commands::Watch => {
            run_watch(&controller, provider).await?;
        }
        Commands::Config => {}
    }

    controller.shutdown();
    Ok(())
}

/// Build the wallet provider from `PRIVATE_KEY`; `None` when no key is set
fn load_provider(config: &Config) -> Result<Option<Arc<RpcWalletProvider>>> {
    let Some(signer) = SecureWallet::from_env(PRIVATE_KEY_ENV)? else {
        tracing::warn!("No PRIVATE_KEY set - no wallet available");
        return Ok(None);
    };

    let chain_id = config.network.chain_id();
    let rpc_config = RpcConfig::from_env();
    let rpc_url = rpc_config.get(chain_id).ok_or_else(|| {
        Error::Config(format!(
            "No RPC URL for {} (chain {})",
            config.network.name(),
            chain_id
        ))
    })?;

    tracing::info!(
        address = %signer.address(),
        network = config.network.name(),
        "Loaded wallet from PRIVATE_KEY"
    );
    let provider =
        RpcWalletProvider::connect(rpc_url, &signer, config.required_confirmations)?;
    Ok(Some(Arc::new(provider)))
}

async fn connect(controller: &SessionController) -> Result<()> {
    match controller.connect().await? {
        ConnectOutcome::Connected(session) => {
            if let Some(address) = session.address {
                let role = if session.is_owner { "owner" } else { "donor" };
                println!("Connected as {} ({})", address, role);
            }
        }
        ConnectOutcome::AlreadyInProgress => {
            println!("Wallet connection already in progress. Please wait.");
        }
    }
    Ok(())
}

async fn run_donate(controller: &SessionController, amount: Option<String>) -> Result<()> {
    let amount = match amount {
        Some(amount) => parse_eth(&amount)?,
        None => controller
            .state()
            .donation_amount
            .ok_or_else(|| Error::InvalidAmount("no donation amount selected".to_string()))?,
    };

    let outcome = controller.donate(amount).await?;
    for line in &outcome.status {
        println!("{}", line);
    }
    println!("Transaction: {}", outcome.hash);
    Ok(())
}

async fn run_withdraw(controller: &SessionController, amount: &str) -> Result<()> {
    let amount = parse_eth(amount)?;
    let outcome = controller.withdraw(amount).await?;

    println!("{}", controller.state().status_text());
    println!("Transaction: {}", outcome.hash);
    if let Some(snapshot) = controller.state().snapshot {
        println!("{}", snapshot.summary());
    }
    Ok(())
}

async fn run_watch(
    controller: &Arc<SessionController>,
    provider: Option<Arc<RpcWalletProvider>>,
) -> Result<()> {
    controller.watch_accounts();
    connect(controller).await?;
    print_state(&controller.state());

    let mut rx = controller.subscribe();
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                print_state(&state);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; disconnecting");
                break;
            }
        }
    }

    if let Some(provider) = provider {
        provider.disconnect();
        let disconnected = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.phase == SessionPhase::Disconnected),
        )
        .await;
        if disconnected.is_err() {
            tracing::warn!("Session did not report disconnection in time");
        }
    }
    Ok(())
}

fn print_state(state: &PortalState) {
    println!("Session: {:?} (stage {})", state.phase, state.stage);
    if let Some(address) = state.session.address {
        println!("Account: {}", address);
    }
    if let Some(snapshot) = &state.snapshot {
        println!("{}", snapshot.summary());
        println!("Tier style: {}", snapshot.donor_tier.tier_style());
    }
    if let Some(pending) = &state.pending {
        println!("Pending: {} ({:?})", pending.hash, pending.kind);
    }
    if let Some(error) = &state.error {
        println!("Error: {}", error);
    }
}
