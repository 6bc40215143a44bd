//! Configuration for the donation portal

pub mod rpc;

use crate::{Error, Result};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Donation contract address environment variable name
pub const CONTRACT_ADDRESS_ENV: &str = "CONTRACT_ADDRESS";

/// Name the address was published under by the web build; still honoured
pub const VITE_CONTRACT_ADDRESS_ENV: &str = "VITE_CONTRACT_ADDRESS";

/// Signing key environment variable name
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Network the portal connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Ethereum,
    #[default]
    Sepolia,
    Base,
    BaseSepolia,
    Local,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => rpc::chains::ETHEREUM,
            Network::Sepolia => rpc::chains::SEPOLIA,
            Network::Base => rpc::chains::BASE,
            Network::BaseSepolia => rpc::chains::BASE_SEPOLIA,
            Network::Local => rpc::chains::LOCAL,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Sepolia => "sepolia",
            Network::Base => "base",
            Network::BaseSepolia => "base_sepolia",
            Network::Local => "local",
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ethereum" | "mainnet" => Ok(Network::Ethereum),
            "sepolia" => Ok(Network::Sepolia),
            "base" => Ok(Network::Base),
            "base_sepolia" | "base-sepolia" => Ok(Network::BaseSepolia),
            "local" | "anvil" | "localhost" => Ok(Network::Local),
            other => Err(Error::Config(format!("Unknown network: {}", other))),
        }
    }
}

/// What happens to the last fetched contract statistics when the wallet disconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Keep showing the last-known statistics
    #[default]
    KeepSnapshot,
    /// Drop the statistics together with the session
    ClearSnapshot,
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployed donation contract
    pub contract_address: Option<Address>,
    /// Network to connect to
    pub network: Network,
    /// Gas limit attached to donate() calls
    pub donation_gas_limit: u64,
    /// Upper bound for any single provider or contract request (milliseconds)
    pub request_timeout_ms: u64,
    /// Upper bound for waiting on a transaction receipt (milliseconds)
    pub confirmation_timeout_ms: u64,
    /// Confirmations required before a receipt is processed
    pub required_confirmations: u64,
    /// Snapshot retention when the wallet reports zero accounts
    pub disconnect_policy: DisconnectPolicy,
    /// Donation amount (ETH) selected before the minimum is known
    pub default_donation: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract_address: None,
            network: Network::default(),
            donation_gas_limit: 200_000,
            request_timeout_ms: 30_000,       // 30 seconds
            confirmation_timeout_ms: 300_000, // 5 minutes
            required_confirmations: 1,
            disconnect_policy: DisconnectPolicy::default(),
            default_donation: "0.01".to_string(),
        }
    }
}

impl Config {
    /// Build configuration from environment variables
    ///
    /// A missing contract address is not an error here; it is reported when
    /// a connection is attempted.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a JSON file, then fill gaps from the environment
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if self.contract_address.is_some() {
            return Ok(());
        }

        let raw = lookup(CONTRACT_ADDRESS_ENV).or_else(|| lookup(VITE_CONTRACT_ADDRESS_ENV));
        if let Some(raw) = raw {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let address = Address::from_str(trimmed).map_err(|e| {
                    Error::Config(format!("Invalid contract address {}: {}", trimmed, e))
                })?;
                self.contract_address = Some(address);
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}
