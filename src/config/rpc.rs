//! RPC endpoint configuration
//!
//! Endpoints are resolved from the environment in this order:
//! 1. `RPC_URL` - applies to every chain, highest priority
//! 2. Per-chain env vars (ETH_RPC_URL, SEPOLIA_RPC_URL, BASE_RPC_URL, BASE_SEPOLIA_RPC_URL)
//! 3. Provider API keys (ALCHEMY_API_KEY, INFURA_API_KEY) - builds URLs automatically
//! 4. Public RPC fallbacks and a localhost node for development chains
//!
//! # Examples
//!
//! ```bash
//! # Point everything at a local anvil node
//! export RPC_URL="http://127.0.0.1:8545"
//!
//! # Or a single provider API key
//! export ALCHEMY_API_KEY="YOUR_KEY"
//! ```

use std::collections::HashMap;

/// RPC configuration for the chains the portal can talk to
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// RPC URLs indexed by chain ID
    urls: HashMap<u64, String>,
}

/// Chain ID constants
pub mod chains {
    pub const ETHEREUM: u64 = 1;
    pub const SEPOLIA: u64 = 11155111;
    pub const BASE: u64 = 8453;
    pub const BASE_SEPOLIA: u64 = 84532;
    pub const LOCAL: u64 = 31337;
}

/// Environment variable names
mod env_vars {
    pub const RPC_URL: &str = "RPC_URL";

    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";
    pub const SEPOLIA_RPC_URL: &str = "SEPOLIA_RPC_URL";
    pub const BASE_RPC_URL: &str = "BASE_RPC_URL";
    pub const BASE_SEPOLIA_RPC_URL: &str = "BASE_SEPOLIA_RPC_URL";

    pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
    pub const INFURA_API_KEY: &str = "INFURA_API_KEY";
}

/// Public RPC endpoints (rate limited, for testing only)
mod public_rpcs {
    pub const ETHEREUM: &str = "https://eth.llamarpc.com";
    pub const SEPOLIA: &str = "https://rpc.sepolia.org";
    pub const BASE: &str = "https://mainnet.base.org";
    pub const BASE_SEPOLIA: &str = "https://sepolia.base.org";
    pub const LOCAL: &str = "http://127.0.0.1:8545";
}

const ALL_CHAINS: [u64; 5] = [
    chains::ETHEREUM,
    chains::SEPOLIA,
    chains::BASE,
    chains::BASE_SEPOLIA,
    chains::LOCAL,
];

impl RpcConfig {
    /// Create RPC config from environment variables
    pub fn from_env() -> Self {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Resolve endpoints using `lookup` for variable access
    fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut urls = HashMap::new();

        if let Some(url) = lookup(env_vars::RPC_URL) {
            tracing::debug!("Using RPC_URL for all chains");
            for chain in ALL_CHAINS {
                urls.insert(chain, url.clone());
            }
            return Self { urls };
        }

        let per_chain = [
            (env_vars::ETH_RPC_URL, chains::ETHEREUM),
            (env_vars::SEPOLIA_RPC_URL, chains::SEPOLIA),
            (env_vars::BASE_RPC_URL, chains::BASE),
            (env_vars::BASE_SEPOLIA_RPC_URL, chains::BASE_SEPOLIA),
        ];
        for (var, chain) in per_chain {
            if let Some(url) = lookup(var) {
                tracing::debug!(chain_id = chain, "Using {} for chain", var);
                urls.insert(chain, url);
            }
        }

        if urls.is_empty() {
            if let Some(key) = lookup(env_vars::ALCHEMY_API_KEY) {
                tracing::info!("Building RPC URLs from ALCHEMY_API_KEY");
                urls.insert(
                    chains::ETHEREUM,
                    format!("https://eth-mainnet.g.alchemy.com/v2/{}", key),
                );
                urls.insert(
                    chains::SEPOLIA,
                    format!("https://eth-sepolia.g.alchemy.com/v2/{}", key),
                );
                urls.insert(
                    chains::BASE,
                    format!("https://base-mainnet.g.alchemy.com/v2/{}", key),
                );
                urls.insert(
                    chains::BASE_SEPOLIA,
                    format!("https://base-sepolia.g.alchemy.com/v2/{}", key),
                );
            }
        }

        if urls.is_empty() {
            if let Some(key) = lookup(env_vars::INFURA_API_KEY) {
                tracing::info!("Building RPC URLs from INFURA_API_KEY");
                urls.insert(
                    chains::ETHEREUM,
                    format!("https://mainnet.infura.io/v3/{}", key),
                );
                urls.insert(
                    chains::SEPOLIA,
                    format!("https://sepolia.infura.io/v3/{}", key),
                );
                // Infura doesn't serve Base
            }
        }

        if !urls.contains_key(&chains::SEPOLIA) {
            tracing::warn!("No RPC configured for Sepolia, using public RPC (rate limited)");
        }
        urls.entry(chains::ETHEREUM)
            .or_insert_with(|| public_rpcs::ETHEREUM.to_string());
        urls.entry(chains::SEPOLIA)
            .or_insert_with(|| public_rpcs::SEPOLIA.to_string());
        urls.entry(chains::BASE)
            .or_insert_with(|| public_rpcs::BASE.to_string());
        urls.entry(chains::BASE_SEPOLIA)
            .or_insert_with(|| public_rpcs::BASE_SEPOLIA.to_string());
        urls.entry(chains::LOCAL)
            .or_insert_with(|| public_rpcs::LOCAL.to_string());

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self { urls }
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|s| s.as_str())
    }

    /// Check if a chain is configured
    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.urls.contains_key(&chain_id)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_public_rpc_fallbacks() {
        let config = RpcConfig::resolve(env(&[]));

        for chain in ALL_CHAINS {
            assert!(config.has_chain(chain));
        }
        assert_eq!(config.get(chains::SEPOLIA), Some(public_rpcs::SEPOLIA));
        assert_eq!(config.get(chains::LOCAL), Some(public_rpcs::LOCAL));
    }

    #[test]
    fn test_rpc_url_overrides_everything() {
        let config = RpcConfig::resolve(env(&[
            ("RPC_URL", "http://node:8545"),
            ("ETH_RPC_URL", "https://ignored"),
        ]));

        assert_eq!(config.get(chains::ETHEREUM), Some("http://node:8545"));
        assert_eq!(config.get(chains::LOCAL), Some("http://node:8545"));
    }

    #[test]
    fn test_per_chain_beats_api_key() {
        let config = RpcConfig::resolve(env(&[
            ("SEPOLIA_RPC_URL", "https://my-sepolia"),
            ("ALCHEMY_API_KEY", "abc"),
        ]));

        assert_eq!(config.get(chains::SEPOLIA), Some("https://my-sepolia"));
        // API keys are only consulted when no per-chain URL is set
        assert_eq!(config.get(chains::ETHEREUM), Some(public_rpcs::ETHEREUM));
    }

    #[test]
    fn test_alchemy_key_builds_urls() {
        let config = RpcConfig::resolve(env(&[("ALCHEMY_API_KEY", "abc")]));

        assert_eq!(
            config.get(chains::SEPOLIA),
            Some("https://eth-sepolia.g.alchemy.com/v2/abc")
        );
    }

    #[test]
    fn test_get_returns_url() {
        let mut urls = HashMap::new();
        urls.insert(1, "https://custom.rpc".to_string());
        let config = RpcConfig::with_urls(urls);

        assert_eq!(config.get(1), Some("https://custom.rpc"));
        assert_eq!(config.get(999), None);
    }
}
