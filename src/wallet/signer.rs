//! Local signing wallet
//!
//! SECURITY: This is the ONLY place where the private key exists.
//! - The key arrives as a `SecretString` and is parsed straight into alloy's PrivateKeySigner
//! - Keys are never serialized or logged
//! - Callers only ever see the public address and an `EthereumWallet` for signing

use crate::{Error, Result};
use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use secrecy::{ExposeSecret, SecretString};

/// Wallet holding the portal user's signing key
#[derive(Clone)]
pub struct SecureWallet {
    /// Public address (safe to expose)
    address: Address,
    /// Ethereum wallet for alloy providers
    wallet: EthereumWallet,
}

impl SecureWallet {
    /// Load the key from an environment variable
    ///
    /// Returns `Ok(None)` when the variable is unset, which the portal treats
    /// as "no wallet in this environment".
    pub fn from_env(var_name: &str) -> Result<Option<Self>> {
        match std::env::var(var_name) {
            Ok(raw) => Self::from_secret(&SecretString::from(raw)).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Create a wallet from a hex-encoded private key
    pub fn from_secret(key: &SecretString) -> Result<Self> {
        let key_hex = key.expose_secret().trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| Error::Config(format!("Invalid private key: {}", e)))?;

        let address = signer.address();
        Ok(Self {
            address,
            wallet: EthereumWallet::from(signer),
        })
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signing wallet for alloy providers
    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
