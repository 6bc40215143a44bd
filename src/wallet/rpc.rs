//! JSON-RPC wallet provider
//!
//! Backs [`WalletProvider`] with an alloy HTTP provider and a local
//! [`SecureWallet`]. The signer's address is the only account it grants.

use super::{
    AccountNotifier, AccountSubscription, ProviderError, SecureWallet, WalletProvider,
    INTERNAL_ERROR,
};
use crate::contract::{AlloyDonationContract, DonationContract};
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Wallet provider talking to a node over HTTP
pub struct RpcWalletProvider {
    provider: DynProvider,
    accounts: RwLock<Vec<Address>>,
    notifier: AccountNotifier,
    required_confirmations: u64,
}

impl RpcWalletProvider {
    /// Connect to `rpc_url`, signing with `wallet`
    pub fn connect(rpc_url: &str, wallet: &SecureWallet, required_confirmations: u64) -> Result<Self> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

        let provider = ProviderBuilder::new()
            .wallet(wallet.wallet().clone())
            .connect_http(url)
            .erased();

        Ok(Self {
            provider,
            accounts: RwLock::new(vec![wallet.address()]),
            notifier: AccountNotifier::new(),
            required_confirmations,
        })
    }

    /// Replace the granted account list and notify subscribers
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        {
            let mut current = self.accounts.write().unwrap_or_else(|e| e.into_inner());
            *current = accounts.clone();
        }
        tracing::debug!(count = accounts.len(), "Wallet accounts changed");
        self.notifier.notify(accounts);
    }

    /// Revoke all accounts, as a wallet does when the user disconnects the site
    pub fn disconnect(&self) {
        self.set_accounts(Vec::new());
    }

    fn current_accounts(&self) -> Vec<Address> {
        self.accounts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Convert a transport error, keeping the JSON-RPC error code when there is one
pub(crate) fn provider_error(err: &TransportError) -> ProviderError {
    match err.as_error_resp() {
        Some(payload) => ProviderError::new(payload.code, payload.message.to_string()),
        None => ProviderError::new(INTERNAL_ERROR, err.to_string()),
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    async fn request_accounts(&self) -> std::result::Result<Vec<Address>, ProviderError> {
        Ok(self.current_accounts())
    }

    async fn chain_id(&self) -> std::result::Result<u64, ProviderError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| provider_error(&e))
    }

    async fn get_code(&self, address: Address) -> std::result::Result<Bytes, ProviderError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| provider_error(&e))
    }

    fn subscribe_accounts(&self) -> AccountSubscription {
        self.notifier.subscribe()
    }

    fn bind_contract(&self, address: Address) -> Arc<dyn DonationContract> {
        Arc::new(AlloyDonationContract::new(
            address,
            self.provider.clone(),
            self.required_confirmations,
        ))
    }
}

impl std::fmt::Debug for RpcWalletProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcWalletProvider")
            .field("accounts", &self.current_accounts())
            .field("required_confirmations", &self.required_confirmations)
            .finish()
    }
}
