//! Wallet provider boundary
//!
//! The session controller only talks to a wallet through [`WalletProvider`]:
//! account access, chain id, deployed bytecode, account-change notifications
//! and a signing contract binding. The private key, when there is one, stays
//! inside [`SecureWallet`].

pub mod rpc;
mod signer;

pub use rpc::RpcWalletProvider;
pub use signer::SecureWallet;

use crate::contract::DonationContract;
use crate::Error;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Wallet error code for "a request of this type is already pending"
pub const REQUEST_ALREADY_PENDING: i64 = -32002;

/// Wallet error code for a request the user declined
pub const USER_REJECTED_REQUEST: i64 = 4001;

/// JSON-RPC internal error, used when the transport gave no code
pub const INTERNAL_ERROR: i64 = -32603;

/// Error reported by a wallet provider, carrying the provider's numeric code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_request_pending(&self) -> bool {
        self.code == REQUEST_ALREADY_PENDING
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        if err.is_request_pending() {
            Error::PendingRequestConflict
        } else {
            Error::Provider {
                code: err.code,
                message: err.message,
            }
        }
    }
}

/// Sending half of the account-change notification channel
#[derive(Debug, Clone)]
pub struct AccountNotifier {
    tx: broadcast::Sender<Vec<Address>>,
}

impl AccountNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Publish the wallet's new account list
    pub fn notify(&self, accounts: Vec<Address>) {
        // No listeners is fine
        let _ = self.tx.send(accounts);
    }

    pub fn subscribe(&self) -> AccountSubscription {
        AccountSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AccountNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription to account-change notifications
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct AccountSubscription {
    rx: broadcast::Receiver<Vec<Address>>,
}

impl AccountSubscription {
    /// Wait for the next account list; `None` once the wallet goes away
    pub async fn next(&mut self) -> Option<Vec<Address>> {
        loop {
            match self.rx.recv().await {
                Ok(accounts) => return Some(accounts),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Account notifications lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// An injected wallet as seen by the portal
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet for account access (`eth_requestAccounts`)
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Active chain id (`eth_chainId`)
    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// Deployed bytecode at `address` (`eth_getCode`); empty when nothing is deployed
    async fn get_code(&self, address: Address) -> Result<Bytes, ProviderError>;

    /// Subscribe to account-change notifications
    fn subscribe_accounts(&self) -> AccountSubscription;

    /// Contract binding at `address` that signs with this wallet
    fn bind_contract(&self, address: Address) -> Arc<dyn DonationContract>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn pending_request_maps_to_distinct_error() {
        let err: Error = ProviderError::new(REQUEST_ALREADY_PENDING, "already pending").into();
        assert!(matches!(err, Error::PendingRequestConflict));
        assert!(err.to_string().contains("already pending"));

        let err: Error = ProviderError::new(USER_REJECTED_REQUEST, "User rejected").into();
        assert!(matches!(err, Error::Provider { code: 4001, .. }));
    }

    #[tokio::test]
    async fn subscription_receives_notifications() {
        let notifier = AccountNotifier::new();
        let mut subscription = notifier.subscribe();
        let account = address!("00000000000000000000000000000000000000a1");

        notifier.notify(vec![account]);
        notifier.notify(vec![]);

        assert_eq!(subscription.next().await, Some(vec![account]));
        assert_eq!(subscription.next().await, Some(vec![]));
    }

    #[tokio::test]
    async fn subscription_ends_when_notifier_dropped() {
        let notifier = AccountNotifier::new();
        let mut subscription = notifier.subscribe();
        drop(notifier);

        assert_eq!(subscription.next().await, None);
    }
}
