//! Error types for the donation portal
//!
//! The `Display` text of every variant is the message shown to the user.

use alloy::primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Wallet provider not detected. Please install or configure a wallet to use this portal.")]
    ProviderUnavailable,

    #[error("No accounts returned from the wallet.")]
    NoAccountsGranted,

    #[error("Contract address not configured. Please check your environment variables.")]
    ConfigMissing,

    #[error("Contract not found at {address} on chain {chain_id}. Please verify deployment and network.")]
    ContractMissing { address: Address, chain_id: u64 },

    #[error(
        "A wallet connection request is already pending. Please check your wallet or refresh to reset."
    )]
    PendingRequestConflict,

    #[error("Donation must be at least {minimum} ETH (requested {amount} ETH)")]
    BelowMinimumDonation { amount: String, minimum: String },

    #[error("Insufficient contract balance: requested {requested} ETH, available {balance} ETH")]
    InsufficientContractBalance { requested: String, balance: String },

    #[error("Transaction failed: {0}")]
    TransactionReverted(String),

    #[error("Could not decode event: {0}")]
    EventDecode(String),

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Only the contract owner can withdraw funds")]
    NotOwner,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{operation} timed out after {after_ms} ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    #[error("Wallet provider error ({code}): {message}")]
    Provider { code: i64, message: String },

    #[error("Contract call failed: {0}")]
    Contract(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
