//! Donation Portal
//!
//! Client-side controller for an on-chain donation contract:
//! - Connects a wallet session and verifies the contract is deployed
//! - Reads donation statistics, donor tiers and owner-only balances
//! - Submits donations and owner withdrawals, reporting progress and events
//!
//! # Security Model
//!
//! - Private keys never leave the wallet module and are redacted in logs
//! - Minimum donation and withdrawal balance are re-checked against the
//!   contract immediately before submission
//! - Withdrawal requires the connected account to be the contract owner

pub mod config;
pub mod contract;
pub mod portal;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{Config, DisconnectPolicy, Network, RpcConfig};
pub use error::{Error, Result};
pub use portal::{PortalState, SessionController};
