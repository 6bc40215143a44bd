//! Wallet-contract session
//!
//! [`SessionController`] owns the wallet session, the contract statistics and
//! transaction submission. Presentation layers read [`PortalState`] through
//! `state()` / `subscribe()` and never mutate it directly.

pub mod amount;
mod controller;
#[cfg(test)]
pub(crate) mod mock;
mod state;

pub use controller::{
    AccountWatch, ConnectOutcome, DonationOutcome, SessionController, WithdrawalOutcome,
};
pub use state::{
    derive_total_withdrawn, ConnectionStage, ContractSnapshot, DonorTier, PendingTransaction,
    PortalState, Role, Session, SessionPhase, TxKind,
};
