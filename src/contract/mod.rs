//! Donation contract boundary
//!
//! The contract is an external collaborator: the portal only uses the read
//! and write operations declared in [`IDonationPortal`] and the two events it
//! emits.

mod binding;
mod events;

pub use binding::AlloyDonationContract;
pub use events::{decode_receipt_events, DonationEvent};

use crate::Result;
use alloy::primitives::{Address, Log, TxHash, U256};
use alloy::sol;
use async_trait::async_trait;

sol! {
    #[sol(rpc)]
    interface IDonationPortal {
        event DonationReceived(address indexed donor, uint256 amount, uint256 timestamp);
        event TierUpgrade(address indexed donor, uint256 newTier);

        function minimumDonation() external view returns (uint256);
        function donate() external payable;
        function totalDonations() external view returns (uint256);
        function donorTotalContributions(address donor) external view returns (uint256);
        function getDonorTier(address donor) external view returns (string);
        function getDonorCount() external view returns (uint256);
        function getContractBalance() external view returns (uint256);
        function owner() external view returns (address);
        function withdrawFunds(uint256 amount) external;
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    /// Receipt status flag; `false` means the transaction reverted
    pub success: bool,
    pub logs: Vec<Log>,
}

/// Read and write surface of the donation contract
#[async_trait]
pub trait DonationContract: Send + Sync {
    /// Address the binding points at
    fn address(&self) -> Address;

    async fn minimum_donation(&self) -> Result<U256>;

    async fn total_donations(&self) -> Result<U256>;

    async fn donor_total_contributions(&self, donor: Address) -> Result<U256>;

    /// Tier label as reported by the contract ("NONE", "BRONZE", ...)
    async fn donor_tier(&self, donor: Address) -> Result<String>;

    async fn donor_count(&self) -> Result<U256>;

    async fn contract_balance(&self) -> Result<U256>;

    async fn owner(&self) -> Result<Address>;

    /// Submit `donate()` carrying `value` wei; returns as soon as the transaction is sent
    async fn donate(&self, value: U256, gas_limit: u64) -> Result<TxHash>;

    /// Submit `withdrawFunds(amount)`; returns as soon as the transaction is sent
    async fn withdraw_funds(&self, amount: U256) -> Result<TxHash>;

    /// Wait until `hash` is mined
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt>;
}
