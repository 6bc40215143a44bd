//! Session state exposed by the controller

use super::amount::format_eth;
use crate::Error;
use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Donor tier as reported by the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DonorTier {
    #[default]
    None,
    Bronze,
    Silver,
    Gold,
}

impl DonorTier {
    /// Tier for the ordinal carried by `TierUpgrade`
    pub fn from_ordinal(ordinal: u64) -> Option<Self> {
        match ordinal {
            0 => Some(DonorTier::None),
            1 => Some(DonorTier::Bronze),
            2 => Some(DonorTier::Silver),
            3 => Some(DonorTier::Gold),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DonorTier::None => "NONE",
            DonorTier::Bronze => "BRONZE",
            DonorTier::Silver => "SILVER",
            DonorTier::Gold => "GOLD",
        }
    }

    /// Presentation classes for the tier badge
    pub fn tier_style(&self) -> &'static str {
        match self {
            DonorTier::Gold => "bg-yellow-50 border-yellow-200 text-yellow-600",
            DonorTier::Silver => "bg-gray-50 border-gray-200 text-gray-600",
            DonorTier::Bronze => "bg-orange-50 border-orange-200 text-orange-600",
            DonorTier::None => "bg-blue-50 border-blue-200 text-blue-600",
        }
    }
}

impl fmt::Display for DonorTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DonorTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NONE" | "" => Ok(DonorTier::None),
            "BRONZE" => Ok(DonorTier::Bronze),
            "SILVER" => Ok(DonorTier::Silver),
            "GOLD" => Ok(DonorTier::Gold),
            other => Err(Error::Contract(format!("Unknown donor tier: {}", other))),
        }
    }
}

/// Wallet session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub connected: bool,
    pub address: Option<Address>,
    pub is_owner: bool,
}

impl Session {
    pub fn role(&self) -> Option<Role> {
        if !self.connected {
            return None;
        }
        Some(if self.is_owner {
            Role::Owner
        } else {
            Role::Donor
        })
    }
}

/// Capability set of a connected session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Donor,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected(Role),
}

/// Progress of the connection handshake, for user feedback only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStage {
    #[default]
    Idle,
    Checking,
    Requesting,
    GettingChain,
    CreatingProvider,
    CheckingContract,
    Success,
}

impl fmt::Display for ConnectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStage::Idle => "idle",
            ConnectionStage::Checking => "checking",
            ConnectionStage::Requesting => "requesting",
            ConnectionStage::GettingChain => "getting_chain",
            ConnectionStage::CreatingProvider => "creating_provider",
            ConnectionStage::CheckingContract => "checking_contract",
            ConnectionStage::Success => "success",
        };
        f.write_str(name)
    }
}

/// Contract statistics as last read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSnapshot {
    pub total_donations: U256,
    pub donor_count: u64,
    pub minimum_donation: U256,
    pub user_donations: U256,
    pub donor_tier: DonorTier,
    /// Owner sessions only
    pub contract_balance: Option<U256>,
    /// Owner sessions only; `total_donations - contract_balance`
    pub total_withdrawn: Option<U256>,
}

impl ContractSnapshot {
    /// Multi-line human-readable summary, amounts at display precision
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Total donations: {} ETH", format_eth(self.total_donations)),
            format!("Total donors: {}", self.donor_count),
            format!("Minimum donation: {} ETH", format_eth(self.minimum_donation)),
            format!("Your total donations: {} ETH", format_eth(self.user_donations)),
            format!("Your donor tier: {}", self.donor_tier),
        ];
        if let Some(balance) = self.contract_balance {
            lines.push(format!("Contract balance: {} ETH", format_eth(balance)));
        }
        if let Some(withdrawn) = self.total_withdrawn {
            lines.push(format!("Total withdrawn: {} ETH", format_eth(withdrawn)));
        }
        lines.join("\n")
    }
}

/// Withdrawn total derived from the two reads
///
/// The reads are not taken at the same block, so the balance can briefly
/// exceed the donation total; the result is clamped at zero.
pub fn derive_total_withdrawn(total_donations: U256, contract_balance: U256) -> U256 {
    if contract_balance > total_donations {
        tracing::warn!(
            total_donations = %total_donations,
            contract_balance = %contract_balance,
            "Contract balance exceeds total donations; clamping withdrawn total to zero"
        );
    }
    total_donations.saturating_sub(contract_balance)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Donate,
    Withdraw,
}

/// A submitted transaction awaiting confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub kind: TxKind,
    pub submitted_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn new(hash: TxHash, kind: TxKind) -> Self {
        Self {
            hash,
            kind,
            submitted_at: Utc::now(),
        }
    }
}

/// Everything a presentation layer renders
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortalState {
    pub phase: SessionPhase,
    pub session: Session,
    pub stage: ConnectionStage,
    pub snapshot: Option<ContractSnapshot>,
    /// Amount currently selected for donation (wei)
    pub donation_amount: Option<U256>,
    pub pending: Option<PendingTransaction>,
    /// Status log of the current operation, oldest first
    pub status: Vec<String>,
    /// Message of the last failed operation
    pub error: Option<String>,
    pub loading: bool,
}

impl PortalState {
    pub fn status_text(&self) -> String {
        self.status.join("\n")
    }

    /// Whether the selected amount may be submitted
    pub fn can_donate(&self) -> bool {
        let (Some(amount), Some(snapshot)) = (self.donation_amount, self.snapshot.as_ref()) else {
            return false;
        };
        self.session.connected && !self.loading && amount >= snapshot.minimum_donation
    }

    /// Withdrawal controls are only offered to the owner
    pub fn can_withdraw(&self) -> bool {
        self.session.role() == Some(Role::Owner) && !self.loading
    }
}
