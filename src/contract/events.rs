//! Decoding of donation receipts
//!
//! Logs that fail to decode are skipped one by one; a bad log never aborts
//! processing of the rest of the receipt.

use super::IDonationPortal::{DonationReceived, TierUpgrade};
use crate::portal::amount::format_eth;
use crate::portal::DonorTier;
use crate::{Error, Result};
use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;

/// Event emitted by the donation contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DonationEvent {
    DonationReceived {
        donor: Address,
        amount: U256,
        timestamp: U256,
    },
    TierUpgrade {
        donor: Address,
        tier: DonorTier,
    },
}

impl DonationEvent {
    /// Status line shown to the donor
    pub fn status_line(&self) -> String {
        match self {
            DonationEvent::DonationReceived { amount, .. } => {
                format!("Donation of {} ETH received", format_eth(*amount))
            }
            DonationEvent::TierUpgrade { tier, .. } => {
                format!("Congratulations! You've reached {} tier!", tier)
            }
        }
    }
}

/// Decode the donation events in `logs` that were emitted by `contract`
pub fn decode_receipt_events(logs: &[Log], contract: Address) -> Vec<DonationEvent> {
    logs.iter()
        .filter(|log| log.address == contract)
        .filter_map(|log| match decode_log(log) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable log");
                None
            }
        })
        .collect()
}

/// `Ok(None)` for logs that are not donation events
fn decode_log(log: &Log) -> Result<Option<DonationEvent>> {
    let Some(topic) = log.data.topics().first() else {
        return Ok(None);
    };

    if *topic == DonationReceived::SIGNATURE_HASH {
        let event = DonationReceived::decode_log_data(&log.data)
            .map_err(|e| Error::EventDecode(format!("DonationReceived: {}", e)))?;
        return Ok(Some(DonationEvent::DonationReceived {
            donor: event.donor,
            amount: event.amount,
            timestamp: event.timestamp,
        }));
    }

    if *topic == TierUpgrade::SIGNATURE_HASH {
        let event = TierUpgrade::decode_log_data(&log.data)
            .map_err(|e| Error::EventDecode(format!("TierUpgrade: {}", e)))?;
        let tier = u64::try_from(event.newTier)
            .ok()
            .and_then(DonorTier::from_ordinal)
            .ok_or_else(|| {
                Error::EventDecode(format!("TierUpgrade: tier ordinal {} out of range", event.newTier))
            })?;
        return Ok(Some(DonationEvent::TierUpgrade {
            donor: event.donor,
            tier,
        }));
    }

    Ok(None)
}
