//! alloy binding for the donation contract

use super::{DonationContract, IDonationPortal, TxReceipt};
use crate::wallet::rpc::provider_error;
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider};
use async_trait::async_trait;

/// Donation contract reached through an alloy provider
pub struct AlloyDonationContract {
    instance: IDonationPortal::IDonationPortalInstance<DynProvider>,
    required_confirmations: u64,
}

impl AlloyDonationContract {
    pub fn new(address: Address, provider: DynProvider, required_confirmations: u64) -> Self {
        Self {
            instance: IDonationPortal::new(address, provider),
            required_confirmations: required_confirmations.max(1),
        }
    }
}

/// Map a failed view call
fn read_error(operation: &str, err: alloy::contract::Error) -> Error {
    if let alloy::contract::Error::TransportError(ref transport) = err {
        if transport.as_error_resp().is_some() {
            return provider_error(transport).into();
        }
    }
    Error::Contract(format!("{}: {}", operation, parse_revert_reason(&err.to_string())))
}

/// Map a failed submission, surfacing the contract's revert reason
fn send_error(err: alloy::contract::Error) -> Error {
    let text = err.to_string();
    if text.contains("execution reverted") {
        return Error::TransactionReverted(parse_revert_reason(&text));
    }
    match err {
        alloy::contract::Error::TransportError(ref transport) => provider_error(transport).into(),
        _ => Error::Contract(text),
    }
}

/// Extract a human-readable revert reason from RPC error text
pub(crate) fn parse_revert_reason(error: &str) -> String {
    if error.contains("execution reverted") {
        if let Some(start) = error.find("revert: ") {
            let reason = &error[start + 8..];
            if let Some(end) = reason.find('"') {
                return reason[..end].to_string();
            }
            return reason.to_string();
        }
        if let Some(start) = error.find("execution reverted: ") {
            let reason = error[start + 20..].trim();
            if !reason.is_empty() && !reason.starts_with("0x") {
                return reason.to_string();
            }
        }
        if let Some(start) = error.find("0x") {
            let hex_data = &error[start..];
            let end = hex_data
                .find(|c: char| !c.is_ascii_hexdigit() && c != 'x')
                .unwrap_or(hex_data.len());
            let hex_str = &hex_data[..end];
            // Error(string) selector 0x08c379a0, then offset and length words
            if hex_str.starts_with("0x08c379a0") && hex_str.len() > 138 {
                if let Ok(decoded) = hex::decode(&hex_str[138..]) {
                    let filtered: Vec<u8> = decoded.into_iter().filter(|&b| b != 0).collect();
                    if let Ok(s) = String::from_utf8(filtered) {
                        return s;
                    }
                }
            }
            return format!("Reverted with data: {}", hex_str);
        }
        return "execution reverted".to_string();
    }

    error.to_string()
}

#[async_trait]
impl DonationContract for AlloyDonationContract {
    fn address(&self) -> Address {
        *self.instance.address()
    }

    async fn minimum_donation(&self) -> Result<U256> {
        self.instance
            .minimumDonation()
            .call()
            .await
            .map_err(|e| read_error("minimumDonation", e))
    }

    async fn total_donations(&self) -> Result<U256> {
        self.instance
            .totalDonations()
            .call()
            .await
            .map_err(|e| read_error("totalDonations", e))
    }

    async fn donor_total_contributions(&self, donor: Address) -> Result<U256> {
        self.instance
            .donorTotalContributions(donor)
            .call()
            .await
            .map_err(|e| read_error("donorTotalContributions", e))
    }

    async fn donor_tier(&self, donor: Address) -> Result<String> {
        self.instance
            .getDonorTier(donor)
            .call()
            .await
            .map_err(|e| read_error("getDonorTier", e))
    }

    async fn donor_count(&self) -> Result<U256> {
        self.instance
            .getDonorCount()
            .call()
            .await
            .map_err(|e| read_error("getDonorCount", e))
    }

    async fn contract_balance(&self) -> Result<U256> {
        self.instance
            .getContractBalance()
            .call()
            .await
            .map_err(|e| read_error("getContractBalance", e))
    }

    async fn owner(&self) -> Result<Address> {
        self.instance
            .owner()
            .call()
            .await
            .map_err(|e| read_error("owner", e))
    }

    async fn donate(&self, value: U256, gas_limit: u64) -> Result<TxHash> {
        let pending = self
            .instance
            .donate()
            .value(value)
            .gas(gas_limit)
            .send()
            .await
            .map_err(send_error)?;
        Ok(*pending.tx_hash())
    }

    async fn withdraw_funds(&self, amount: U256) -> Result<TxHash> {
        let pending = self
            .instance
            .withdrawFunds(amount)
            .send()
            .await
            .map_err(send_error)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        let receipt =
            PendingTransactionBuilder::new(self.instance.provider().root().clone(), hash)
                .with_required_confirmations(self.required_confirmations)
                .get_receipt()
                .await
                .map_err(|e| Error::Contract(format!("Waiting for {}: {}", hash, e)))?;

        Ok(TxReceipt {
            transaction_hash: receipt.transaction_hash,
            success: receipt.status(),
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        })
    }
}
