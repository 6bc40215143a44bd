//! Scripted wallet and contract for controller tests

use crate::contract::{DonationContract, IDonationPortal, TxReceipt};
use crate::wallet::{AccountNotifier, AccountSubscription, ProviderError, WalletProvider};
use crate::{Error, Result};
use alloy::primitives::{address, Address, Bytes, Log, TxHash, B256, U256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
pub const OWNER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
pub const DONOR: Address = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");

/// Wei for `milli` thousandths of an ether
pub fn milli_eth(milli: u64) -> U256 {
    U256::from(milli) * U256::from(1_000_000_000_000_000u64)
}

/// Contract-side values, mutated by submissions the way the real contract would
#[derive(Debug, Clone)]
pub struct ContractValues {
    pub minimum: U256,
    pub total: U256,
    pub contributions: HashMap<Address, U256>,
    pub tiers: HashMap<Address, String>,
    pub donors: U256,
    pub balance: U256,
    pub owner: Address,
    /// Receipt status for the next confirmations
    pub receipt_success: bool,
    /// Extra logs attached to every receipt
    pub receipt_logs: Vec<Log>,
    /// Methods that fail when called
    pub failing: HashSet<&'static str>,
}

impl Default for ContractValues {
    fn default() -> Self {
        Self {
            minimum: milli_eth(10),
            total: milli_eth(1000),
            contributions: HashMap::new(),
            tiers: HashMap::new(),
            donors: U256::from(3),
            balance: milli_eth(400),
            owner: OWNER,
            receipt_success: true,
            receipt_logs: Vec::new(),
            failing: HashSet::new(),
        }
    }
}

#[derive(Default)]
pub struct MockContract {
    pub values: Mutex<ContractValues>,
    /// Submitted (kind, value) pairs
    pub submissions: Mutex<Vec<(&'static str, U256)>>,
    pub owner_calls: AtomicUsize,
    /// Methods in the order they were entered
    calls: Mutex<Vec<&'static str>>,
    /// Gates armed by `hold`, taken by the next call of the method
    armed: Mutex<HashMap<&'static str, Arc<Notify>>>,
    /// Gates a caller is (or will be) parked on, opened by `release`
    parked: Mutex<HashMap<&'static str, Arc<Notify>>>,
    next_hash: AtomicUsize,
}

impl MockContract {
    pub fn update(&self, f: impl FnOnce(&mut ContractValues)) {
        let mut values = self.values.lock().unwrap();
        f(&mut values);
    }

    pub fn fail(&self, method: &'static str) {
        self.update(|v| {
            v.failing.insert(method);
        });
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    /// Park the next call of `method` until [`MockContract::release`]
    pub fn hold(&self, method: &'static str) {
        let gate = Arc::new(Notify::new());
        self.armed.lock().unwrap().insert(method, gate.clone());
        self.parked.lock().unwrap().insert(method, gate);
    }

    pub fn release(&self, method: &'static str) {
        if let Some(gate) = self.parked.lock().unwrap().remove(method) {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Record the call and wait on its gate, if one is armed
    async fn enter(&self, method: &'static str) {
        self.calls.lock().unwrap().push(method);
        let gate = self.armed.lock().unwrap().remove(method);
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    async fn call<T>(
        &self,
        method: &'static str,
        f: impl FnOnce(&ContractValues) -> T + Send,
    ) -> Result<T> {
        self.enter(method).await;
        self.read(method, f)
    }

    fn read<T>(&self, method: &'static str, f: impl FnOnce(&ContractValues) -> T) -> Result<T> {
        let values = self.values.lock().unwrap();
        if values.failing.contains(method) {
            return Err(Error::Contract(format!("{} failed", method)));
        }
        Ok(f(&values))
    }

    fn submit(&self, kind: &'static str, value: U256) -> Result<TxHash> {
        self.read(kind, |_| ())?;
        self.submissions.lock().unwrap().push((kind, value));
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(B256::with_last_byte(n as u8))
    }
}

#[async_trait]
impl DonationContract for MockContract {
    fn address(&self) -> Address {
        CONTRACT
    }

    async fn minimum_donation(&self) -> Result<U256> {
        self.call("minimumDonation", |v| v.minimum).await
    }

    async fn total_donations(&self) -> Result<U256> {
        self.call("totalDonations", |v| v.total).await
    }

    async fn donor_total_contributions(&self, donor: Address) -> Result<U256> {
        self.call("donorTotalContributions", |v| {
            v.contributions.get(&donor).copied().unwrap_or_default()
        })
        .await
    }

    async fn donor_tier(&self, donor: Address) -> Result<String> {
        self.call("getDonorTier", |v| {
            v.tiers.get(&donor).cloned().unwrap_or_else(|| "NONE".to_string())
        })
        .await
    }

    async fn donor_count(&self) -> Result<U256> {
        self.call("getDonorCount", |v| v.donors).await
    }

    async fn contract_balance(&self) -> Result<U256> {
        self.call("getContractBalance", |v| v.balance).await
    }

    async fn owner(&self) -> Result<Address> {
        self.owner_calls.fetch_add(1, Ordering::SeqCst);
        self.call("owner", |v| v.owner).await
    }

    async fn donate(&self, value: U256, _gas_limit: u64) -> Result<TxHash> {
        self.submit("donate", value)
    }

    async fn withdraw_funds(&self, amount: U256) -> Result<TxHash> {
        self.submit("withdrawFunds", amount)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        self.enter("receipt").await;
        let last = self.submissions.lock().unwrap().last().copied();
        let mut values = self.values.lock().unwrap();
        if values.failing.contains("receipt") {
            return Err(Error::Contract("receipt unavailable".to_string()));
        }

        let mut logs = Vec::new();
        if values.receipt_success {
            match last {
                Some(("donate", value)) => {
                    values.total += value;
                    values.balance += value;
                    logs.push(Log {
                        address: CONTRACT,
                        data: IDonationPortal::DonationReceived {
                            donor: DONOR,
                            amount: value,
                            timestamp: U256::from(1_700_000_000u64),
                        }
                        .encode_log_data(),
                    });
                }
                Some(("withdrawFunds", amount)) => {
                    values.balance -= amount;
                }
                _ => {}
            }
            logs.extend(values.receipt_logs.iter().cloned());
        }

        Ok(TxReceipt {
            transaction_hash: hash,
            success: values.receipt_success,
            logs,
        })
    }
}

/// Wallet whose accounts, chain and failures are set by the test
pub struct MockWallet {
    pub accounts: Mutex<Vec<Address>>,
    pub chain_id: u64,
    pub code: Mutex<Bytes>,
    pub request_error: Mutex<Option<ProviderError>>,
    pub request_count: AtomicUsize,
    pub contract: Arc<MockContract>,
    pub notifier: AccountNotifier,
    hold: AtomicBool,
    release: Notify,
}

impl MockWallet {
    pub fn new(account: Address) -> Self {
        Self {
            accounts: Mutex::new(vec![account]),
            chain_id: 31337,
            code: Mutex::new(Bytes::from_static(&[0x60, 0x80, 0x60, 0x40])),
            request_error: Mutex::new(None),
            request_count: AtomicUsize::new(0),
            contract: Arc::new(MockContract::default()),
            notifier: AccountNotifier::new(),
            hold: AtomicBool::new(false),
            release: Notify::new(),
        }
    }

    /// Make `request_accounts` block until [`MockWallet::release_requests`]
    pub fn hold_requests(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_requests(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> std::result::Result<Vec<Address>, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if let Some(err) = self.request_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> std::result::Result<u64, ProviderError> {
        Ok(self.chain_id)
    }

    async fn get_code(&self, _address: Address) -> std::result::Result<Bytes, ProviderError> {
        Ok(self.code.lock().unwrap().clone())
    }

    fn subscribe_accounts(&self) -> AccountSubscription {
        self.notifier.subscribe()
    }

    fn bind_contract(&self, _address: Address) -> Arc<dyn DonationContract> {
        self.contract.clone()
    }
}
