//! Session controller
//!
//! Lifecycle: `Disconnected -> Connecting -> Connected(Owner | Donor) -> Disconnected`.
//! Only `connect()` and an empty account-change notification move the phase.
//! Every operation returns `Result` and also records its failure message in
//! [`PortalState::error`], the single channel a presentation layer renders.

use super::amount::format_eth;
use super::state::{
    derive_total_withdrawn, ConnectionStage, ContractSnapshot, DonorTier, PendingTransaction,
    PortalState, Session, SessionPhase, TxKind,
};
use crate::config::{Config, DisconnectPolicy};
use crate::contract::{decode_receipt_events, DonationContract, DonationEvent, TxReceipt};
use crate::wallet::WalletProvider;
use crate::{Error, Result};
use alloy::primitives::{Address, TxHash, U256};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of a `connect()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Session),
    /// Another handshake was in flight; nothing was done
    AlreadyInProgress,
}

/// Confirmed donation
#[derive(Debug, Clone)]
pub struct DonationOutcome {
    pub hash: TxHash,
    pub events: Vec<DonationEvent>,
    /// Status lines accumulated during the donation
    pub status: Vec<String>,
}

/// Confirmed withdrawal
#[derive(Debug, Clone)]
pub struct WithdrawalOutcome {
    pub hash: TxHash,
    pub amount: U256,
}

/// Handle on the account-change listener task; aborts the task when dropped
#[derive(Debug)]
pub struct AccountWatch {
    handle: JoinHandle<()>,
}

impl Drop for AccountWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Releases the connect reentrancy flag on every exit path
struct ConnectGuard<'a>(&'a AtomicBool);

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Account notifications received while a handshake has not yet settled on its account
#[derive(Debug, Default)]
enum HeldAccounts {
    #[default]
    Idle,
    Collecting(Option<Vec<Address>>),
}

/// Owns the wallet session, contract statistics and transaction submission
pub struct SessionController {
    config: Config,
    wallet: Option<Arc<dyn WalletProvider>>,
    state: watch::Sender<PortalState>,
    contract: RwLock<Option<Arc<dyn DonationContract>>>,
    connecting: AtomicBool,
    held_accounts: Mutex<HeldAccounts>,
    account_watch: Mutex<Option<AccountWatch>>,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl SessionController {
    /// Create a controller; `wallet` is `None` when no wallet exists in the environment
    pub fn new(config: Config, wallet: Option<Arc<dyn WalletProvider>>) -> Self {
        let donation_amount = match super::amount::parse_eth(&config.default_donation) {
            Ok(amount) => Some(amount),
            Err(e) => {
                warn!(error = %e, "Ignoring invalid default donation");
                None
            }
        };
        let (state, _) = watch::channel(PortalState {
            donation_amount,
            ..PortalState::default()
        });

        Self {
            config,
            wallet,
            state,
            contract: RwLock::new(None),
            connecting: AtomicBool::new(false),
            held_accounts: Mutex::new(HeldAccounts::Idle),
            account_watch: Mutex::new(None),
        }
    }

    fn held_accounts(&self) -> std::sync::MutexGuard<'_, HeldAccounts> {
        self.held_accounts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current state
    pub fn state(&self) -> PortalState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<PortalState> {
        self.state.subscribe()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Select the amount the next donation will carry
    pub fn set_donation_amount(&self, amount: U256) {
        self.state.send_modify(|s| s.donation_amount = Some(amount));
    }

    /// Run `fut` with the configured request timeout
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let limit = self.config.request_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation,
                after_ms: millis(limit),
            }),
        }
    }

    fn set_stage(&self, stage: ConnectionStage) {
        debug!(stage = %stage, "Connection stage");
        self.state.send_modify(|s| s.stage = stage);
    }

    fn push_status(&self, line: impl Into<String>) {
        let line = line.into();
        self.state.send_modify(|s| s.status.push(line));
    }

    /// Clear the loading flag and record a failure message, if any
    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        self.state.send_modify(|s| {
            s.loading = false;
            if let Err(e) = &result {
                s.error = Some(e.to_string());
            }
        });
        result
    }

    fn begin_operation(&self, first_status: &str) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
            s.status = vec![first_status.to_string()];
        });
    }

    async fn bound_contract(&self) -> Result<Arc<dyn DonationContract>> {
        self.contract.read().await.clone().ok_or(Error::NotConnected)
    }

    fn connected_address(&self) -> Result<Address> {
        let session = self.session();
        match (session.connected, session.address) {
            (true, Some(address)) => Ok(address),
            _ => Err(Error::NotConnected),
        }
    }

    /// Connect to the wallet and load the contract statistics
    ///
    /// A call made while another handshake is in flight returns
    /// [`ConnectOutcome::AlreadyInProgress`] without touching any state.
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Wallet connection already in progress. Please wait.");
            return Ok(ConnectOutcome::AlreadyInProgress);
        }
        let _guard = ConnectGuard(&self.connecting);
        *self.held_accounts() = HeldAccounts::Collecting(None);

        self.state.send_modify(|s| {
            s.phase = SessionPhase::Connecting;
            s.loading = true;
            s.error = None;
            s.stage = ConnectionStage::Checking;
        });

        match self.handshake().await {
            Ok(session) => {
                self.state.send_modify(|s| s.loading = false);
                Ok(ConnectOutcome::Connected(session))
            }
            Err(err) => {
                let stage = self.state.borrow().stage;
                if matches!(err, Error::PendingRequestConflict) {
                    warn!(stage = %stage, "Wallet already has a pending connection request");
                } else {
                    error!(stage = %stage, error = %err, "Wallet connection error");
                }
                *self.held_accounts() = HeldAccounts::Idle;
                *self.contract.write().await = None;
                self.state.send_modify(|s| {
                    s.phase = SessionPhase::Disconnected;
                    s.session = Session::default();
                    s.loading = false;
                    s.error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    async fn handshake(&self) -> Result<Session> {
        let wallet = self.wallet.clone().ok_or(Error::ProviderUnavailable)?;

        self.set_stage(ConnectionStage::Requesting);
        let accounts = self
            .bounded("eth_requestAccounts", async {
                wallet.request_accounts().await.map_err(Error::from)
            })
            .await?;
        let address = *accounts.first().ok_or(Error::NoAccountsGranted)?;

        self.set_stage(ConnectionStage::GettingChain);
        let chain_id = self
            .bounded("eth_chainId", async {
                wallet.chain_id().await.map_err(Error::from)
            })
            .await?;

        self.set_stage(ConnectionStage::CreatingProvider);
        let contract_address = self.config.contract_address.ok_or(Error::ConfigMissing)?;
        let contract = wallet.bind_contract(contract_address);

        self.set_stage(ConnectionStage::CheckingContract);
        let code = self
            .bounded("eth_getCode", async {
                wallet.get_code(contract_address).await.map_err(Error::from)
            })
            .await?;
        if code.is_empty() {
            return Err(Error::ContractMissing {
                address: contract_address,
                chain_id,
            });
        }

        self.set_stage(ConnectionStage::Success);
        *self.contract.write().await = Some(contract.clone());

        // The wallet may have switched accounts since it answered the request
        let address = {
            let mut held = self.held_accounts();
            let latest = match std::mem::take(&mut *held) {
                HeldAccounts::Collecting(Some(accounts)) => {
                    *accounts.first().ok_or(Error::NoAccountsGranted)?
                }
                _ => address,
            };
            if latest != address {
                info!(requested = %address, active = %latest, "Account changed during connection");
            }
            self.state.send_modify(|s| {
                s.session = Session {
                    connected: true,
                    address: Some(latest),
                    is_owner: false,
                };
            });
            latest
        };

        let owner = self.bounded("owner", contract.owner()).await?;
        let is_owner = owner == address;
        self.state.send_modify(|s| {
            s.session.is_owner = is_owner;
            if let Some(role) = s.session.role() {
                s.phase = SessionPhase::Connected(role);
            }
        });
        info!(address = %address, chain_id, is_owner, "Wallet connected");

        if let Err(e) = self.refresh_snapshot(address).await {
            warn!(error = %e, "Connected, but contract statistics could not be loaded");
        }

        Ok(self.session())
    }

    /// Re-read the contract statistics for `address`
    ///
    /// The snapshot is replaced only when every read succeeds, and only while
    /// `address` is still the connected account when the reads complete.
    /// Results for an account that is no longer active are returned but
    /// never shown.
    pub async fn refresh_snapshot(&self, address: Address) -> Result<ContractSnapshot> {
        let result = self.fetch_snapshot(address).await;
        let applied = match &result {
            Ok(snapshot) => {
                let snapshot = snapshot.clone();
                self.state.send_if_modified(|s| {
                    if !is_active(s, address) {
                        return false;
                    }
                    s.snapshot = Some(snapshot);
                    true
                })
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Error fetching donation stats");
                let message = e.to_string();
                self.state.send_if_modified(|s| {
                    if !is_active(s, address) {
                        return false;
                    }
                    s.error = Some(message);
                    true
                })
            }
        };
        if !applied {
            debug!(address = %address, "Discarding statistics for an inactive account");
        }
        result
    }

    async fn fetch_snapshot(&self, address: Address) -> Result<ContractSnapshot> {
        let contract = self.bound_contract().await?;

        let minimum = self
            .bounded("minimumDonation", contract.minimum_donation())
            .await?;
        debug!(minimum = %format_eth(minimum), "Minimum donation");
        self.state.send_modify(|s| match s.donation_amount {
            Some(amount) if amount >= minimum => {}
            _ => s.donation_amount = Some(minimum),
        });

        let (total, user_total, tier_label, donors) = tokio::try_join!(
            self.bounded("totalDonations", contract.total_donations()),
            self.bounded(
                "donorTotalContributions",
                contract.donor_total_contributions(address)
            ),
            self.bounded("getDonorTier", contract.donor_tier(address)),
            self.bounded("getDonorCount", contract.donor_count()),
        )?;

        let donor_tier = tier_label.parse::<DonorTier>().unwrap_or_else(|e| {
            warn!(label = %tier_label, error = %e, "Unknown donor tier label");
            DonorTier::None
        });
        let donor_count = u64::try_from(donors)
            .map_err(|_| Error::Contract(format!("donor count {} out of range", donors)))?;

        let mut snapshot = ContractSnapshot {
            total_donations: total,
            donor_count,
            minimum_donation: minimum,
            user_donations: user_total,
            donor_tier,
            contract_balance: None,
            total_withdrawn: None,
        };

        if self.session().is_owner {
            let balance = self
                .bounded("getContractBalance", contract.contract_balance())
                .await?;
            snapshot.contract_balance = Some(balance);
            snapshot.total_withdrawn = Some(derive_total_withdrawn(total, balance));
        }

        Ok(snapshot)
    }

    /// Wait for `hash` under the confirmation timeout; the pending entry is
    /// discarded whatever the outcome
    async fn await_confirmation(
        &self,
        contract: &Arc<dyn DonationContract>,
        hash: TxHash,
    ) -> Result<TxReceipt> {
        let limit = self.config.confirmation_timeout();
        let result = match tokio::time::timeout(limit, contract.wait_for_receipt(hash)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: "transaction confirmation",
                after_ms: millis(limit),
            }),
        };
        self.state.send_modify(|s| s.pending = None);
        result
    }

    /// Donate `amount` wei
    ///
    /// Rejected without submitting when `amount` is below the known minimum or
    /// below a fresh read of the on-chain minimum.
    pub async fn donate(&self, amount: U256) -> Result<DonationOutcome> {
        let result = self.run_donation(amount).await;
        if let Err(e) = &result {
            error!(error = %e, "Transaction error");
        }
        self.settle(result)
    }

    async fn run_donation(&self, amount: U256) -> Result<DonationOutcome> {
        let address = self.connected_address()?;
        let contract = self.bound_contract().await?;
        if amount.is_zero() {
            return Err(Error::InvalidAmount(
                "donation must be greater than zero".to_string(),
            ));
        }

        let known_minimum = self.state.borrow().snapshot.as_ref().map(|s| s.minimum_donation);
        if let Some(minimum) = known_minimum {
            check_minimum(amount, minimum)?;
        }

        self.begin_operation("Initiating donation...");

        let minimum = self
            .bounded("minimumDonation", contract.minimum_donation())
            .await?;
        check_minimum(amount, minimum)?;

        let hash = self
            .bounded(
                "donate",
                contract.donate(amount, self.config.donation_gas_limit),
            )
            .await?;
        self.state.send_modify(|s| {
            s.pending = Some(PendingTransaction::new(hash, TxKind::Donate));
            s.status.push(format!("Transaction submitted: {}", hash));
        });
        info!(hash = %hash, amount = %format_eth(amount), "Donation submitted");

        let receipt = self.await_confirmation(&contract, hash).await?;
        if !receipt.success {
            return Err(Error::TransactionReverted(format!(
                "transaction {} reverted",
                hash
            )));
        }

        self.push_status("Transaction successful!");
        info!(hash = %hash, "Donation confirmed");
        if let Err(e) = self.refresh_snapshot(address).await {
            warn!(error = %e, "Donation confirmed, but statistics refresh failed");
        }

        let events = decode_receipt_events(&receipt.logs, contract.address());
        for event in &events {
            self.push_status(event.status_line());
        }

        Ok(DonationOutcome {
            hash,
            events,
            status: self.state.borrow().status.clone(),
        })
    }

    /// Withdraw `amount` wei to the owner
    ///
    /// Ownership and the contract balance are re-verified here regardless of
    /// what the presentation layer offers.
    pub async fn withdraw(&self, amount: U256) -> Result<WithdrawalOutcome> {
        let result = self.run_withdrawal(amount).await;
        if let Err(e) = &result {
            error!(error = %e, "Withdrawal error");
        }
        self.settle(result)
    }

    async fn run_withdrawal(&self, amount: U256) -> Result<WithdrawalOutcome> {
        let address = self.connected_address()?;
        if !self.session().is_owner {
            return Err(Error::NotOwner);
        }
        let contract = self.bound_contract().await?;
        if amount.is_zero() {
            return Err(Error::InvalidAmount(
                "withdrawal must be greater than zero".to_string(),
            ));
        }

        self.begin_operation("Initiating withdrawal...");

        let balance = self
            .bounded("getContractBalance", contract.contract_balance())
            .await?;
        if balance.is_zero() || amount > balance {
            return Err(Error::InsufficientContractBalance {
                requested: format_eth(amount),
                balance: format_eth(balance),
            });
        }

        let hash = self
            .bounded("withdrawFunds", contract.withdraw_funds(amount))
            .await?;
        self.state.send_modify(|s| {
            s.pending = Some(PendingTransaction::new(hash, TxKind::Withdraw));
            s.status.push(format!("Transaction submitted: {}", hash));
        });
        info!(hash = %hash, amount = %format_eth(amount), "Withdrawal submitted");

        let receipt = self.await_confirmation(&contract, hash).await?;
        if !receipt.success {
            return Err(Error::TransactionReverted(format!(
                "transaction {} reverted",
                hash
            )));
        }

        self.push_status(format!("Withdrawal of {} ETH confirmed", format_eth(amount)));
        info!(hash = %hash, "Withdrawal confirmed");

        // Shown until the refresh below replaces it
        self.state.send_modify(|s| {
            if let Some(snapshot) = s.snapshot.as_mut() {
                snapshot.total_withdrawn = Some(
                    snapshot
                        .total_withdrawn
                        .unwrap_or_default()
                        .saturating_add(amount),
                );
                snapshot.contract_balance =
                    snapshot.contract_balance.map(|b| b.saturating_sub(amount));
            }
        });
        if let Err(e) = self.refresh_snapshot(address).await {
            warn!(error = %e, "Withdrawal confirmed, but statistics refresh failed");
        }

        Ok(WithdrawalOutcome { hash, amount })
    }

    /// Start listening for account changes
    ///
    /// Subscribes at most once per controller; returns `false` when there is
    /// no wallet to listen to.
    pub fn watch_accounts(self: &Arc<Self>) -> bool {
        let Some(wallet) = self.wallet.as_ref() else {
            return false;
        };
        let mut slot = self.account_watch.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return true;
        }

        let mut subscription = wallet.subscribe_accounts();
        let controller: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(accounts) = subscription.next().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.on_accounts_changed(accounts).await;
            }
            debug!("Account listener stopped");
        });

        *slot = Some(AccountWatch { handle });
        true
    }

    /// Stop the account listener; the subscription is released with it
    pub fn shutdown(&self) {
        let watch = self
            .account_watch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if watch.is_some() {
            debug!("Releasing account listener");
        }
    }

    async fn on_accounts_changed(&self, accounts: Vec<Address>) {
        {
            let mut held = self.held_accounts();
            if let HeldAccounts::Collecting(latest) = &mut *held {
                debug!(count = accounts.len(), "Holding account change until connection settles");
                *latest = Some(accounts);
                return;
            }
        }

        let Some(&address) = accounts.first() else {
            info!("Wallet reported no accounts; disconnecting");
            self.disconnect().await;
            return;
        };

        if !self.session().connected {
            debug!(address = %address, "Ignoring account change while disconnected");
            return;
        }

        info!(address = %address, "Active account changed");
        self.state.send_modify(|s| {
            s.session.address = Some(address);
            s.session.is_owner = false;
        });

        let is_owner = match self.bound_contract().await {
            Ok(contract) => match self.bounded("owner", contract.owner()).await {
                Ok(owner) => owner == address,
                Err(e) => {
                    warn!(error = %e, "Could not re-check ownership; treating account as donor");
                    false
                }
            },
            Err(_) => false,
        };
        self.state.send_modify(|s| {
            s.session.is_owner = is_owner;
            if let Some(role) = s.session.role() {
                s.phase = SessionPhase::Connected(role);
            }
        });

        // Failure is recorded in the state by refresh_snapshot
        let _ = self.refresh_snapshot(address).await;
    }

    /// Tear the session down
    pub async fn disconnect(&self) {
        *self.contract.write().await = None;
        let clear = self.config.disconnect_policy == DisconnectPolicy::ClearSnapshot;
        self.state.send_modify(|s| {
            s.phase = SessionPhase::Disconnected;
            s.session = Session::default();
            s.stage = ConnectionStage::Idle;
            if clear {
                s.snapshot = None;
            }
        });
    }
}

fn is_active(state: &PortalState, address: Address) -> bool {
    state.session.connected && state.session.address == Some(address)
}

fn check_minimum(amount: U256, minimum: U256) -> Result<()> {
    if amount < minimum {
        return Err(Error::BelowMinimumDonation {
            amount: format_eth(amount),
            minimum: format_eth(minimum),
        });
    }
    Ok(())
}
