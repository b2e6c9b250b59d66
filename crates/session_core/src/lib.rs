use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use shared::{
    domain::{
        Account, ConnectionStatus, ConnectorId, ConnectorInfo, ContractAddress, TransactionHash,
        ValueBalance,
    },
    error::ValidationError,
    protocol::{
        ContractCall, ContractQuery, Invocation, InvokeResponse, PendingIntent,
        TrackedTransaction, TransactionOutcome, TransactionReceipt,
    },
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

pub mod config;
pub mod error;
pub mod validation;

pub use config::SessionSettings;
pub use error::SessionError;

/// Opaque identifier of a broadcast transaction.
pub type TransactionHandle = TransactionHash;

#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn connectors(&self) -> Vec<ConnectorInfo>;
    async fn connect(&self, connector: &ConnectorId) -> Result<Account>;
    async fn disconnect(&self) -> Result<()>;
    async fn current_account(&self) -> Option<Account>;
    fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus>;
}

#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Read-only call executed on behalf of `caller`; returns the raw felts.
    async fn call(
        &self,
        caller: &Account,
        contract_address: &ContractAddress,
        entrypoint: &str,
        calldata: &[String],
    ) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ContractWriter: Send + Sync {
    async fn execute(&self, sender: &Account, calls: Vec<Invocation>) -> Result<InvokeResponse>;
}

#[async_trait]
pub trait TransactionStatusProvider: Send + Sync {
    /// `Ok(None)` while the network does not know the transaction yet.
    async fn receipt(&self, hash: &TransactionHash) -> Result<Option<TransactionReceipt>>;
}

pub struct MissingWalletProvider;

#[async_trait]
impl WalletProvider for MissingWalletProvider {
    fn connectors(&self) -> Vec<ConnectorInfo> {
        Vec::new()
    }

    async fn connect(&self, connector: &ConnectorId) -> Result<Account> {
        Err(anyhow!("wallet connector {connector} is unavailable"))
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn current_account(&self) -> Option<Account> {
        None
    }

    fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        broadcast::channel(1).1
    }
}

pub struct MissingContractReader;

#[async_trait]
impl ContractReader for MissingContractReader {
    async fn call(
        &self,
        _caller: &Account,
        contract_address: &ContractAddress,
        entrypoint: &str,
        _calldata: &[String],
    ) -> Result<Vec<String>> {
        Err(anyhow!(
            "contract reader unavailable for {contract_address}::{entrypoint}"
        ))
    }
}

pub struct MissingContractWriter;

#[async_trait]
impl ContractWriter for MissingContractWriter {
    async fn execute(&self, _sender: &Account, _calls: Vec<Invocation>) -> Result<InvokeResponse> {
        Err(anyhow!("contract writer is unavailable"))
    }
}

pub struct MissingTransactionStatusProvider;

#[async_trait]
impl TransactionStatusProvider for MissingTransactionStatusProvider {
    async fn receipt(&self, hash: &TransactionHash) -> Result<Option<TransactionReceipt>> {
        Err(anyhow!("transaction status unavailable for {hash}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Increase,
    Transfer,
}

impl ActionKind {
    pub fn idle_label(self) -> &'static str {
        match self {
            ActionKind::Increase => "Increase Value",
            ActionKind::Transfer => "Transfer Value",
        }
    }
}

impl From<&PendingIntent> for ActionKind {
    fn from(intent: &PendingIntent) -> Self {
        match intent {
            PendingIntent::Increase { .. } => ActionKind::Increase,
            PendingIntent::Transfer { .. } => ActionKind::Transfer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Network(String),
    Timeout { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TerminalOutcome {
    Succeeded,
    Reverted(String),
    Failed(FailureReason),
}

impl TerminalOutcome {
    fn into_result(self) -> std::result::Result<(), SessionError> {
        match self {
            TerminalOutcome::Succeeded => Ok(()),
            TerminalOutcome::Reverted(reason) => Err(SessionError::Reverted(reason)),
            TerminalOutcome::Failed(FailureReason::Network(message)) => {
                Err(SessionError::Network(message))
            }
            TerminalOutcome::Failed(FailureReason::Timeout { attempts }) => {
                Err(SessionError::Timeout { attempts })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    IncreaseAmount,
    TransferRecipient,
    TransferAmount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormInputs {
    pub increase_amount: String,
    pub transfer_recipient: String,
    pub transfer_amount: String,
}

impl FormInputs {
    fn clear_for(&mut self, action: ActionKind) {
        match action {
            ActionKind::Increase => self.increase_amount.clear(),
            ActionKind::Transfer => {
                self.transfer_recipient.clear();
                self.transfer_amount.clear();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhaseChanged(SessionPhase),
    WalletStatusChanged {
        status: ConnectionStatus,
        account: Option<Account>,
    },
    Submitted(TrackedTransaction),
    Terminal {
        transaction_hash: TransactionHash,
        outcome: TerminalOutcome,
    },
    TrackingStopped {
        transaction_hash: TransactionHash,
    },
    ValueRefreshed(ValueBalance),
    FormsCleared(ActionKind),
    Error(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub connection: ConnectionStatus,
    pub account: Option<Account>,
    pub value: Option<ValueBalance>,
    pub pending: Option<TrackedTransaction>,
    pub last_transaction_hash: Option<TransactionHash>,
    pub last_outcome: Option<TerminalOutcome>,
    pub forms: FormInputs,
}

impl SessionSnapshot {
    pub fn can_submit(&self) -> bool {
        self.account.is_some() && self.phase == SessionPhase::Idle
    }

    pub fn action_label(&self, action: ActionKind) -> &'static str {
        match self.phase {
            SessionPhase::Validating | SessionPhase::Submitting => "Submitting...",
            SessionPhase::Tracking => "Processing Tx...",
            SessionPhase::Idle => action.idle_label(),
        }
    }

    /// Value as shown to the user; `0` until the first successful read.
    pub fn display_value(&self) -> ValueBalance {
        self.value.unwrap_or_default()
    }
}

struct SessionState {
    phase: SessionPhase,
    connection: ConnectionStatus,
    value: Option<ValueBalance>,
    tracked: Option<TrackedTransaction>,
    last_transaction_hash: Option<TransactionHash>,
    last_outcome: Option<TerminalOutcome>,
    forms: FormInputs,
    /// Set while `connect`/`disconnect` drive the wallet; the status watch
    /// stays out of the way until they settle.
    wallet_op_in_flight: bool,
    /// Sequence of the latest started value read and of the one in `value`.
    value_reads: u64,
    value_stored: u64,
}

impl SessionState {
    fn apply_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
        if status == ConnectionStatus::Disconnected {
            self.value = None;
            self.value_stored = self.value_reads;
        }
    }
}

/// Owns the single in-flight write of a wallet session and the cached value.
pub struct TransactionSessionManager {
    settings: SessionSettings,
    wallet: Arc<dyn WalletProvider>,
    reader: Arc<dyn ContractReader>,
    writer: Arc<dyn ContractWriter>,
    status: Arc<dyn TransactionStatusProvider>,
    inner: Mutex<SessionState>,
    tracker: Mutex<Option<(TransactionHandle, JoinHandle<()>)>>,
    events: broadcast::Sender<SessionEvent>,
}

impl TransactionSessionManager {
    pub fn new(settings: SessionSettings) -> Arc<Self> {
        Self::new_with_dependencies(
            settings,
            Arc::new(MissingWalletProvider),
            Arc::new(MissingContractReader),
            Arc::new(MissingContractWriter),
            Arc::new(MissingTransactionStatusProvider),
        )
    }

    pub fn new_with_dependencies(
        settings: SessionSettings,
        wallet: Arc<dyn WalletProvider>,
        reader: Arc<dyn ContractReader>,
        writer: Arc<dyn ContractWriter>,
        status: Arc<dyn TransactionStatusProvider>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));
        Arc::new(Self {
            settings,
            wallet,
            reader,
            writer,
            status,
            inner: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                connection: ConnectionStatus::Disconnected,
                value: None,
                tracked: None,
                last_transaction_hash: None,
                last_outcome: None,
                forms: FormInputs::default(),
                wallet_op_in_flight: false,
                value_reads: 0,
                value_stored: 0,
            }),
            tracker: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn emit_error(&self, err: &SessionError) {
        self.emit(SessionEvent::Error(err.to_string()));
    }

    async fn set_phase(&self, phase: SessionPhase) {
        {
            let mut inner = self.inner.lock().await;
            if inner.phase == phase {
                return;
            }
            inner.phase = phase;
        }
        debug!(?phase, "session: phase changed");
        self.emit(SessionEvent::PhaseChanged(phase));
    }

    pub fn connectors(&self) -> Vec<ConnectorInfo> {
        self.wallet.connectors()
    }

    pub async fn account(&self) -> Option<Account> {
        self.wallet.current_account().await
    }

    pub async fn connect(&self, connector: &ConnectorId) -> Result<Account, SessionError> {
        self.set_connection(ConnectionStatus::Connecting, None, true)
            .await;

        let account = match self.wallet.connect(connector).await {
            Ok(account) => account,
            Err(err) => {
                let err = SessionError::Wallet(err.to_string());
                warn!(%connector, "wallet: connect failed: {err}");
                self.set_connection(ConnectionStatus::Disconnected, None, false)
                    .await;
                self.emit_error(&err);
                return Err(err);
            }
        };

        info!(%connector, account = %account.short(), "wallet: connected");
        self.set_connection(ConnectionStatus::Connected, Some(account.clone()), false)
            .await;

        if let Err(err) = self.refresh_value().await {
            debug!("wallet: initial value read failed: {err}");
        }
        Ok(account)
    }

    /// Forgets the account and its cached value. A transaction already broadcast
    /// keeps being tracked.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.inner.lock().await.wallet_op_in_flight = true;
        if let Err(err) = self.wallet.disconnect().await {
            self.inner.lock().await.wallet_op_in_flight = false;
            let err = SessionError::Wallet(err.to_string());
            self.emit_error(&err);
            return Err(err);
        }
        info!("wallet: disconnected");
        self.set_connection(ConnectionStatus::Disconnected, None, false)
            .await;
        Ok(())
    }

    async fn set_connection(
        &self,
        status: ConnectionStatus,
        account: Option<Account>,
        in_flight: bool,
    ) {
        {
            let mut inner = self.inner.lock().await;
            inner.apply_connection(status);
            inner.wallet_op_in_flight = in_flight;
        }
        self.emit(SessionEvent::WalletStatusChanged { status, account });
    }

    /// Applies a status reported by the wallet itself. Statuses that arrive
    /// while `connect`/`disconnect` run, repeat the known status, or report
    /// `Connecting` for an account that is already connected are dropped.
    async fn apply_wallet_status(&self, status: ConnectionStatus) -> bool {
        let account = self.wallet.current_account().await;
        {
            let mut inner = self.inner.lock().await;
            let lagging = status == ConnectionStatus::Connecting
                && inner.connection == ConnectionStatus::Connected
                && account.is_some();
            if inner.wallet_op_in_flight || inner.connection == status || lagging {
                return false;
            }
            inner.apply_connection(status);
        }
        self.emit(SessionEvent::WalletStatusChanged { status, account });
        true
    }

    /// Follows wallet-side status changes (auto-connect, extension lock, ...).
    pub fn spawn_wallet_watch(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut status_rx = self.wallet.subscribe_status();
        tokio::spawn(async move {
            loop {
                let status = match status_rx.recv().await {
                    Ok(status) => status,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "wallet: status stream lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !manager.apply_wallet_status(status).await {
                    debug!(?status, "wallet: status already applied");
                    continue;
                }
                if status == ConnectionStatus::Connected {
                    if let Err(err) = manager.refresh_value().await {
                        debug!("wallet: value read after reconnect failed: {err}");
                    }
                }
            }
        })
    }

    pub async fn current_value(&self) -> Option<ValueBalance> {
        self.inner.lock().await.value
    }

    /// Re-reads the caller's value from the contract and replaces the cache.
    pub async fn refresh_value(&self) -> Result<ValueBalance, SessionError> {
        let read = self.begin_value_read().await;
        let result = self.query_value().await;
        match &result {
            Ok(value) => {
                if self.store_value(read, *value).await.is_some() {
                    self.emit(SessionEvent::ValueRefreshed(*value));
                }
            }
            Err(err) => self.emit_error(err),
        }
        result
    }

    async fn begin_value_read(&self) -> u64 {
        let mut inner = self.inner.lock().await;
        inner.value_reads += 1;
        inner.value_reads
    }

    /// Stores the result of read `read` unless a later read already landed.
    /// Returns whether the cached value changed, `None` for a stale read.
    async fn store_value(&self, read: u64, value: ValueBalance) -> Option<bool> {
        let mut inner = self.inner.lock().await;
        if read <= inner.value_stored {
            debug!(read, stored = inner.value_stored, "session: dropping stale value read");
            return None;
        }
        inner.value_stored = read;
        let changed = inner.value.replace(value) != Some(value);
        if changed {
            debug!(value = value.0, "session: value updated");
        }
        Some(changed)
    }

    async fn query_value(&self) -> Result<ValueBalance, SessionError> {
        let account = self
            .wallet
            .current_account()
            .await
            .ok_or(SessionError::NoAccount)?;
        let query = ContractQuery::GetValue;
        let felts = self
            .reader
            .call(
                &account,
                &self.settings.contract_address,
                query.entrypoint(),
                &query.calldata(),
            )
            .await
            .map_err(|err| SessionError::Query(err.to_string()))?;

        let Some(first) = felts.first() else {
            return Err(SessionError::Query(format!(
                "{} returned no data",
                query.entrypoint()
            )));
        };
        validation::decode_felt_u128(first)
            .map(ValueBalance)
            .ok_or_else(|| SessionError::Query(format!("unexpected value felt {first:?}")))
    }

    /// Live refresh of the value while an account is connected.
    pub fn spawn_value_watch(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = self.settings.value_watch_interval();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if manager.wallet.current_account().await.is_none() {
                    continue;
                }
                let read = manager.begin_value_read().await;
                match manager.query_value().await {
                    Ok(value) => {
                        if manager.store_value(read, value).await == Some(true) {
                            manager.emit(SessionEvent::ValueRefreshed(value));
                        }
                    }
                    Err(err) => debug!("value watch: read failed: {err}"),
                }
            }
        })
    }

    pub async fn update_form(&self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        let mut inner = self.inner.lock().await;
        match field {
            FormField::IncreaseAmount => inner.forms.increase_amount = value,
            FormField::TransferRecipient => inner.forms.transfer_recipient = value,
            FormField::TransferAmount => inner.forms.transfer_amount = value,
        }
    }

    pub async fn submit_increase_form(&self) -> Result<TransactionHandle, SessionError> {
        let amount = self.inner.lock().await.forms.increase_amount.clone();
        self.submit_increase(&amount).await
    }

    pub async fn submit_transfer_form(&self) -> Result<TransactionHandle, SessionError> {
        let (recipient, amount) = {
            let inner = self.inner.lock().await;
            (
                inner.forms.transfer_recipient.clone(),
                inner.forms.transfer_amount.clone(),
            )
        };
        self.submit_transfer(&recipient, &amount).await
    }

    pub async fn submit_increase(&self, amount: &str) -> Result<TransactionHandle, SessionError> {
        self.submit(|_| validation::increase_call(amount)).await
    }

    pub async fn submit_transfer(
        &self,
        recipient: &str,
        amount: &str,
    ) -> Result<TransactionHandle, SessionError> {
        self.submit(|settings| {
            validation::transfer_call(recipient, amount, settings.strict_recipient_check)
        })
        .await
    }

    async fn submit(
        &self,
        build: impl FnOnce(&SessionSettings) -> Result<ContractCall, ValidationError>,
    ) -> Result<TransactionHandle, SessionError> {
        let Some(account) = self.wallet.current_account().await else {
            let err = SessionError::NoAccount;
            self.emit_error(&err);
            return Err(err);
        };

        {
            let mut inner = self.inner.lock().await;
            if inner.phase != SessionPhase::Idle {
                let err = SessionError::Busy { phase: inner.phase };
                drop(inner);
                debug!("session: rejected submission: {err}");
                self.emit_error(&err);
                return Err(err);
            }
            inner.phase = SessionPhase::Validating;
        }
        self.emit(SessionEvent::PhaseChanged(SessionPhase::Validating));

        let call = match build(&self.settings) {
            Ok(call) => call,
            Err(err) => {
                let err = SessionError::from(err);
                self.set_phase(SessionPhase::Idle).await;
                self.emit_error(&err);
                return Err(err);
            }
        };

        self.set_phase(SessionPhase::Submitting).await;
        let invocation = call.into_invocation(&self.settings.contract_address);
        info!(
            entrypoint = %invocation.entrypoint,
            calldata = ?invocation.calldata,
            sender = %account.short(),
            "session: submitting transaction"
        );

        let response = match self.writer.execute(&account, vec![invocation]).await {
            Ok(response) => response,
            Err(err) => {
                let err = SessionError::Submission(err.to_string());
                error!(entrypoint = call.entrypoint(), "session: submission failed: {err}");
                self.set_phase(SessionPhase::Idle).await;
                self.emit_error(&err);
                return Err(err);
            }
        };

        let tracked = TrackedTransaction {
            intent: PendingIntent::from(&call),
            transaction_hash: response.transaction_hash.clone(),
            submitted_at: Utc::now(),
        };
        {
            let mut inner = self.inner.lock().await;
            inner.tracked = Some(tracked.clone());
            inner.last_transaction_hash = Some(response.transaction_hash.clone());
            inner.last_outcome = None;
            inner.phase = SessionPhase::Tracking;
        }
        info!(hash = %response.transaction_hash, "session: transaction sent");
        self.emit(SessionEvent::PhaseChanged(SessionPhase::Tracking));
        self.emit(SessionEvent::Submitted(tracked));

        Ok(response.transaction_hash)
    }

    async fn is_tracking(&self, handle: &TransactionHash) -> bool {
        let inner = self.inner.lock().await;
        inner
            .tracked
            .as_ref()
            .is_some_and(|tracked| &tracked.transaction_hash == handle)
    }

    /// Queries the status capability once. Safe to repeat: the terminal
    /// transition for the tracked handle is applied only the first time.
    pub async fn poll_outcome(
        &self,
        handle: &TransactionHandle,
    ) -> Result<TransactionOutcome, SessionError> {
        let receipt = match self.status.receipt(handle).await {
            Ok(receipt) => receipt,
            Err(err) => {
                let message = err.to_string();
                if self.is_tracking(handle).await {
                    let _ = self
                        .on_terminal(
                            handle,
                            TerminalOutcome::Failed(FailureReason::Network(message.clone())),
                        )
                        .await;
                }
                return Err(SessionError::Network(message));
            }
        };

        let outcome = receipt
            .map(|receipt| receipt.outcome())
            .unwrap_or(TransactionOutcome::Pending);

        let terminal = match &outcome {
            TransactionOutcome::Pending => None,
            TransactionOutcome::Succeeded => Some(TerminalOutcome::Succeeded),
            TransactionOutcome::Reverted(reason) => Some(TerminalOutcome::Reverted(reason.clone())),
        };
        if let Some(terminal) = terminal {
            if let Err(err) = self.on_terminal(handle, terminal).await {
                debug!(hash = %handle, "session: terminal outcome reported: {err}");
            }
        }

        Ok(outcome)
    }

    /// Applies a terminal outcome to the tracked transaction. A handle that is
    /// not (or no longer) tracked is ignored.
    pub async fn on_terminal(
        &self,
        handle: &TransactionHandle,
        outcome: TerminalOutcome,
    ) -> Result<(), SessionError> {
        let tracked = {
            let mut inner = self.inner.lock().await;
            let matches = inner
                .tracked
                .as_ref()
                .is_some_and(|tracked| &tracked.transaction_hash == handle);
            if !matches {
                return Ok(());
            }
            let tracked = inner.tracked.take();
            inner.phase = SessionPhase::Idle;
            inner.last_outcome = Some(outcome.clone());
            if outcome == TerminalOutcome::Succeeded {
                if let Some(tracked) = &tracked {
                    inner.forms.clear_for(ActionKind::from(&tracked.intent));
                }
            }
            tracked
        };

        self.emit(SessionEvent::PhaseChanged(SessionPhase::Idle));
        self.emit(SessionEvent::Terminal {
            transaction_hash: handle.clone(),
            outcome: outcome.clone(),
        });

        match &outcome {
            TerminalOutcome::Succeeded => {
                info!(hash = %handle, "session: transaction successful");
                if let Some(tracked) = &tracked {
                    self.emit(SessionEvent::FormsCleared(ActionKind::from(&tracked.intent)));
                }
                self.refresh_value().await?;
                return Ok(());
            }
            TerminalOutcome::Reverted(reason) => {
                warn!(hash = %handle, "session: transaction reverted: {reason}");
            }
            TerminalOutcome::Failed(reason) => {
                error!(hash = %handle, ?reason, "session: transaction failed");
            }
        }

        let result = outcome.into_result();
        if let Err(err) = &result {
            self.emit_error(err);
        }
        result
    }

    /// Polls until the handle reaches a terminal state, applying
    /// `Failed(Timeout)` once `max_poll_attempts` polls came back pending.
    pub async fn track(&self, handle: &TransactionHandle) -> Result<(), SessionError> {
        let attempts = self.settings.max_poll_attempts();
        for attempt in 1..=attempts {
            if !self.is_tracking(handle).await {
                return self.settled_result(handle).await;
            }

            match self.poll_outcome(handle).await? {
                TransactionOutcome::Pending => {
                    debug!(hash = %handle, attempt, "session: transaction pending");
                }
                TransactionOutcome::Succeeded => {
                    return self.settled_result(handle).await;
                }
                TransactionOutcome::Reverted(reason) => {
                    return Err(SessionError::Reverted(reason));
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.settings.poll_interval()).await;
            }
        }

        if !self.is_tracking(handle).await {
            return self.settled_result(handle).await;
        }
        self.on_terminal(
            handle,
            TerminalOutcome::Failed(FailureReason::Timeout { attempts }),
        )
        .await
    }

    async fn settled_result(&self, handle: &TransactionHandle) -> Result<(), SessionError> {
        let inner = self.inner.lock().await;
        if inner.last_transaction_hash.as_ref() != Some(handle) {
            return Err(SessionError::TrackingStopped(handle.clone()));
        }
        match inner.last_outcome.clone() {
            Some(outcome) => outcome.into_result(),
            None => Err(SessionError::TrackingStopped(handle.clone())),
        }
    }

    /// Runs `track` in the background. A previous tracker is aborted only
    /// while its handle is still the tracked one; one that already settled is
    /// left to finish its post-success refresh.
    pub async fn spawn_tracker(self: &Arc<Self>, handle: TransactionHandle) {
        let manager = Arc::clone(self);
        let tracked = handle.clone();
        let task = tokio::spawn(async move {
            if let Err(err) = manager.track(&tracked).await {
                debug!(hash = %tracked, "session: tracker finished: {err}");
            }
        });
        let previous = self.tracker.lock().await.replace((handle, task));
        if let Some((previous, task)) = previous {
            self.abort_tracker_for(&previous, task).await;
        }
    }

    async fn abort_tracker_for(&self, handle: &TransactionHandle, task: JoinHandle<()>) {
        if self.is_tracking(handle).await {
            task.abort();
        }
    }

    /// Stops following the tracked transaction. The transaction itself is
    /// irrevocable once broadcast.
    pub async fn stop_tracking(&self) -> Option<TransactionHandle> {
        let task = self.tracker.lock().await.take();
        if let Some((handle, task)) = task {
            self.abort_tracker_for(&handle, task).await;
        }

        let tracked = {
            let mut inner = self.inner.lock().await;
            let tracked = inner.tracked.take()?;
            inner.last_outcome = None;
            inner.phase = SessionPhase::Idle;
            tracked
        };

        info!(hash = %tracked.transaction_hash, "session: stopped tracking transaction");
        self.emit(SessionEvent::PhaseChanged(SessionPhase::Idle));
        self.emit(SessionEvent::TrackingStopped {
            transaction_hash: tracked.transaction_hash.clone(),
        });
        Some(tracked.transaction_hash)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let account = self.wallet.current_account().await;
        let inner = self.inner.lock().await;
        SessionSnapshot {
            phase: inner.phase,
            connection: inner.connection,
            account,
            value: inner.value,
            pending: inner.tracked.clone(),
            last_transaction_hash: inner.last_transaction_hash.clone(),
            last_outcome: inner.last_outcome.clone(),
            forms: inner.forms.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
