//! In-memory stand-in for a wallet extension plus a node hosting the value
//! contract. Transactions are executed when their receipt is first revealed,
//! after a configurable number of status polls.

use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use session_core::{
    ContractReader, ContractWriter, SessionSettings, TransactionSessionManager,
    TransactionStatusProvider, WalletProvider,
};
use sha2::{Digest, Sha256};
use shared::{
    domain::{Account, ConnectionStatus, ConnectorId, ConnectorInfo, ContractAddress, TransactionHash},
    protocol::{
        ExecutionStatus, Invocation, InvokeResponse, TransactionReceipt, GET_VALUE_ENTRYPOINT,
        INCREASE_VALUE_ENTRYPOINT, TRANSFER_VALUE_ENTRYPOINT,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    /// Status polls answered with "unknown" before a receipt is revealed.
    pub confirmation_polls: u32,
    /// Seed mixed into connector account derivation.
    pub account_seed: String,
    pub initial_value: u128,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            confirmation_polls: 2,
            account_seed: "devnet".to_string(),
            initial_value: 0,
        }
    }
}

struct PendingExecution {
    sender: Account,
    calls: Vec<Invocation>,
    polls_remaining: u32,
}

#[derive(Default)]
struct LedgerState {
    values: HashMap<Account, u128>,
    pending: HashMap<TransactionHash, PendingExecution>,
    receipts: HashMap<TransactionHash, TransactionReceipt>,
    connected: Option<Account>,
    nonce: u64,
    reject_next_submission: Option<String>,
}

pub struct Devnet {
    config: DevnetConfig,
    contract_address: ContractAddress,
    connectors: Vec<ConnectorInfo>,
    state: Mutex<LedgerState>,
    status_tx: broadcast::Sender<ConnectionStatus>,
}

impl Devnet {
    pub fn new(contract_address: ContractAddress, config: DevnetConfig) -> Arc<Self> {
        let (status_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            config,
            contract_address,
            connectors: vec![
                ConnectorInfo::new("argentX", "Argent X"),
                ConnectorInfo::new("braavos", "Braavos"),
            ],
            state: Mutex::new(LedgerState::default()),
            status_tx,
        })
    }

    /// Builds a session manager whose four capabilities are all backed by this devnet.
    pub fn session_manager(
        self: &Arc<Self>,
        settings: SessionSettings,
    ) -> Arc<TransactionSessionManager> {
        TransactionSessionManager::new_with_dependencies(
            settings,
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    /// Deterministic account a connector resolves to.
    pub fn account_for(&self, connector: &ConnectorId) -> Account {
        let digest = Sha256::new()
            .chain_update(self.config.account_seed.as_bytes())
            .chain_update(b"/")
            .chain_update(connector.as_str().as_bytes())
            .finalize();
        Account::new(felt_hex(&digest))
    }

    pub async fn value_of(&self, account: &Account) -> u128 {
        let state = self.state.lock().await;
        state
            .values
            .get(account)
            .copied()
            .unwrap_or(self.config.initial_value)
    }

    pub async fn set_value(&self, account: &Account, value: u128) {
        self.state.lock().await.values.insert(account.clone(), value);
    }

    /// Makes the next `execute` fail as if the user declined it in the wallet.
    pub async fn reject_next_submission(&self, reason: impl Into<String>) {
        self.state.lock().await.reject_next_submission = Some(reason.into());
    }

    /// Drops the connected account without going through `disconnect`, as a
    /// locked wallet extension would.
    pub async fn lock_wallet(&self) {
        self.state.lock().await.connected = None;
        let _ = self.status_tx.send(ConnectionStatus::Disconnected);
    }

    fn transaction_hash(sender: &Account, nonce: u64, calls: &[Invocation]) -> TransactionHash {
        let mut hasher = Sha256::new();
        hasher.update(sender.as_str().as_bytes());
        hasher.update(nonce.to_be_bytes());
        for call in calls {
            hasher.update(call.contract_address.as_str().as_bytes());
            hasher.update(call.entrypoint.as_bytes());
            for arg in &call.calldata {
                hasher.update(arg.as_bytes());
            }
        }
        TransactionHash::new(felt_hex(&hasher.finalize()))
    }

    fn check_call(&self, call: &Invocation) -> Result<()> {
        if call.contract_address != self.contract_address {
            bail!("Contract not found: {}", call.contract_address);
        }
        let expected_args = match call.entrypoint.as_str() {
            INCREASE_VALUE_ENTRYPOINT => 1,
            TRANSFER_VALUE_ENTRYPOINT => 2,
            other => bail!("Entry point {other} not found in contract"),
        };
        if call.calldata.len() != expected_args {
            bail!(
                "{} expects {expected_args} calldata elements, got {}",
                call.entrypoint,
                call.calldata.len()
            );
        }
        Ok(())
    }
}

/// Felt-sized (251-bit) hex rendering of a 32-byte digest.
fn felt_hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(2 + digest.len() * 2);
    out.push_str("0x0");
    out.push_str(&format!("{:x}", digest[0] & 0x07));
    for byte in &digest[1..] {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn parse_u128(raw: &str) -> Option<u128> {
    match raw.strip_prefix("0x") {
        Some(hex) => u128::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Runs every call of a transaction against a scratch copy of the ledger and
/// commits only when all of them succeed.
fn apply_calls(
    values: &mut HashMap<Account, u128>,
    initial_value: u128,
    sender: &Account,
    calls: &[Invocation],
) -> std::result::Result<(), String> {
    let mut scratch = values.clone();
    let value_of = |map: &HashMap<Account, u128>, account: &Account| {
        map.get(account).copied().unwrap_or(initial_value)
    };

    for call in calls {
        match call.entrypoint.as_str() {
            INCREASE_VALUE_ENTRYPOINT => {
                let amount = parse_u128(&call.calldata[0])
                    .ok_or_else(|| "Failed to deserialize param #1".to_string())?;
                let current = value_of(&scratch, sender);
                let next = current
                    .checked_add(amount)
                    .ok_or_else(|| "u128_add Overflow".to_string())?;
                scratch.insert(sender.clone(), next);
            }
            TRANSFER_VALUE_ENTRYPOINT => {
                let recipient = Account::new(call.calldata[0].clone());
                let amount = parse_u128(&call.calldata[1])
                    .ok_or_else(|| "Failed to deserialize param #2".to_string())?;
                let sender_value = value_of(&scratch, sender);
                if sender_value < amount {
                    return Err("Insufficient value".to_string());
                }
                scratch.insert(sender.clone(), sender_value - amount);
                let recipient_value = value_of(&scratch, &recipient);
                let credited = recipient_value
                    .checked_add(amount)
                    .ok_or_else(|| "u128_add Overflow".to_string())?;
                scratch.insert(recipient, credited);
            }
            other => return Err(format!("Entry point {other} not found in contract")),
        }
    }

    *values = scratch;
    Ok(())
}

#[async_trait]
impl WalletProvider for Devnet {
    fn connectors(&self) -> Vec<ConnectorInfo> {
        self.connectors.clone()
    }

    async fn connect(&self, connector: &ConnectorId) -> Result<Account> {
        if !self.connectors.iter().any(|info| &info.id == connector) {
            return Err(anyhow!("Connector not found: {connector}"));
        }
        let _ = self.status_tx.send(ConnectionStatus::Connecting);
        let account = self.account_for(connector);
        self.state.lock().await.connected = Some(account.clone());
        let _ = self.status_tx.send(ConnectionStatus::Connected);
        info!(%connector, account = %account.short(), "devnet: wallet connected");
        Ok(account)
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.lock().await.connected = None;
        let _ = self.status_tx.send(ConnectionStatus::Disconnected);
        Ok(())
    }

    async fn current_account(&self) -> Option<Account> {
        self.state.lock().await.connected.clone()
    }

    fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }
}

#[async_trait]
impl ContractReader for Devnet {
    async fn call(
        &self,
        caller: &Account,
        contract_address: &ContractAddress,
        entrypoint: &str,
        calldata: &[String],
    ) -> Result<Vec<String>> {
        if contract_address != &self.contract_address {
            bail!("Contract not found: {contract_address}");
        }
        if entrypoint != GET_VALUE_ENTRYPOINT {
            bail!("Entry point {entrypoint} not found in contract");
        }
        if !calldata.is_empty() {
            bail!("{GET_VALUE_ENTRYPOINT} takes no arguments");
        }
        Ok(vec![self.value_of(caller).await.to_string()])
    }
}

#[async_trait]
impl ContractWriter for Devnet {
    async fn execute(&self, sender: &Account, calls: Vec<Invocation>) -> Result<InvokeResponse> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.reject_next_submission.take() {
            bail!(reason);
        }
        if state.connected.as_ref() != Some(sender) {
            bail!("account {sender} is not connected");
        }
        if calls.is_empty() {
            bail!("transaction must contain at least one call");
        }
        for call in &calls {
            self.check_call(call)?;
        }

        state.nonce += 1;
        let hash = Self::transaction_hash(sender, state.nonce, &calls);
        debug!(%hash, calls = calls.len(), "devnet: transaction accepted");
        state.pending.insert(
            hash.clone(),
            PendingExecution {
                sender: sender.clone(),
                calls,
                polls_remaining: self.config.confirmation_polls,
            },
        );
        Ok(InvokeResponse {
            transaction_hash: hash,
        })
    }
}

#[async_trait]
impl TransactionStatusProvider for Devnet {
    async fn receipt(&self, hash: &TransactionHash) -> Result<Option<TransactionReceipt>> {
        let mut state = self.state.lock().await;
        if let Some(receipt) = state.receipts.get(hash) {
            return Ok(Some(receipt.clone()));
        }

        let Some(pending) = state.pending.get_mut(hash) else {
            bail!("Transaction hash {hash} not found");
        };
        if pending.polls_remaining > 0 {
            pending.polls_remaining -= 1;
            return Ok(None);
        }

        let Some(pending) = state.pending.remove(hash) else {
            return Ok(None);
        };
        let initial_value = self.config.initial_value;
        let receipt = match apply_calls(&mut state.values, initial_value, &pending.sender, &pending.calls) {
            Ok(()) => TransactionReceipt {
                transaction_hash: hash.clone(),
                execution_status: ExecutionStatus::Succeeded,
                revert_reason: None,
            },
            Err(reason) => TransactionReceipt {
                transaction_hash: hash.clone(),
                execution_status: ExecutionStatus::Reverted,
                revert_reason: Some(reason),
            },
        };
        info!(%hash, status = receipt.execution_status.as_str(), "devnet: transaction executed");
        state.receipts.insert(hash.clone(), receipt.clone());
        Ok(Some(receipt))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
