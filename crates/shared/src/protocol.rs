use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Account, ContractAddress, TransactionHash};

pub const INCREASE_VALUE_ENTRYPOINT: &str = "increase_value";
pub const TRANSFER_VALUE_ENTRYPOINT: &str = "transfer_value";
pub const GET_VALUE_ENTRYPOINT: &str = "get_value";

/// Typed write call. Only turned into string calldata at the write boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ContractCall {
    IncreaseValue { amount: u128 },
    TransferValue { recipient: Account, amount: u128 },
}

impl ContractCall {
    pub fn entrypoint(&self) -> &'static str {
        match self {
            ContractCall::IncreaseValue { .. } => INCREASE_VALUE_ENTRYPOINT,
            ContractCall::TransferValue { .. } => TRANSFER_VALUE_ENTRYPOINT,
        }
    }

    pub fn calldata(&self) -> Vec<String> {
        match self {
            ContractCall::IncreaseValue { amount } => vec![amount.to_string()],
            ContractCall::TransferValue { recipient, amount } => {
                vec![recipient.to_string(), amount.to_string()]
            }
        }
    }

    pub fn into_invocation(&self, contract_address: &ContractAddress) -> Invocation {
        Invocation {
            contract_address: contract_address.clone(),
            entrypoint: self.entrypoint().to_string(),
            calldata: self.calldata(),
        }
    }
}

/// Wire shape of a single call handed to the write capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub contract_address: ContractAddress,
    pub entrypoint: String,
    pub calldata: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub transaction_hash: TransactionHash,
}

/// Read-only queries against the value contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractQuery {
    GetValue,
}

impl ContractQuery {
    pub fn entrypoint(&self) -> &'static str {
        match self {
            ContractQuery::GetValue => GET_VALUE_ENTRYPOINT,
        }
    }

    pub fn calldata(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    Succeeded,
    Reverted,
    Other(String),
}

impl From<String> for ExecutionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SUCCEEDED" => ExecutionStatus::Succeeded,
            "REVERTED" => ExecutionStatus::Reverted,
            _ => ExecutionStatus::Other(value),
        }
    }
}

impl From<ExecutionStatus> for String {
    fn from(value: ExecutionStatus) -> Self {
        value.as_str().to_string()
    }
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ExecutionStatus::Succeeded => "SUCCEEDED",
            ExecutionStatus::Reverted => "REVERTED",
            ExecutionStatus::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: TransactionHash,
    pub execution_status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
}

impl TransactionReceipt {
    pub fn outcome(&self) -> TransactionOutcome {
        match &self.execution_status {
            ExecutionStatus::Succeeded => TransactionOutcome::Succeeded,
            ExecutionStatus::Reverted | ExecutionStatus::Other(_) => TransactionOutcome::Reverted(
                self.revert_reason
                    .clone()
                    .unwrap_or_else(|| "Failed".to_string()),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum TransactionOutcome {
    Pending,
    Succeeded,
    Reverted(String),
}

/// The single write operation the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingIntent {
    Increase {
        amount: u128,
    },
    Transfer {
        recipient: Account,
        amount: u128,
    },
}

impl From<&ContractCall> for PendingIntent {
    fn from(call: &ContractCall) -> Self {
        match call {
            ContractCall::IncreaseValue { amount } => PendingIntent::Increase { amount: *amount },
            ContractCall::TransferValue { recipient, amount } => PendingIntent::Transfer {
                recipient: recipient.clone(),
                amount: *amount,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTransaction {
    pub intent: PendingIntent,
    pub transaction_hash: TransactionHash,
    pub submitted_at: DateTime<Utc>,
}
