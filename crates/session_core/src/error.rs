use shared::{domain::TransactionHash, error::ValidationError};
use thiserror::Error;

use crate::SessionPhase;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no wallet account connected")]
    NoAccount,
    #[error("a transaction is already in progress (phase {phase:?})")]
    Busy { phase: SessionPhase },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("transaction error: {0}")]
    Submission(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("network transaction error: {0}")]
    Network(String),
    #[error("transaction was not confirmed after {attempts} status polls")]
    Timeout { attempts: u32 },
    #[error("stopped tracking transaction {0} before it reached a terminal state")]
    TrackingStopped(TransactionHash),
    #[error("error loading value: {0}")]
    Query(String),
    #[error("error connecting: {0}")]
    Wallet(String),
}

impl SessionError {
    /// Whether the error was raised locally, before anything reached the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SessionError::NoAccount | SessionError::Busy { .. } | SessionError::Validation(_)
        )
    }
}
