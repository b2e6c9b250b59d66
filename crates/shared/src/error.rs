use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Local input rejection. Raised before any network round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("amount must be a positive integer, got {input:?}")]
    InvalidAmount { input: String },
    #[error("recipient address must not be empty")]
    EmptyRecipient,
    #[error("recipient address {input:?} is not a 0x-prefixed hex felt")]
    MalformedRecipient { input: String },
}

impl ValidationError {
    pub fn invalid_amount(input: impl Into<String>) -> Self {
        Self::InvalidAmount {
            input: input.into(),
        }
    }
}
