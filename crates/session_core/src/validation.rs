//! Input parsing for the increase and transfer forms.

use shared::{domain::Account, error::ValidationError, protocol::ContractCall};

const MAX_FELT_HEX_DIGITS: usize = 64;

/// Parses a strictly positive decimal amount. Surrounding whitespace is ignored;
/// signs, fractions, exponents and values beyond `u128` are rejected.
pub fn parse_amount(input: &str) -> Result<u128, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::invalid_amount(input));
    }

    match trimmed.parse::<u128>() {
        Ok(0) | Err(_) => Err(ValidationError::invalid_amount(input)),
        Ok(amount) => Ok(amount),
    }
}

pub fn parse_recipient(input: &str, strict: bool) -> Result<Account, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyRecipient);
    }

    if strict && !is_hex_felt(trimmed) {
        return Err(ValidationError::MalformedRecipient {
            input: trimmed.to_string(),
        });
    }

    Ok(Account::new(trimmed))
}

pub fn increase_call(amount: &str) -> Result<ContractCall, ValidationError> {
    Ok(ContractCall::IncreaseValue {
        amount: parse_amount(amount)?,
    })
}

pub fn transfer_call(
    recipient: &str,
    amount: &str,
    strict_recipient: bool,
) -> Result<ContractCall, ValidationError> {
    let recipient = parse_recipient(recipient, strict_recipient)?;
    let amount = parse_amount(amount)?;
    Ok(ContractCall::TransferValue { recipient, amount })
}

fn is_hex_felt(value: &str) -> bool {
    let Some(digits) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    else {
        return false;
    };

    !digits.is_empty()
        && digits.len() <= MAX_FELT_HEX_DIGITS
        && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decodes a single felt returned by a contract read (decimal or `0x` hex).
pub fn decode_felt_u128(felt: &str) -> Option<u128> {
    let felt = felt.trim();
    match felt
        .strip_prefix("0x")
        .or_else(|| felt.strip_prefix("0X"))
    {
        Some("") => None,
        Some(hex) => u128::from_str_radix(hex, 16).ok(),
        None => felt.parse::<u128>().ok(),
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
