//! Payment request models and the pure request validator.

use crate::amount::Amount;
use serde::Deserialize;
use sha3::{Digest, Keccak256};
use std::str::FromStr;

/// Raw payment row as read from CSV (`addr,amnt`).
///
/// The amount stays textual here so a malformed value can be reported
/// against its row instead of failing deserialization.
#[derive(Debug, Deserialize)]
pub struct PaymentRow {
    /// Recipient address
    pub addr: String,

    /// Amount in whole tokens
    pub amnt: Option<String>,
}

impl From<PaymentRow> for PaymentRequest {
    fn from(row: PaymentRow) -> Self {
        PaymentRequest {
            recipient: row.addr.trim().to_string(),
            amount: row.amnt.unwrap_or_default().trim().to_string(),
        }
    }
}

/// One payment to disburse.
///
/// Requests are not required to be unique; two rows for the same recipient
/// are processed independently in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Recipient address
    pub recipient: String,

    /// Amount as supplied by the loader
    pub amount: String,
}

impl PaymentRequest {
    pub fn new(recipient: impl Into<String>, amount: impl Into<String>) -> Self {
        PaymentRequest {
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    /// Parses the amount field.
    pub fn parse_amount(&self) -> Option<Amount> {
        if self.amount.trim().is_empty() {
            return None;
        }
        Amount::from_str(&self.amount).ok()
    }
}

/// Verdict of [`validate`] on a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Request is payable for the given amount.
    Payable(Amount),

    /// Amount is zero or negative: a no-op.
    SkipZero,

    /// Amount is not a number: fatal to the batch.
    InvalidAmount,

    /// Recipient is not a well-formed address: a no-op.
    InvalidAddress,
}

/// Checks a request without side effects. The amount is checked first.
pub fn validate(request: &PaymentRequest) -> Validation {
    let amount = match request.parse_amount() {
        Some(amount) => amount,
        None => return Validation::InvalidAmount,
    };

    if !amount.is_positive() {
        return Validation::SkipZero;
    }

    if !is_valid_address(&request.recipient) {
        return Validation::InvalidAddress;
    }

    Validation::Payable(amount)
}

/// Returns `true` for a `0x`-prefixed, 20-byte hex account address.
///
/// All-lowercase and all-uppercase hex are accepted as is; mixed case must
/// carry a valid EIP-55 checksum.
pub fn is_valid_address(address: &str) -> bool {
    let hex_part = match address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    {
        Some(rest) => rest,
        None => return false,
    };

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return true;
    }

    checksum_matches(hex_part)
}

/// EIP-55: a letter is uppercase iff the matching nibble of
/// `keccak256(lowercase hex)` is 8 or more.
fn checksum_matches(hex_part: &str) -> bool {
    let hash = Keccak256::digest(hex_part.to_ascii_lowercase().as_bytes());

    hex_part.chars().enumerate().all(|(i, c)| {
        if !c.is_ascii_alphabetic() {
            return true;
        }
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        c.is_ascii_uppercase() == (nibble >= 8)
    })
}
