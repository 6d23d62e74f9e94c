//! Error types for the payout tool.

use crate::amount::Amount;
use thiserror::Error;

/// Result type alias for payout operations
pub type Result<T> = std::result::Result<T, PayoutError>;

/// Errors that abort a payout run.
///
/// Every variant here is fatal to the batch. Item-local conditions (bad
/// recipient address, zero amount, ambiguous status lookup) are reported as
/// skip outcomes instead and never surface as a `PayoutError`.
#[derive(Error, Debug)]
pub enum PayoutError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Amount field is not a well-formed number
    #[error("Invalid amount {value:?} at request {index}")]
    InvalidAmount { index: usize, value: String },

    /// Funding account cannot cover the next submission
    #[error("Balance of {available} is too low to make payment of {needed}")]
    InsufficientFunds { needed: Amount, available: Amount },

    /// Remote ledger rejected or failed the transfer submission
    #[error("Transfer submission failed: {0}")]
    SubmitFailed(#[source] RemoteError),

    /// Remote ledger query needed for bootstrap failed
    #[error("Remote ledger error: {0}")]
    Remote(#[from] RemoteError),

    /// Local ledger could not be read or written
    #[error("Local ledger failure: {0}")]
    Store(#[from] StoreError),

    /// Transfer was accepted remotely but the local ledger write failed
    #[error("Transfer {handle} to {address} was accepted but could not be recorded: {source}")]
    Unrecorded {
        address: String,
        handle: String,
        #[source]
        source: StoreError,
    },

    /// A previously recorded transfer executed but reverted on chain
    #[error("Transfer {handle} was mined but reverted")]
    TransferReverted { handle: String },

    /// Status lookup failed and the active policy refuses to guess
    #[error("Could not determine status of transfer {handle}: {reason}")]
    StatusUnknown { handle: String, reason: String },

    /// Funding account is not managed by the connected node
    #[error("Could not find account for {0}")]
    UnknownFundingAccount(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing command-line argument
    #[error("Missing arguments. Usage: token-payout <payments.csv> <from-address>")]
    MissingArgument,
}

/// Errors raised by a local ledger store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt record for {address}: {source}")]
    Corrupt {
        address: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised while talking to the remote ledger.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("node returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("amount conversion failed: {0}")]
    Amount(String),

    #[error("{0}")]
    Rejected(String),
}
