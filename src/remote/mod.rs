//! Remote ledger interface.
//!
//! The dispatch core only needs three things from the chain: the funding
//! balance at startup, a way to submit a transfer, and a way to ask what
//! became of a transfer submitted earlier.

pub mod eth;

use crate::amount::Amount;
use crate::error::RemoteError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use eth::EthTokenClient;

/// Opaque identifier returned on submission (a transaction hash on
/// Ethereum-style chains).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferHandle(String);

impl TransferHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        TransferHandle(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the remote ledger says about a previously submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTransferStatus {
    /// Included and executed successfully.
    Confirmed,

    /// Known to the network but not yet included.
    Pending,

    /// The query succeeded and found nothing: the transfer never landed.
    Dropped,

    /// Included, but execution reverted.
    Reverted,

    /// The query itself failed; nothing is known.
    LookupFailed { reason: String },
}

/// Narrow client interface to the distributed ledger holding the token.
///
/// Calls are synchronous from the caller's view. Retry and timeout policy
/// belong to the implementation.
pub trait RemoteLedger {
    /// Token balance of `account`.
    fn current_balance(&self, account: &str) -> Result<Amount, RemoteError>;

    /// Submits a transfer and returns once it is accepted for relay.
    fn submit_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<TransferHandle, RemoteError>;

    /// Looks up a transfer by handle. Never fails: query errors are reported
    /// as [`RemoteTransferStatus::LookupFailed`].
    fn query_transfer(&self, handle: &TransferHandle) -> RemoteTransferStatus;
}

impl<T: RemoteLedger + ?Sized> RemoteLedger for &T {
    fn current_balance(&self, account: &str) -> Result<Amount, RemoteError> {
        (**self).current_balance(account)
    }

    fn submit_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<TransferHandle, RemoteError> {
        (**self).submit_transfer(from, to, amount)
    }

    fn query_transfer(&self, handle: &TransferHandle) -> RemoteTransferStatus {
        (**self).query_transfer(handle)
    }
}
