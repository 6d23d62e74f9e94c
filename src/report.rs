//! Per-item outcomes and the terminal report of a batch run.

use crate::amount::Amount;
use crate::error::{PayoutError, Result};
use crate::remote::TransferHandle;
use std::fmt;
use std::io::Write;

/// Why an item was processed as a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Amount is zero or negative.
    ZeroAmount,

    /// Recipient address is malformed.
    InvalidAddress,

    /// A recorded transfer for the address has settled.
    AlreadyConfirmed,

    /// A recorded transfer for the address is still in flight.
    AlreadyPending,

    /// The recorded transfer's status could not be determined and is
    /// assumed to have landed.
    StatusUnknown { reason: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ZeroAmount => f.write_str("zero amount"),
            SkipReason::InvalidAddress => f.write_str("invalid address"),
            SkipReason::AlreadyConfirmed => f.write_str("already confirmed"),
            SkipReason::AlreadyPending => f.write_str("already pending"),
            SkipReason::StatusUnknown { reason } => write!(f, "status unknown: {}", reason),
        }
    }
}

/// Terminal outcome of one payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Skipped(SkipReason),

    /// First submission for the address.
    Sent(TransferHandle),

    /// Replacement for a recorded transfer that never landed.
    Resent {
        transfer: TransferHandle,
        previous: TransferHandle,
    },

    /// The item that aborted the batch.
    Failed(String),
}

impl ItemOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Skipped(_) => "skipped",
            ItemOutcome::Sent(_) => "sent",
            ItemOutcome::Resent { .. } => "resent",
            ItemOutcome::Failed(_) => "failed",
        }
    }

    fn detail(&self) -> String {
        match self {
            ItemOutcome::Skipped(reason) => reason.to_string(),
            ItemOutcome::Sent(transfer) => transfer.to_string(),
            ItemOutcome::Resent { transfer, .. } => transfer.to_string(),
            ItemOutcome::Failed(reason) => reason.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemReport {
    /// Position of the request in the batch (0-based)
    pub index: usize,
    pub recipient: String,
    /// Amount as supplied
    pub amount: String,
    pub outcome: ItemOutcome,
}

/// The fatal failure that stopped a batch.
#[derive(Debug)]
pub struct BatchAbort {
    pub index: usize,
    pub recipient: String,
    pub error: PayoutError,
}

impl fmt::Display for BatchAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aborted at request {} for address {}: {}",
            self.index, self.recipient, self.error
        )
    }
}

/// Counts per outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub sent: usize,
    pub resent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of a batch run, for the presentation layer to render.
///
/// `items` holds one entry per processed request in input order. On abort the
/// last entry is the failed one and requests after it were not processed.
#[derive(Debug)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    pub abort: Option<BatchAbort>,
    pub final_balance: Amount,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.abort.is_none()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for item in &self.items {
            match item.outcome {
                ItemOutcome::Skipped(_) => summary.skipped += 1,
                ItemOutcome::Sent(_) => summary.sent += 1,
                ItemOutcome::Resent { .. } => summary.resent += 1,
                ItemOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Outcome labels in input order.
    pub fn outcome_labels(&self) -> Vec<&'static str> {
        self.items.iter().map(|item| item.outcome.label()).collect()
    }

    /// Writes one CSV row per processed item.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["index", "address", "amount", "outcome", "transfer"])?;

        for item in &self.items {
            csv_writer.write_record([
                item.index.to_string(),
                item.recipient.clone(),
                item.amount.clone(),
                item.outcome.label().to_string(),
                item.outcome.detail(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}
