//! Dispatch reconciliation: the per-recipient state machine.
//!
//! For every request the reconciler decides whether to skip, submit, resubmit
//! or abort, based on the local ledger and, when a record already exists, on
//! what the remote ledger says about the recorded transfer.
//!
//! ```text
//! validate ──▶ skip (zero amount / bad address) | abort (bad amount)
//!    │
//!    ▼
//! ledger.get ── none ──▶ submit ──▶ debit ──▶ ledger.put ──▶ sent
//!    │
//!   some
//!    ▼
//! query_transfer ── confirmed / pending ──▶ skip
//!                ── lookup failed ───────▶ policy: skip (assume landed) | abort
//!                ── dropped ─────────────▶ submit ... ──▶ resent
//!                ── reverted ────────────▶ policy: submit ... ──▶ resent | abort
//! ```

use crate::amount::Amount;
use crate::error::{PayoutError, Result};
use crate::funding::FundingAccount;
use crate::remote::{RemoteLedger, RemoteTransferStatus, TransferHandle};
use crate::report::{ItemOutcome, SkipReason};
use crate::request::{validate, PaymentRequest, Validation};
use crate::store::{LedgerRecord, LedgerStore};
use log::{debug, error, info, warn};

/// What to do when the status of a recorded transfer cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailurePolicy {
    /// Treat the transfer as landed and skip the recipient. Risks
    /// under-payment, which a later re-run can repair.
    AssumeLanded,

    /// Abort the batch.
    Abort,
}

/// What to do when a recorded transfer was mined but reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertedPolicy {
    /// Treat it like a dropped transfer and submit again.
    Resubmit,

    /// Abort the batch so an operator can look at the failing transfer.
    Abort,
}

/// Decisions with financial consequences, kept in one auditable place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub on_lookup_failure: LookupFailurePolicy,
    pub on_reverted: RevertedPolicy,
}

impl DispatchPolicy {
    /// Never knowingly double-pays: an unknown status counts as landed. A
    /// reverted transfer moved nothing, so it is resubmitted like a dropped one.
    pub const CONSERVATIVE: DispatchPolicy = DispatchPolicy {
        on_lookup_failure: LookupFailurePolicy::AssumeLanded,
        on_reverted: RevertedPolicy::Resubmit,
    };
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::CONSERVATIVE
    }
}

/// Drives one recipient at a time from request to recorded outcome.
///
/// Owns the funding account state for the batch; the running balance only
/// changes here, right after a submission is accepted.
pub struct Reconciler<R, S> {
    remote: R,
    store: S,
    funding: FundingAccount,
    policy: DispatchPolicy,
}

impl<R: RemoteLedger, S: LedgerStore> Reconciler<R, S> {
    pub fn new(remote: R, store: S, funding: FundingAccount) -> Self {
        Reconciler {
            remote,
            store,
            funding,
            policy: DispatchPolicy::CONSERVATIVE,
        }
    }

    /// Replaces the dispatch policy.
    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub fn funding(&self) -> &FundingAccount {
        &self.funding
    }

    /// Resolves a single request. Returns `Err` only for conditions fatal to
    /// the batch; the returned outcome is never [`ItemOutcome::Failed`].
    pub fn dispatch(&mut self, index: usize, request: &PaymentRequest) -> Result<ItemOutcome> {
        let amount = match validate(request) {
            Validation::Payable(amount) => amount,
            Validation::SkipZero => {
                debug!(
                    "Request {}: Ignoring non-positive amount {} for {}",
                    index, request.amount, request.recipient
                );
                return Ok(ItemOutcome::Skipped(SkipReason::ZeroAmount));
            }
            Validation::InvalidAddress => {
                warn!(
                    "Request {}: Supplied address {} is incorrect, skipping",
                    index, request.recipient
                );
                return Ok(ItemOutcome::Skipped(SkipReason::InvalidAddress));
            }
            Validation::InvalidAmount => {
                return Err(PayoutError::InvalidAmount {
                    index,
                    value: request.amount.clone(),
                });
            }
        };

        match self.store.get(&request.recipient)? {
            None => self
                .submit(index, &request.recipient, amount)
                .map(ItemOutcome::Sent),
            Some(record) => self.reconcile(index, &request.recipient, amount, record),
        }
    }

    /// Decides what to do for an address that already has a record.
    fn reconcile(
        &mut self,
        index: usize,
        recipient: &str,
        amount: Amount,
        record: LedgerRecord,
    ) -> Result<ItemOutcome> {
        let previous = record.transfer;

        match self.remote.query_transfer(&previous) {
            RemoteTransferStatus::Confirmed => {
                debug!(
                    "Request {}: Transfer {} to {} confirmed, skipping",
                    index, previous, recipient
                );
                Ok(ItemOutcome::Skipped(SkipReason::AlreadyConfirmed))
            }
            RemoteTransferStatus::Pending => {
                debug!(
                    "Request {}: Transfer {} to {} pending, skipping",
                    index, previous, recipient
                );
                Ok(ItemOutcome::Skipped(SkipReason::AlreadyPending))
            }
            RemoteTransferStatus::LookupFailed { reason } => match self.policy.on_lookup_failure {
                LookupFailurePolicy::AssumeLanded => {
                    warn!(
                        "Request {}: Error looking up transfer {} for address {}: {}; assuming it landed",
                        index, previous, recipient, reason
                    );
                    Ok(ItemOutcome::Skipped(SkipReason::StatusUnknown { reason }))
                }
                LookupFailurePolicy::Abort => Err(PayoutError::StatusUnknown {
                    handle: previous.to_string(),
                    reason,
                }),
            },
            RemoteTransferStatus::Dropped => {
                info!(
                    "Request {}: Transfer {} for address {} not found, repaying",
                    index, previous, recipient
                );
                self.resubmit(index, recipient, amount, previous)
            }
            RemoteTransferStatus::Reverted => match self.policy.on_reverted {
                RevertedPolicy::Abort => Err(PayoutError::TransferReverted {
                    handle: previous.to_string(),
                }),
                RevertedPolicy::Resubmit => {
                    info!(
                        "Request {}: Transfer {} for address {} reverted, repaying",
                        index, previous, recipient
                    );
                    self.resubmit(index, recipient, amount, previous)
                }
            },
        }
    }

    fn resubmit(
        &mut self,
        index: usize,
        recipient: &str,
        amount: Amount,
        previous: TransferHandle,
    ) -> Result<ItemOutcome> {
        let transfer = self.submit(index, recipient, amount)?;
        Ok(ItemOutcome::Resent { transfer, previous })
    }

    /// Balance check, submission, debit and durable record, in that order.
    fn submit(&mut self, index: usize, recipient: &str, amount: Amount) -> Result<TransferHandle> {
        self.funding.ensure_covers(amount)?;

        let transfer = self
            .remote
            .submit_transfer(&self.funding.address, recipient, amount)
            .map_err(PayoutError::SubmitFailed)?;
        self.funding.debit(amount);

        let record = LedgerRecord {
            address: recipient.to_string(),
            amount,
            transfer: transfer.clone(),
        };
        if let Err(source) = self.store.put(recipient, &record) {
            error!(
                "Request {}: Transfer {} to {} accepted but not recorded",
                index, transfer, recipient
            );
            return Err(PayoutError::Unrecorded {
                address: recipient.to_string(),
                handle: transfer.to_string(),
                source,
            });
        }

        info!(
            "[BAL: {}] Sent {} tokens to {} from account {} - txhash is {}",
            self.funding.running_balance(),
            amount,
            recipient,
            self.funding.address,
            transfer
        );

        Ok(transfer)
    }
}
