//! Batch sequencing.
//!
//! Requests are resolved strictly in input order, one at a time, against a
//! single funding account. Nothing is submitted until every amount in the
//! batch has parsed, so a data-quality defect anywhere in the input stops the
//! run before any money moves.

use crate::error::PayoutError;
use crate::remote::RemoteLedger;
use crate::reconciler::Reconciler;
use crate::report::{BatchAbort, BatchReport, ItemOutcome, ItemReport};
use crate::request::PaymentRequest;
use crate::store::LedgerStore;
use log::{error, info};

/// Runs one batch through a [`Reconciler`].
pub struct BatchSequencer<R, S> {
    reconciler: Reconciler<R, S>,
}

impl<R: RemoteLedger, S: LedgerStore> BatchSequencer<R, S> {
    pub fn new(reconciler: Reconciler<R, S>) -> Self {
        BatchSequencer { reconciler }
    }

    /// Processes `requests` and reports per-item outcomes. Stops at the first
    /// fatal failure; records written before it stay valid, so the batch can
    /// simply be run again.
    pub fn run(mut self, requests: &[PaymentRequest]) -> BatchReport {
        info!(
            "Dispatching {} payments from {} (balance {})",
            requests.len(),
            self.reconciler.funding().address,
            self.reconciler.funding().running_balance()
        );

        if let Some(abort) = preflight(requests) {
            error!("Unable to start batch, {}", abort);
            return BatchReport {
                items: vec![failed_item(&abort, requests)],
                abort: Some(abort),
                final_balance: self.reconciler.funding().running_balance(),
            };
        }

        let mut items = Vec::with_capacity(requests.len());
        let mut abort = None;

        for (index, request) in requests.iter().enumerate() {
            match self.reconciler.dispatch(index, request) {
                Ok(outcome) => items.push(ItemReport {
                    index,
                    recipient: request.recipient.clone(),
                    amount: request.amount.clone(),
                    outcome,
                }),
                Err(error) => {
                    let failure = BatchAbort {
                        index,
                        recipient: request.recipient.clone(),
                        error,
                    };
                    error!("Unable to complete, {}", failure);
                    items.push(failed_item(&failure, requests));
                    abort = Some(failure);
                    break;
                }
            }
        }

        BatchReport {
            items,
            abort,
            final_balance: self.reconciler.funding().running_balance(),
        }
    }
}

/// Finds the first request whose amount does not parse.
fn preflight(requests: &[PaymentRequest]) -> Option<BatchAbort> {
    requests
        .iter()
        .enumerate()
        .find(|(_, request)| request.parse_amount().is_none())
        .map(|(index, request)| BatchAbort {
            index,
            recipient: request.recipient.clone(),
            error: PayoutError::InvalidAmount {
                index,
                value: request.amount.clone(),
            },
        })
}

fn failed_item(abort: &BatchAbort, requests: &[PaymentRequest]) -> ItemReport {
    ItemReport {
        index: abort.index,
        recipient: abort.recipient.clone(),
        amount: requests
            .get(abort.index)
            .map(|r| r.amount.clone())
            .unwrap_or_default(),
        outcome: ItemOutcome::Failed(abort.error.to_string()),
    }
}
