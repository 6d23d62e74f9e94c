//! Batch-level dispatch tests against a simulated chain.
//!
//! Covers re-run idempotence, resubmission of lost transfers and the fatal
//! failure paths, using both the in-memory and the SQLite ledger.

use std::cell::RefCell;
use std::collections::HashMap;
use std::str::FromStr;

use token_payout::{
    Amount, BatchReport, BatchSequencer, DispatchPolicy, FundingAccount, LedgerRecord,
    LedgerStore, MemoryLedgerStore, PaymentRequest, PayoutError, Reconciler, RemoteError,
    RemoteLedger, RemoteTransferStatus, RevertedPolicy, SqliteLedgerStore, TransferHandle,
};

const FUNDER: &str = "0x00000000000000000000000000000000000000ff";

fn addr(name: char) -> String {
    format!("0x{:0>40}", name)
}

fn amt(s: &str) -> Amount {
    Amount::from_str(s).unwrap()
}

fn batch(rows: &[(char, &str)]) -> Vec<PaymentRequest> {
    rows.iter()
        .map(|(name, amount)| PaymentRequest::new(addr(*name), *amount))
        .collect()
}

/// In-process chain: accepted transfers are confirmed unless told otherwise,
/// unknown handles are reported as dropped.
struct FakeChain {
    balance: Amount,
    submissions: RefCell<Vec<(String, Amount)>>,
    statuses: RefCell<HashMap<String, RemoteTransferStatus>>,
    lookups_fail: bool,
}

impl FakeChain {
    fn with_balance(balance: &str) -> Self {
        FakeChain {
            balance: amt(balance),
            submissions: RefCell::new(Vec::new()),
            statuses: RefCell::new(HashMap::new()),
            lookups_fail: false,
        }
    }

    fn submission_count(&self) -> usize {
        self.submissions.borrow().len()
    }

    fn set_status(&self, handle: &str, status: RemoteTransferStatus) {
        self.statuses.borrow_mut().insert(handle.to_string(), status);
    }
}

impl RemoteLedger for FakeChain {
    fn current_balance(&self, _account: &str) -> Result<Amount, RemoteError> {
        Ok(self.balance)
    }

    fn submit_transfer(
        &self,
        _from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<TransferHandle, RemoteError> {
        let mut submissions = self.submissions.borrow_mut();
        submissions.push((to.to_string(), amount));
        let handle = format!("0x{:064x}", submissions.len());
        self.set_status(&handle, RemoteTransferStatus::Confirmed);
        Ok(TransferHandle::new(handle))
    }

    fn query_transfer(&self, handle: &TransferHandle) -> RemoteTransferStatus {
        if self.lookups_fail {
            return RemoteTransferStatus::LookupFailed {
                reason: "node unreachable".to_string(),
            };
        }
        self.statuses
            .borrow()
            .get(handle.as_str())
            .cloned()
            .unwrap_or(RemoteTransferStatus::Dropped)
    }
}

fn run<S: LedgerStore>(chain: &FakeChain, store: S, requests: &[PaymentRequest]) -> BatchReport {
    let funding = FundingAccount::load(chain, FUNDER).unwrap();
    BatchSequencer::new(Reconciler::new(chain, store, funding)).run(requests)
}

fn seed(store: &mut impl LedgerStore, name: char, amount: &str, hash: &str) {
    store
        .put(
            &addr(name),
            &LedgerRecord {
                address: addr(name),
                amount: amt(amount),
                transfer: TransferHandle::new(hash),
            },
        )
        .unwrap();
}

// ==================== FRESH BATCHES ====================

#[test]
fn test_fresh_batch_sends_and_skips_zero() {
    let chain = FakeChain::with_balance("100");
    let mut store = MemoryLedgerStore::new();

    let report = run(&chain, &mut store, &batch(&[('a', "10"), ('b', "0"), ('c', "5")]));

    assert!(report.is_success());
    assert_eq!(report.outcome_labels(), vec!["sent", "skipped", "sent"]);
    assert_eq!(report.final_balance, amt("85"));

    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&addr('a')).unwrap().unwrap().amount, amt("10"));
    assert!(store.get(&addr('b')).unwrap().is_none());
    assert_eq!(store.get(&addr('c')).unwrap().unwrap().amount, amt("5"));
}

#[test]
fn test_invalid_address_is_skipped_not_fatal() {
    let chain = FakeChain::with_balance("100");
    let mut store = MemoryLedgerStore::new();
    let requests = vec![
        PaymentRequest::new("0x1234", "10"),
        PaymentRequest::new(addr('a'), "10"),
    ];

    let report = run(&chain, &mut store, &requests);

    assert!(report.is_success());
    assert_eq!(report.outcome_labels(), vec!["skipped", "sent"]);
    assert_eq!(chain.submission_count(), 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_malformed_amount_aborts_before_any_submission() {
    let chain = FakeChain::with_balance("100");
    let mut store = MemoryLedgerStore::new();

    let report = run(&chain, &mut store, &batch(&[('a', "10"), ('b', "abc"), ('c', "5")]));

    let abort = report.abort.as_ref().expect("batch should abort");
    assert_eq!(abort.index, 1);
    assert_eq!(abort.recipient, addr('b'));
    assert!(matches!(abort.error, PayoutError::InvalidAmount { index: 1, .. }));
    assert_eq!(chain.submission_count(), 0);
    assert!(store.is_empty());
}

#[test]
fn test_non_positive_amounts_leave_existing_records_alone() {
    let chain = FakeChain::with_balance("100");
    let mut store = MemoryLedgerStore::new();
    seed(&mut store, 'a', "3", "0xlost");

    let report = run(&chain, &mut store, &batch(&[('a', "0"), ('a', "-2")]));

    assert_eq!(report.outcome_labels(), vec!["skipped", "skipped"]);
    assert_eq!(chain.submission_count(), 0);
    let record = store.get(&addr('a')).unwrap().unwrap();
    assert_eq!(record.transfer, TransferHandle::new("0xlost"));
    assert_eq!(record.amount, amt("3"));
}

// ==================== RECONCILIATION ====================

#[test]
fn test_dropped_transfer_is_resent_with_current_amount() {
    let chain = FakeChain::with_balance("100");
    let mut store = MemoryLedgerStore::new();
    seed(&mut store, 'a', "3", "0xlost");

    let report = run(&chain, &mut store, &batch(&[('a', "7")]));

    assert_eq!(report.outcome_labels(), vec!["resent"]);
    assert_eq!(*chain.submissions.borrow(), vec![(addr('a'), amt("7"))]);
    assert_eq!(report.final_balance, amt("93"));

    let record = store.get(&addr('a')).unwrap().unwrap();
    assert_eq!(record.amount, amt("7"));
    assert_ne!(record.transfer, TransferHandle::new("0xlost"));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_confirmed_and_pending_records_are_not_resent() {
    let chain = FakeChain::with_balance("100");
    chain.set_status("0xdone", RemoteTransferStatus::Confirmed);
    chain.set_status("0xwait", RemoteTransferStatus::Pending);
    let mut store = MemoryLedgerStore::new();
    seed(&mut store, 'a', "10", "0xdone");
    seed(&mut store, 'b', "10", "0xwait");

    let report = run(&chain, &mut store, &batch(&[('a', "10"), ('b', "10")]));

    assert_eq!(report.outcome_labels(), vec!["skipped", "skipped"]);
    assert_eq!(chain.submission_count(), 0);
    assert_eq!(report.final_balance, amt("100"));
}

#[test]
fn test_lookup_failure_is_treated_as_landed() {
    let mut chain = FakeChain::with_balance("100");
    chain.lookups_fail = true;
    let mut store = MemoryLedgerStore::new();
    seed(&mut store, 'a', "10", "0xlost");

    let report = run(&chain, &mut store, &batch(&[('a', "10"), ('b', "4")]));

    assert!(report.is_success());
    assert_eq!(report.outcome_labels(), vec!["skipped", "sent"]);
    assert_eq!(*chain.submissions.borrow(), vec![(addr('b'), amt("4"))]);
}

#[test]
fn test_reverted_transfer_is_resent_once() {
    let chain = FakeChain::with_balance("100");
    chain.set_status("0xbad", RemoteTransferStatus::Reverted);
    let mut store = MemoryLedgerStore::new();
    seed(&mut store, 'a', "3", "0xbad");

    let report = run(&chain, &mut store, &batch(&[('a', "7")]));

    assert!(report.is_success());
    assert_eq!(report.outcome_labels(), vec!["resent"]);
    assert_eq!(*chain.submissions.borrow(), vec![(addr('a'), amt("7"))]);
    assert_eq!(report.final_balance, amt("93"));
    assert_ne!(
        store.get(&addr('a')).unwrap().unwrap().transfer,
        TransferHandle::new("0xbad")
    );
}

#[test]
fn test_reverted_transfer_aborts_batch_when_configured() {
    let chain = FakeChain::with_balance("100");
    chain.set_status("0xbad", RemoteTransferStatus::Reverted);
    let mut store = MemoryLedgerStore::new();
    seed(&mut store, 'b', "10", "0xbad");

    let funding = FundingAccount::load(&chain, FUNDER).unwrap();
    let reconciler = Reconciler::new(&chain, &mut store, funding).with_policy(DispatchPolicy {
        on_reverted: RevertedPolicy::Abort,
        ..DispatchPolicy::CONSERVATIVE
    });
    let report =
        BatchSequencer::new(reconciler).run(&batch(&[('a', "1"), ('b', "10"), ('c', "1")]));

    assert_eq!(report.outcome_labels(), vec!["sent", "failed"]);
    let abort = report.abort.as_ref().unwrap();
    assert_eq!(abort.recipient, addr('b'));
    assert!(matches!(abort.error, PayoutError::TransferReverted { .. }));
}

#[test]
fn test_miscased_checksum_address_is_never_paid() {
    let chain = FakeChain::with_balance("100");
    let mut store = MemoryLedgerStore::new();
    let requests = vec![
        PaymentRequest::new("0xb64ef51C888972c908CFacf59B47C1AfBC0Ab8aC", "1"),
        PaymentRequest::new(addr('a'), "2"),
    ];

    let report = run(&chain, &mut store, &requests);

    assert!(report.is_success());
    assert_eq!(report.outcome_labels(), vec!["skipped", "sent"]);
    assert_eq!(*chain.submissions.borrow(), vec![(addr('a'), amt("2"))]);
}

// ==================== BALANCE GUARD ====================

#[test]
fn test_insufficient_balance_aborts_and_rerun_resumes() {
    let mut store = MemoryLedgerStore::new();
    let requests = batch(&[('a', "10"), ('b', "5"), ('c', "1")]);

    let poor = FakeChain::with_balance("12");
    let report = run(&poor, &mut store, &requests);

    assert_eq!(report.outcome_labels(), vec!["sent", "failed"]);
    assert!(matches!(
        report.abort.as_ref().unwrap().error,
        PayoutError::InsufficientFunds { .. }
    ));
    assert_eq!(poor.submission_count(), 1);
    assert_eq!(store.len(), 1);

    // Topped up: the same chain state, more funds.
    let funded = FakeChain::with_balance("100");
    for (handle, status) in poor.statuses.borrow().iter() {
        funded.set_status(handle, status.clone());
    }
    let report = run(&funded, &mut store, &requests);

    assert!(report.is_success());
    assert_eq!(report.outcome_labels(), vec!["skipped", "sent", "sent"]);
    assert_eq!(funded.submission_count(), 2);
    assert_eq!(store.len(), 3);
}

// ==================== DURABLE LEDGER ====================

#[test]
fn test_rerunning_batch_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payments.dat");
    let chain = FakeChain::with_balance("1000");
    let requests = batch(&[('a', "10"), ('b', "0"), ('c', "5"), ('a', "10"), ('d', "2.5")]);

    let first = run(&chain, SqliteLedgerStore::open(&path).unwrap(), &requests);
    assert!(first.is_success());
    let first_summary = first.summary();
    assert_eq!(first_summary.sent + first_summary.resent, 3);

    for _ in 0..3 {
        let report = run(&chain, SqliteLedgerStore::open(&path).unwrap(), &requests);
        assert!(report.is_success());
        assert_eq!(report.summary().sent + report.summary().resent, 0);
    }

    assert_eq!(chain.submission_count(), 3);
    assert_eq!(SqliteLedgerStore::open(&path).unwrap().len().unwrap(), 3);
}

#[test]
fn test_lost_transfers_are_retried_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payments.dat");
    let requests = batch(&[('a', "10"), ('b', "5")]);

    let chain = FakeChain::with_balance("100");
    run(&chain, SqliteLedgerStore::open(&path).unwrap(), &requests);

    // Second node never saw the first transfer to `a`.
    let fresh_node = FakeChain::with_balance("85");
    let b_handle = SqliteLedgerStore::open(&path)
        .unwrap()
        .get(&addr('b'))
        .unwrap()
        .unwrap()
        .transfer;
    fresh_node.set_status(b_handle.as_str(), RemoteTransferStatus::Confirmed);

    let report = run(&fresh_node, SqliteLedgerStore::open(&path).unwrap(), &requests);

    assert_eq!(report.outcome_labels(), vec!["resent", "skipped"]);
    assert_eq!(*fresh_node.submissions.borrow(), vec![(addr('a'), amt("10"))]);
    assert_eq!(report.final_balance, amt("75"));
}
