//! # Token Payout
//!
//! Disburses a batch of token payments to a list of recipients exactly once
//! each, across restarts, network failures and crashes between submitting a
//! transfer and recording it.
//!
//! ## Design Principles
//!
//! - **One record per recipient**: the local ledger maps each address to its
//!   latest transfer attempt; re-running a batch reconciles against it
//! - **Never knowingly double-pay**: an address with a recorded transfer is
//!   only paid again when the remote ledger reports that transfer as gone
//! - **Strictly sequential**: one recipient resolves fully (submit and
//!   record) before the next starts
//! - **Exact arithmetic**: amounts use `rust_decimal`, never floats
//!
//! ## Example
//!
//! ```no_run
//! use token_payout::{
//!     load_requests, BatchSequencer, EthTokenClient, FundingAccount, PayoutConfig, Reconciler,
//!     SqliteLedgerStore,
//! };
//! use std::io::Cursor;
//!
//! let config = PayoutConfig::from_env().unwrap();
//! let remote = EthTokenClient::new(&config).unwrap();
//! let store = SqliteLedgerStore::open("payouts.dat").unwrap();
//! let funding =
//!     FundingAccount::load(&remote, "0x00000000000000000000000000000000000000ff").unwrap();
//!
//! let csv = "addr,amnt\n0x000000000000000000000000000000000000000a,10\n";
//! let requests = load_requests(Cursor::new(csv)).unwrap();
//!
//! let report = BatchSequencer::new(Reconciler::new(&remote, store, funding)).run(&requests);
//! report.write_csv(std::io::stdout()).unwrap();
//! ```

pub mod amount;
pub mod config;
pub mod error;
pub mod funding;
pub mod loader;
pub mod reconciler;
pub mod remote;
pub mod report;
pub mod request;
pub mod sequencer;
pub mod store;

pub use amount::Amount;
pub use config::PayoutConfig;
pub use error::{PayoutError, RemoteError, Result, StoreError};
pub use funding::FundingAccount;
pub use loader::load_requests;
pub use reconciler::{DispatchPolicy, LookupFailurePolicy, Reconciler, RevertedPolicy};
pub use remote::{EthTokenClient, RemoteLedger, RemoteTransferStatus, TransferHandle};
pub use report::{BatchAbort, BatchReport, ItemOutcome, ItemReport, SkipReason, Summary};
pub use request::{validate, PaymentRequest, Validation};
pub use sequencer::BatchSequencer;
pub use store::{LedgerRecord, LedgerStore, MemoryLedgerStore, SqliteLedgerStore};
