//! Token Payout CLI
//!
//! Pays every recipient in a CSV file from one node-managed account, keeping
//! a ledger next to the input so the same file can be re-run safely.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- payments.csv 0xYourFundingAccount > report.csv
//! ```
//!
//! The ledger for `payments.csv` is stored in `payments.dat`.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `info` or `debug` to control logging verbosity
//! - `PAYOUT_*`: Node and token settings, see [`token_payout::config`]

use log::{info, warn};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process;
use token_payout::{
    load_requests, BatchReport, BatchSequencer, EthTokenClient, FundingAccount, PayoutConfig,
    PayoutError, Reconciler, Result, SqliteLedgerStore,
};

fn main() {
    env_logger::init();

    match run() {
        Ok(report) => {
            let summary = report.summary();
            eprintln!(
                "sent {}, resent {}, skipped {}, failed {} (remaining balance {})",
                summary.sent, summary.resent, summary.skipped, summary.failed, report.final_balance
            );
            if let Some(abort) = report.abort {
                eprintln!("Error: {}", abort);
                process::exit(1);
            }
            eprintln!("Done!");
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run() -> Result<BatchReport> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        return Err(PayoutError::MissingArgument);
    }

    let input_path = Path::new(&args[1]);
    let requests = load_requests(BufReader::new(File::open(input_path)?))?;

    let config = PayoutConfig::from_env()?;
    let remote = EthTokenClient::new(&config)?;
    let from = find_funding_account(&remote, &args[2])?;

    match remote.token_symbol() {
        Ok(symbol) => info!("Operating on token '{}'", symbol),
        Err(e) => warn!("Could not read token symbol: {}", e),
    }
    info!("Using from account of {}", from);

    let funding = FundingAccount::load(&remote, from)?;
    let store = SqliteLedgerStore::open(ledger_path(input_path))?;

    let report = BatchSequencer::new(Reconciler::new(&remote, store, funding)).run(&requests);

    let stdout = io::stdout();
    report.write_csv(stdout.lock())?;

    Ok(report)
}

/// Matches the requested account against the node's accounts, ignoring case.
fn find_funding_account(remote: &EthTokenClient, requested: &str) -> Result<String> {
    let accounts = remote.accounts()?;
    accounts
        .into_iter()
        .find(|account| account.eq_ignore_ascii_case(requested))
        .ok_or_else(|| PayoutError::UnknownFundingAccount(requested.to_string()))
}

/// `payments.csv` keeps its ledger in `payments.dat`.
fn ledger_path(input: &Path) -> PathBuf {
    input.with_extension("dat")
}
