//! Funding account balance tracking for a single batch run.
//!
//! The running balance starts at the remote ledger's reported balance and is
//! decremented optimistically after each accepted submission. It is never
//! re-queried mid-batch and never persisted.

use crate::amount::Amount;
use crate::error::{PayoutError, Result};
use crate::remote::RemoteLedger;
use log::info;

/// In-memory state of the account all payments are drawn from.
#[derive(Debug, Clone)]
pub struct FundingAccount {
    /// Funding account address.
    pub address: String,

    /// Balance remaining after the submissions accepted so far.
    running_balance: Amount,
}

impl FundingAccount {
    /// Creates the state from the balance reported at batch start.
    pub fn new(address: impl Into<String>, starting_balance: Amount) -> Self {
        FundingAccount {
            address: address.into(),
            running_balance: starting_balance,
        }
    }

    /// Initializes the state from the remote ledger's reported balance.
    pub fn load<R: RemoteLedger>(remote: &R, address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let balance = remote.current_balance(&address)?;
        info!("Funding account {} starts with balance {}", address, balance);
        Ok(Self::new(address, balance))
    }

    pub fn running_balance(&self) -> Amount {
        self.running_balance
    }

    /// Fails with `InsufficientFunds` unless the running balance covers `amount`.
    pub fn ensure_covers(&self, amount: Amount) -> Result<()> {
        if self.running_balance < amount {
            return Err(PayoutError::InsufficientFunds {
                needed: amount,
                available: self.running_balance,
            });
        }
        Ok(())
    }

    /// Records an accepted submission.
    pub fn debit(&mut self, amount: Amount) {
        self.running_balance -= amount;
    }
}
