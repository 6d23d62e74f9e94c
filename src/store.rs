//! Local payment ledger.
//!
//! A durable map from recipient address to the latest transfer attempt for
//! that address. Only the latest attempt matters for reconciliation, so a
//! write for an existing address replaces the previous record.

use crate::amount::Amount;
use crate::error::StoreError;
use crate::remote::TransferHandle;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The stored trace of a submitted transfer.
///
/// Serialized as `{"address":…,"amnt":…,"hash":…}`, the layout existing
/// payout databases already use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Recipient address
    pub address: String,

    /// Amount submitted in the recorded attempt
    #[serde(rename = "amnt")]
    pub amount: Amount,

    /// Handle returned by the remote ledger for the attempt
    #[serde(rename = "hash")]
    pub transfer: TransferHandle,
}

/// Read/write primitives over the local ledger. No business logic.
pub trait LedgerStore {
    /// Point lookup by recipient address.
    fn get(&self, address: &str) -> Result<Option<LedgerRecord>, StoreError>;

    /// Durable upsert. Must not return `Ok` before the record is committed.
    fn put(&mut self, address: &str, record: &LedgerRecord) -> Result<(), StoreError>;
}

impl<S: LedgerStore + ?Sized> LedgerStore for &mut S {
    fn get(&self, address: &str) -> Result<Option<LedgerRecord>, StoreError> {
        (**self).get(address)
    }

    fn put(&mut self, address: &str, record: &LedgerRecord) -> Result<(), StoreError> {
        (**self).put(address, record)
    }
}

/// Addresses are hex, so two spellings differing only in case are the same
/// recipient and must share one record.
fn ledger_key(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// In-memory ledger, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    records: HashMap<String, LedgerRecord>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get(&self, address: &str) -> Result<Option<LedgerRecord>, StoreError> {
        Ok(self.records.get(&ledger_key(address)).cloned())
    }

    fn put(&mut self, address: &str, record: &LedgerRecord) -> Result<(), StoreError> {
        self.records.insert(ledger_key(address), record.clone());
        Ok(())
    }
}

/// SQLite-backed ledger, one row per recipient address.
///
/// Every `put` runs in its own autocommit statement with `synchronous=FULL`,
/// so a returned `Ok` means the record survives a crash.
pub struct SqliteLedgerStore {
    conn: Connection,
}

impl SqliteLedgerStore {
    /// Opens (creating if needed) the ledger database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Self::init(conn)
    }

    /// Opens a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS payments (
                address TEXT PRIMARY KEY NOT NULL,
                record  TEXT NOT NULL
            );",
        )?;
        Ok(SqliteLedgerStore { conn })
    }

    /// Number of recorded addresses.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn get(&self, address: &str) -> Result<Option<LedgerRecord>, StoreError> {
        let key = ledger_key(address);
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT record FROM payments WHERE address = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| {
            serde_json::from_str::<LedgerRecord>(&json).map_err(|source| StoreError::Corrupt {
                address: key.clone(),
                source,
            })
        })
        .transpose()
    }

    fn put(&mut self, address: &str, record: &LedgerRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO payments (address, record) VALUES (?1, ?2)
             ON CONFLICT(address) DO UPDATE SET record = excluded.record",
            params![ledger_key(address), json],
        )?;
        Ok(())
    }
}
