//! Persistence module for the ban ledger
//!
//! The ledger remembers every IP that has been admitted for a permanent
//! ban, so that later runs never admit the same IP twice.

pub mod sqlite_store;

pub use sqlite_store::SqliteLedger;

use crate::models::{BanRecord, LedgerEntry};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),
}

/// Trait for ledger backends
///
/// Uniqueness of `ip` is an application-level rule: backends check before
/// they insert, they do not rely on a storage constraint.
pub trait LedgerStore {
    /// Whether a row for this IP already exists
    fn contains_ip(&self, ip: &Ipv4Addr) -> Result<bool, PersistenceError>;

    /// Append a row and return its id
    fn insert(&self, record: &BanRecord) -> Result<i64, PersistenceError>;

    /// All rows in insertion order
    fn entries(&self) -> Result<Vec<LedgerEntry>, PersistenceError>;

    /// Insert every candidate whose IP is not yet known
    ///
    /// Candidates are handled in order, so when one batch holds the same IP
    /// twice only the first occurrence is admitted. Returns the admitted
    /// records.
    fn admit_new(&self, candidates: &[BanRecord]) -> Result<Vec<BanRecord>, PersistenceError> {
        let mut admitted = Vec::new();
        for candidate in candidates {
            if !self.contains_ip(&candidate.ip)? {
                self.insert(candidate)?;
                admitted.push(candidate.clone());
            }
        }
        Ok(admitted)
    }

    /// Number of rows
    fn len(&self) -> Result<usize, PersistenceError> {
        Ok(self.entries()?.len())
    }

    fn is_empty(&self) -> Result<bool, PersistenceError> {
        Ok(self.len()? == 0)
    }
}
