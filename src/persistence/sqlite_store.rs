//! SQLite implementation of the LedgerStore trait

use super::{LedgerStore, PersistenceError};
use crate::models::{BanRecord, LedgerEntry};
use rusqlite::{params, Connection};
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

/// SQLite-based ledger
///
/// Rows live in the `ips` table. The table carries no unique constraint on
/// `ip`; two processes running at the same time can both decide an IP is new.
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Open the ledger at the specified path
    ///
    /// Creates the database file and the `ips` table if they don't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        let ledger = SqliteLedger { conn };
        ledger.initialize_schema()?;
        Ok(ledger)
    }

    /// Create an in-memory ledger (useful for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let ledger = SqliteLedger { conn };
        ledger.initialize_schema()?;
        Ok(ledger)
    }

    fn initialize_schema(&self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Helper to parse IP address from database string
    fn parse_ip(ip_str: &str) -> Result<Ipv4Addr, PersistenceError> {
        Ipv4Addr::from_str(ip_str)
            .map_err(|_| PersistenceError::InvalidData(format!("Invalid IP address: {}", ip_str)))
    }

    fn contains_in(conn: &Connection, ip: &Ipv4Addr) -> Result<bool, PersistenceError> {
        let mut stmt = conn.prepare("SELECT id FROM ips WHERE ip = ?")?;
        let result = stmt.query_row(params![ip.to_string()], |row| row.get::<_, i64>(0));

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_in(conn: &Connection, record: &BanRecord) -> Result<i64, PersistenceError> {
        conn.execute(
            "INSERT INTO ips (ip, attack_type, quantity) VALUES (?, ?, ?)",
            params![
                record.ip.to_string(),
                record.attack_type,
                record.occurrence_count
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl LedgerStore for SqliteLedger {
    fn contains_ip(&self, ip: &Ipv4Addr) -> Result<bool, PersistenceError> {
        Self::contains_in(&self.conn, ip)
    }

    fn insert(&self, record: &BanRecord) -> Result<i64, PersistenceError> {
        Self::insert_in(&self.conn, record)
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, ip, attack_type, quantity FROM ips ORDER BY id")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, ip, attack_type, quantity)| {
                Ok(LedgerEntry {
                    id,
                    ip: Self::parse_ip(&ip)?,
                    attack_type,
                    quantity,
                })
            })
            .collect()
    }

    /// Same as the default, inside one transaction
    fn admit_new(&self, candidates: &[BanRecord]) -> Result<Vec<BanRecord>, PersistenceError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut admitted = Vec::new();

        for candidate in candidates {
            if !Self::contains_in(&tx, &candidate.ip)? {
                Self::insert_in(&tx, candidate)?;
                admitted.push(candidate.clone());
            }
        }

        tx.commit()?;
        Ok(admitted)
    }

    fn len(&self) -> Result<usize, PersistenceError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ips", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_ledger() -> SqliteLedger {
        SqliteLedger::in_memory().expect("Failed to create in-memory ledger")
    }

    fn record(ip: &str, attack_type: &str, count: i64) -> BanRecord {
        BanRecord::new(ip.parse().unwrap(), attack_type, count)
    }

    #[test]
    fn test_insert_and_contains() {
        let ledger = create_test_ledger();
        let ip: Ipv4Addr = "10.0.0.5".parse().unwrap();

        assert!(!ledger.contains_ip(&ip).unwrap());
        assert!(ledger.is_empty().unwrap());

        let id = ledger.insert(&record("10.0.0.5", "sshd", 15)).unwrap();
        assert!(id > 0);
        assert!(ledger.contains_ip(&ip).unwrap());

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].ip, ip);
        assert_eq!(entries[0].attack_type, "sshd");
        assert_eq!(entries[0].quantity, 15);
    }

    #[test]
    fn test_contains_is_exact_match() {
        let ledger = create_test_ledger();
        ledger.insert(&record("10.0.0.55", "sshd", 11)).unwrap();

        assert!(!ledger.contains_ip(&"10.0.0.5".parse().unwrap()).unwrap());
    }

    #[test]
    fn test_admit_new_skips_known_ips() {
        let ledger = create_test_ledger();
        ledger.insert(&record("10.0.0.5", "sshd", 15)).unwrap();

        let admitted = ledger
            .admit_new(&[record("10.0.0.5", "sshd", 40), record("10.0.0.7", "nginx", 12)])
            .unwrap();

        assert_eq!(admitted, vec![record("10.0.0.7", "nginx", 12)]);
        assert_eq!(ledger.len().unwrap(), 2);

        // Quantity recorded at admission is never updated
        let entries = ledger.entries().unwrap();
        assert_eq!(entries[0].quantity, 15);
    }

    #[test]
    fn test_admit_new_keeps_first_of_duplicates_in_batch() {
        let ledger = create_test_ledger();

        let admitted = ledger
            .admit_new(&[record("10.0.0.5", "sshd", 20), record("10.0.0.5", "nginx", 12)])
            .unwrap();

        assert_eq!(admitted.len(), 1);
        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attack_type, "sshd");
    }

    #[test]
    fn test_entries_in_insertion_order() {
        let ledger = create_test_ledger();
        ledger.insert(&record("10.0.0.9", "sshd", 11)).unwrap();
        ledger.insert(&record("10.0.0.1", "sshd", 30)).unwrap();

        let ips: Vec<String> = ledger
            .entries()
            .unwrap()
            .iter()
            .map(|e| e.ip.to_string())
            .collect();
        assert_eq!(ips, vec!["10.0.0.9", "10.0.0.1"]);
    }

    #[test]
    fn test_persists_across_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");

        {
            let ledger = SqliteLedger::new(&path).unwrap();
            ledger.insert(&record("10.0.0.5", "sshd", 15)).unwrap();
        }

        let reopened = SqliteLedger::new(&path).unwrap();
        assert!(reopened.contains_ip(&"10.0.0.5".parse().unwrap()).unwrap());
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_runs_can_duplicate_an_ip() {
        // Uniqueness is checked before inserting, not enforced by the table.
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        let first = SqliteLedger::new(&path).unwrap();
        let second = SqliteLedger::new(&path).unwrap();
        let ip: Ipv4Addr = "10.0.0.5".parse().unwrap();

        assert!(!first.contains_ip(&ip).unwrap());
        assert!(!second.contains_ip(&ip).unwrap());
        first.insert(&record("10.0.0.5", "sshd", 15)).unwrap();
        second.insert(&record("10.0.0.5", "sshd", 15)).unwrap();

        let entries = first.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.ip == ip));
    }

    #[test]
    fn test_invalid_ip_in_database() {
        let ledger = create_test_ledger();
        ledger
            .conn
            .execute(
                "INSERT INTO ips (ip, attack_type, quantity) VALUES ('garbage', 'sshd', 11)",
                [],
            )
            .unwrap();

        assert!(matches!(
            ledger.entries(),
            Err(PersistenceError::InvalidData(_))
        ));
    }
}
