use dashmap::DashMap;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("Database creation error: {0}")]
    RedbCreate(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
}

/// Durable key-value store backing the ledger snapshot.
///
/// `put` must be durable when it returns.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StateError>;
}

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// redb-backed store. Every `put` is its own committed write transaction.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path.as_ref())?;

        // Create the table up front so read transactions never miss it.
        let write_txn = db.begin_write()?;
        {
            let _kv = write_txn.open_table(KV)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StateError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs. Counts writes so callers can assert flush behavior.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StateError> {
        self.entries.insert(key.to_string(), value.to_vec());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_redb_store_roundtrip_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");

        {
            let store = RedbStore::open(&path).unwrap();
            assert!(store.get("ledger").unwrap().is_none());
            store.put("ledger", b"{\"a\":1}").unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("ledger").unwrap().as_deref(), Some(&b"{\"a\":1}"[..]));
        assert!(store.get("other").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_counts_puts() {
        let store = MemoryStore::new();
        store.put("k", b"1").unwrap();
        store.put("k", b"2").unwrap();
        assert_eq!(store.put_count(), 2);
        assert_eq!(store.get("k").unwrap(), Some(b"2".to_vec()));
    }
}
