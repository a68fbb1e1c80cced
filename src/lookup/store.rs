//! Candidate list storage for the identifier lookup

use super::LookupUsage;
use crate::storage::codec::{decode, encode};
use crate::storage::{OpenStore, StorageError, StorageResult};
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Candidate lists keyed by normalized canonical name
pub trait LookupStore: Send + Sync {
    fn get(&self, name: &str) -> StorageResult<Option<Vec<LookupUsage>>>;

    /// Replaces the candidate list of a name.
    fn put(&self, name: &str, usages: &[LookupUsage]) -> StorageResult<()>;

    /// All candidate lists
    fn values(&self) -> StorageResult<Vec<Vec<LookupUsage>>>;

    /// Number of distinct names
    fn names(&self) -> StorageResult<usize>;
}

/// Memory resident lookup, gone with the process
#[derive(Debug, Default)]
pub struct MemoryLookupStore {
    usages: DashMap<String, Vec<LookupUsage>>,
}

impl MemoryLookupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LookupStore for MemoryLookupStore {
    fn get(&self, name: &str) -> StorageResult<Option<Vec<LookupUsage>>> {
        Ok(self.usages.get(name).map(|r| r.clone()))
    }

    fn put(&self, name: &str, usages: &[LookupUsage]) -> StorageResult<()> {
        self.usages.insert(name.to_string(), usages.to_vec());
        Ok(())
    }

    fn values(&self) -> StorageResult<Vec<Vec<LookupUsage>>> {
        Ok(self.usages.iter().map(|e| e.value().clone()).collect())
    }

    fn names(&self) -> StorageResult<usize> {
        Ok(self.usages.len())
    }
}

/// Disk lookup kept between backbone rebuilds
pub struct SqliteLookupStore {
    conn: Mutex<Connection>,
}

impl SqliteLookupStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS lookup (
                name TEXT PRIMARY KEY,
                usages BLOB NOT NULL
            ) WITHOUT ROWID;

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl OpenStore for SqliteLookupStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl LookupStore for SqliteLookupStore {
    fn get(&self, name: &str) -> StorageResult<Option<Vec<LookupUsage>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT usages FROM lookup WHERE name = ?1")?;
        let data: Option<Vec<u8>> = stmt.query_row(params![name], |row| row.get(0)).optional()?;
        match data {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, name: &str, usages: &[LookupUsage]) -> StorageResult<()> {
        let bytes = encode(&usages)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO lookup (name, usages) VALUES (?1, ?2)",
            params![name, bytes],
        )?;
        Ok(())
    }

    fn values(&self) -> StorageResult<Vec<Vec<LookupUsage>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT usages FROM lookup ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(decode(&row?)?);
        }
        Ok(values)
    }

    fn names(&self) -> StorageResult<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM lookup", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
