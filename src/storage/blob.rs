//! Key-value channel for bulky per-node payloads

use super::types::{NodeId, OpenStore, StorageError, StorageResult};
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Payload kinds kept per node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Usages,
    Verbatim,
    Extensions,
    Facts,
    Nub,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Usages => "usages",
            Channel::Verbatim => "verbatim",
            Channel::Extensions => "extensions",
            Channel::Facts => "facts",
            Channel::Nub => "nub",
        }
    }
}

/// Overwriting blob storage keyed by node
pub trait BlobStore: Send + Sync {
    fn put(&self, channel: Channel, node: NodeId, bytes: &[u8]) -> StorageResult<()>;

    fn get(&self, channel: Channel, node: NodeId) -> StorageResult<Option<Vec<u8>>>;

    fn remove(&self, channel: Channel, node: NodeId) -> StorageResult<()>;

    /// Number of entries in a channel
    fn len(&self, channel: Channel) -> StorageResult<usize>;

    /// Removes all entries of all channels
    fn clear(&self) -> StorageResult<()>;

    fn begin(&self) -> StorageResult<()> {
        Ok(())
    }

    fn commit(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Ephemeral blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: DashMap<(Channel, NodeId), Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, channel: Channel, node: NodeId, bytes: &[u8]) -> StorageResult<()> {
        self.entries.insert((channel, node), bytes.to_vec());
        Ok(())
    }

    fn get(&self, channel: Channel, node: NodeId) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.get(&(channel, node)).map(|r| r.clone()))
    }

    fn remove(&self, channel: Channel, node: NodeId) -> StorageResult<()> {
        self.entries.remove(&(channel, node));
        Ok(())
    }

    fn len(&self, channel: Channel) -> StorageResult<usize> {
        Ok(self.entries.iter().filter(|e| e.key().0 == channel).count())
    }

    fn clear(&self) -> StorageResult<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Disk blob store in its own SQLite file
pub struct SqliteBlobStore {
    conn: Mutex<Connection>,
}

impl SqliteBlobStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                channel TEXT NOT NULL,
                node INTEGER NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (channel, node)
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

impl OpenStore for SqliteBlobStore {
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

impl BlobStore for SqliteBlobStore {
    fn put(&self, channel: Channel, node: NodeId, bytes: &[u8]) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO blobs (channel, node, data) VALUES (?1, ?2, ?3)",
            params![channel.as_str(), node.get(), bytes],
        )?;
        Ok(())
    }

    fn get(&self, channel: Channel, node: NodeId) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let data = conn
            .query_row(
                "SELECT data FROM blobs WHERE channel = ?1 AND node = ?2",
                params![channel.as_str(), node.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    fn remove(&self, channel: Channel, node: NodeId) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM blobs WHERE channel = ?1 AND node = ?2",
            params![channel.as_str(), node.get()],
        )?;
        Ok(())
    }

    fn len(&self, channel: Channel) -> StorageResult<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM blobs WHERE channel = ?1",
            params![channel.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn clear(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM blobs", [])?;
        Ok(())
    }

    fn begin(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn commit(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }
}
