pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

pub use error::{Result, StoreError};

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

const READER_POOL_SIZE: usize = 4;

/// Handle on the shared store: one writer connection plus a small pool of
/// read-only connections. Several handles (or processes) may open the same
/// file; SQLite serializes their writes.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    /// Open (creating if needed) the database at `path`.
    ///
    /// `busy_timeout` bounds how long any statement waits for a lock held by
    /// another connection before failing with [`StoreError::Transient`].
    pub fn open(path: &Path, busy_timeout: Duration) -> anyhow::Result<Self> {
        let writer = Connection::open(path)?;
        writer.busy_timeout(busy_timeout)?;

        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(busy_timeout)?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Private in-memory database. Reads go through the writer connection.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let writer = Connection::open_in_memory()?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&writer)?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        if self.readers.is_empty() {
            return self.with_conn_mut(f);
        }
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| StoreError::Internal(format!("reader lock poisoned: {e}")))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| StoreError::Internal(format!("writer lock poisoned: {e}")))?;
        f(&conn)
    }
}
