// ABOUTME: Key-value storage collaborator backing the identity store
// ABOUTME: SQLite implementation for production plus an in-memory store for tests

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Database file created inside the store directory
pub const DB_FILE_NAME: &str = "chat_users.db";

/// A single write in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, value: Vec<u8> },
    Remove { key: String },
}

/// Minimal get/put store. There is no native key enumeration.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value (upserts)
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a key. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Apply a batch of writes. Stores that support transactions override
    /// this so the batch lands all-or-nothing.
    fn apply(&self, batch: Vec<WriteOp>) -> Result<()> {
        for op in batch {
            match op {
                WriteOp::Put { key, value } => self.put(&key, &value)?,
                WriteOp::Remove { key } => self.remove(&key)?,
            }
        }
        Ok(())
    }
}

// =============================================================================
// SQLite
// =============================================================================

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the store under `store_dir`
    pub fn open<P: AsRef<Path>>(store_dir: P) -> Result<Self> {
        let store_dir = store_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&store_dir).with_context(|| {
            format!("Failed to create store directory: {}", store_dir.display())
        })?;

        let db_path = store_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path).context("Failed to open SQLite database")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )?;

        tracing::debug!(db = %db_path.display(), "SqliteStore opened");

        Ok(SqliteStore {
            db: Arc::new(Mutex::new(conn)),
            path: db_path,
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let db = self.lock()?;
        let mut stmt = db.prepare("SELECT value FROM records WHERE key = ?1")?;
        let value = stmt.query_row(params![key], |row| row.get::<_, Vec<u8>>(0));

        match value {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let db = self.lock()?;
        db.execute(
            "INSERT INTO records (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let db = self.lock()?;
        db.execute("DELETE FROM records WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn apply(&self, batch: Vec<WriteOp>) -> Result<()> {
        let mut db = self.lock()?;
        let tx = db.transaction().context("Failed to begin transaction")?;
        for op in &batch {
            match op {
                WriteOp::Put { key, value } => {
                    tx.execute(
                        "INSERT INTO records (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = ?2",
                        params![key, value],
                    )
                    .with_context(|| format!("Failed to write record {}", key))?;
                }
                WriteOp::Remove { key } => {
                    tx.execute("DELETE FROM records WHERE key = ?1", params![key])
                        .with_context(|| format!("Failed to delete record {}", key))?;
                }
            }
        }
        tx.commit().context("Failed to commit batch")?;
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// In-memory store. Can be told to fail writes to exercise error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write return an error
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }

    /// Snapshot of every stored key
    pub fn keys(&self) -> Vec<String> {
        self.records
            .lock()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_writable(&self) -> Result<()> {
        let failing = self
            .fail_writes
            .lock()
            .map_err(|e| anyhow::anyhow!("Store mutex poisoned: {}", e))?;
        if *failing {
            anyhow::bail!("store is read-only");
        }
        Ok(())
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.records
            .lock()
            .map_err(|e| anyhow::anyhow!("Store mutex poisoned: {}", e))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.records()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check_writable()?;
        self.records()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.records()?.remove(key);
        Ok(())
    }

    fn apply(&self, batch: Vec<WriteOp>) -> Result<()> {
        self.check_writable()?;
        let mut records = self.records()?;
        for op in batch {
            match op {
                WriteOp::Put { key, value } => {
                    records.insert(key, value);
                }
                WriteOp::Remove { key } => {
                    records.remove(&key);
                }
            }
        }
        Ok(())
    }
}
