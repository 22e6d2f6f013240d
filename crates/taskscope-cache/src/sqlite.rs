//! SQLite cache backend
//!
//! One row per model in `model_classifications`:
//!
//! | column           | type                          |
//! |------------------|-------------------------------|
//! | `id`             | integer primary key           |
//! | `model_key`      | text, unique                  |
//! | `classification` | text, serialized JSON         |
//! | `created_at`     | integer, unix seconds         |
//! | `updated_at`     | integer, unix seconds         |
//!
//! rusqlite is blocking, so every call runs on the blocking pool.

use crate::ClassificationCache;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use taskscope_core::{CacheEntry, ClassificationResult, Error, Result};
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS model_classifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_key TEXT NOT NULL UNIQUE,
    classification TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);";

/// Configuration for the SQLite cache
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteCacheConfig {
    /// Database file
    pub path: PathBuf,

    /// Busy timeout in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl SqliteCacheConfig {
    /// Config for a database at `path` with default settings
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

type Row = (String, String, i64, i64);

/// Durable classification cache backed by SQLite
#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Open (or create) the database and ensure the table exists
    pub fn open(config: &SqliteCacheConfig) -> Result<Self> {
        if config.path.is_dir() {
            return Err(Error::config(format!(
                "cache path {:?} is a directory, expected a file",
                config.path
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(db_error)?;
        conn.execute_batch("PRAGMA journal_mode = wal;")
            .map_err(db_error)?;
        conn.execute_batch(SCHEMA).map_err(db_error)?;

        info!("Opened SQLite cache at {:?}", config.path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::cache(format!("sqlite task failed: {}", e)))?
    }
}

#[async_trait]
impl ClassificationCache for SqliteCache {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        let row: Option<Row> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT model_key, classification, created_at, updated_at
                     FROM model_classifications WHERE model_key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()
                .map_err(db_error)
            })
            .await?;
        row.map(entry_from_row).transpose()
    }

    async fn put(&self, key: &str, classification: &ClassificationResult) -> Result<CacheEntry> {
        let mut entry = CacheEntry::new(key, classification.clone());
        // Stored at second resolution; keep the returned entry identical to a later read
        entry.created_at = timestamp(entry.created_at.timestamp())?;
        entry.updated_at = entry.created_at;

        let serialized = serde_json::to_string(&entry.classification)?;
        let model_key = entry.model_key.clone();
        let created = entry.created_at.timestamp();
        let updated = entry.updated_at.timestamp();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO model_classifications (model_key, classification, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![model_key, serialized, created, updated],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref failure, _)
                    if failure.code == ErrorCode::ConstraintViolation =>
                {
                    Error::AlreadyExists(model_key.clone())
                }
                other => db_error(other),
            })
        })
        .await?;

        Ok(entry)
    }

    async fn list_all(&self) -> Result<Vec<CacheEntry>> {
        let rows = self
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT model_key, classification, created_at, updated_at
                         FROM model_classifications ORDER BY created_at, id",
                    )
                    .map_err(db_error)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })
                    .map_err(db_error)?
                    .collect::<rusqlite::Result<Vec<Row>>>()
                    .map_err(db_error)?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(entry_from_row).collect()
    }

    async fn list_keys(&self, after: Option<&str>, limit: usize) -> Result<Vec<String>> {
        let after = after.map(str::to_string);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT model_key FROM model_classifications
                     WHERE ?1 IS NULL OR model_key > ?1
                     ORDER BY model_key LIMIT ?2",
                )
                .map_err(db_error)?;
            let keys = stmt
                .query_map(params![after, limit], |row| row.get(0))
                .map_err(db_error)?
                .collect::<rusqlite::Result<Vec<String>>>()
                .map_err(db_error)?;
            Ok(keys)
        })
        .await
    }

    async fn evict(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "DELETE FROM model_classifications WHERE model_key = ?1",
                    params![key],
                )
                .map_err(db_error)?;
            Ok(changed > 0)
        })
        .await
    }
}

fn entry_from_row((model_key, classification, created_at, updated_at): Row) -> Result<CacheEntry> {
    let classification: ClassificationResult = serde_json::from_str(&classification)?;
    Ok(CacheEntry {
        model_key,
        classification,
        created_at: timestamp(created_at)?,
        updated_at: timestamp(updated_at)?,
    })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::cache(format!("stored timestamp {} is out of range", secs)))
}

fn db_error(err: rusqlite::Error) -> Error {
    Error::cache(err.to_string())
}
