//! Versioned cache buckets persisted in SQLite.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

use reqwest::header::HeaderMap;

use super::types::{Response, ResponseKind};

#[derive(Error, Debug)]
pub enum StorageError {
  #[error("cache database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("cache storage unavailable: {0}")]
  Unavailable(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Cache schema version, tracked in `PRAGMA user_version`
const CACHE_SCHEMA_VERSION: i32 = 1;

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- complete is set once a precache for the bucket has been written in full
CREATE TABLE IF NOT EXISTS cache_buckets (
    name TEXT PRIMARY KEY,
    complete INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses, keyed by bucket and request URL
CREATE TABLE IF NOT EXISTS cache_entries (
    bucket TEXT NOT NULL,
    request_key TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (bucket, request_key)
);
"#;

/// SQLite-based storage for named cache buckets.
pub struct CacheStorage {
  conn: Mutex<Connection>,
}

impl CacheStorage {
  /// Open or create the cache database at `path`.
  pub fn open(path: &Path) -> StorageResult<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StorageError::Unavailable(format!("failed to create cache directory: {}", e))
      })?;
    }
    Self::from_connection(Connection::open(path)?)
  }

  /// Open a private in-memory cache.
  pub fn open_in_memory() -> StorageResult<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> StorageResult<Self> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < CACHE_SCHEMA_VERSION {
      // Cached responses can always be fetched again
      conn.execute_batch("DROP TABLE IF EXISTS cache_entries; DROP TABLE IF EXISTS cache_buckets;")?;
      debug!(from = version, to = CACHE_SCHEMA_VERSION, "reset cache schema");
    }
    conn.execute_batch(CACHE_SCHEMA)?;
    conn.pragma_update(None, "user_version", CACHE_SCHEMA_VERSION)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::Unavailable(format!("lock poisoned: {}", e)))
  }

  /// Names of every existing bucket.
  pub fn bucket_names(&self) -> StorageResult<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT name FROM cache_buckets ORDER BY name")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
  }

  /// Create the bucket if it does not exist yet.
  pub fn open_bucket(&self, bucket: &str) -> StorageResult<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?)",
      params![bucket],
    )?;
    Ok(())
  }

  /// Whether a full precache was written to `bucket`.
  pub fn is_complete(&self, bucket: &str) -> StorageResult<bool> {
    let conn = self.lock()?;
    let complete = conn
      .query_row(
        "SELECT complete FROM cache_buckets WHERE name = ?",
        params![bucket],
        |row| row.get::<_, bool>(0),
      )
      .optional()?;
    Ok(complete.unwrap_or(false))
  }

  /// Delete a bucket and all its entries. Returns whether it existed.
  pub fn delete_bucket(&self, bucket: &str) -> StorageResult<bool> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM cache_entries WHERE bucket = ?", params![bucket])?;
    let removed = tx.execute("DELETE FROM cache_buckets WHERE name = ?", params![bucket])?;
    tx.commit()?;
    Ok(removed > 0)
  }

  /// Look up a stored response.
  pub fn get(&self, bucket: &str, key: &str) -> StorageResult<Option<Response>> {
    let conn = self.lock()?;
    let response = conn
      .query_row(
        "SELECT status, content_type, body FROM cache_entries
         WHERE bucket = ? AND request_key = ?",
        params![bucket, key],
        |row| {
          Ok(Response {
            status: row.get(0)?,
            content_type: row.get(1)?,
            headers: HeaderMap::new(),
            body: row.get(2)?,
            kind: ResponseKind::Basic,
          })
        },
      )
      .optional()?;
    Ok(response)
  }

  /// Store or overwrite a single entry.
  pub fn put(&self, bucket: &str, key: &str, response: &Response) -> StorageResult<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    insert_entry(&tx, bucket, key, response)?;
    tx.commit()?;
    debug!(bucket, key, "cached response");
    Ok(())
  }

  /// Store every entry or none of them, then mark the bucket complete.
  pub fn put_all(&self, bucket: &str, entries: &[(String, Response)]) -> StorageResult<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    for (key, response) in entries {
      insert_entry(&tx, bucket, key, response)?;
    }
    tx.execute(
      "INSERT INTO cache_buckets (name, complete) VALUES (?, 1)
       ON CONFLICT(name) DO UPDATE SET complete = 1",
      params![bucket],
    )?;
    tx.commit()?;
    debug!(bucket, count = entries.len(), "cached entries");
    Ok(())
  }
}

fn insert_entry(
  conn: &Connection,
  bucket: &str,
  key: &str,
  response: &Response,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?)",
    params![bucket],
  )?;
  conn.execute(
    "INSERT OR REPLACE INTO cache_entries (bucket, request_key, status, content_type, body, cached_at)
     VALUES (?, ?, ?, ?, ?, datetime('now'))",
    params![
      bucket,
      key,
      response.status,
      response.content_type,
      response.body
    ],
  )?;
  Ok(())
}
