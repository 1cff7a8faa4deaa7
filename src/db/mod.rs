pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Order database connection wrapper
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at `path`, running migrations
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;
    debug!(path = %path.display(), "opened order database");

    let db = Self { conn };
    db.run_migrations()?;

    Ok(db)
  }

  /// Open a private in-memory database (tests and dry runs)
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    let db = Self { conn };
    db.run_migrations()?;
    Ok(db)
  }

  /// Get the default database path
  pub fn default_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("orders.db"))
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    let version: i32 = self
      .conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to read schema version: {}", e))?;

    if version > schema::SCHEMA_VERSION {
      return Err(eyre!(
        "Database schema version {} is newer than supported version {}",
        version,
        schema::SCHEMA_VERSION
      ));
    }

    let migrations = [(1, schema::SCHEMA_V1), (2, schema::SCHEMA_V2)];
    for (target, sql) in migrations {
      if version >= target {
        continue;
      }
      let tx = self
        .conn
        .unchecked_transaction()
        .map_err(|e| eyre!("Failed to start migration: {}", e))?;
      tx.execute_batch(sql)
        .map_err(|e| eyre!("Failed to run migration {}: {}", target, e))?;
      tx.pragma_update(None, "user_version", target)
        .map_err(|e| eyre!("Failed to record schema version: {}", e))?;
      tx.commit()
        .map_err(|e| eyre!("Failed to commit migration {}: {}", target, e))?;
      info!(version = target, "migrated order database");
    }

    Ok(())
  }

  /// Hand the connection over to a store
  pub fn into_connection(self) -> Connection {
    self.conn
  }
}

/// Application data directory ($XDG_DATA_HOME/shop-order-tracker)
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("shop-order-tracker"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_migrations_set_user_version() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.into_connection();
    let version: i32 = conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .unwrap();
    assert_eq!(version, schema::SCHEMA_VERSION);
  }

  #[test]
  fn test_reopen_existing_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("orders.db");

    drop(Database::open(&path).unwrap());
    let db = Database::open(&path).unwrap();

    let conn = db.into_connection();
    let indexes: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'orders' AND name LIKE 'idx_orders_%'",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(indexes, 5);
  }

  #[test]
  fn test_millisecond_timestamps_are_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.db");
    {
      let conn = Connection::open(&path).unwrap();
      conn.execute_batch(schema::SCHEMA_V1).unwrap();
      conn.pragma_update(None, "user_version", 1).unwrap();
      conn
        .execute(
          "INSERT INTO orders (order_date, products, buyer_name, platform, courier, created_at, updated_at)
           VALUES (1700000000123, 'Widget', 'Alice', 'Shopee', 'JNE', 1700000000000, 1700000000000)",
          [],
        )
        .unwrap();
    }

    let conn = Database::open(&path).unwrap().into_connection();
    let order_date: i64 = conn
      .query_row("SELECT order_date FROM orders", [], |row| row.get(0))
      .unwrap();
    assert_eq!(order_date, 1_700_000_000_123_000_000);
  }

  #[test]
  fn test_newer_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.db");
    {
      let conn = Connection::open(&path).unwrap();
      conn.pragma_update(None, "user_version", 7).unwrap();
    }
    assert!(Database::open(&path).is_err());
  }
}
