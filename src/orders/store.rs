//! SQLite-backed order store.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

use super::types::{NewOrder, Order, OrderPatch, OrderStatus};
use crate::db::Database;

/// Errors from order persistence
#[derive(Error, Debug)]
pub enum StoreError {
  /// The referenced order does not exist
  #[error("order {0} not found")]
  NotFound(i64),

  /// The underlying SQLite operation failed
  #[error("storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  /// The connection can no longer be used
  #[error("storage unavailable: {0}")]
  Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

const SELECT_ORDER: &str = "SELECT id, order_date, products, buyer_name, platform, courier, status, created_at, updated_at FROM orders";

/// Handle to the order collection.
///
/// Cloning is cheap; all clones share one connection and every call is
/// serialized through its lock.
#[derive(Clone)]
pub struct OrderStore {
  conn: Arc<Mutex<Connection>>,
}

impl OrderStore {
  pub fn new(db: Database) -> Self {
    Self {
      conn: Arc::new(Mutex::new(db.into_connection())),
    }
  }

  fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
  }

  /// All orders, ascending by id
  pub fn get_all_orders(&self) -> StoreResult<Vec<Order>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_ORDER))?;
    let orders = stmt
      .query_map([], order_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(orders)
  }

  /// Orders whose order date lies strictly in the future
  pub fn get_upcoming_orders(&self) -> StoreResult<Vec<Order>> {
    self.get_upcoming_orders_at(Utc::now())
  }

  /// Orders whose order date is strictly after `now`
  pub fn get_upcoming_orders_at(&self, now: DateTime<Utc>) -> StoreResult<Vec<Order>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare(&format!(
      "{} WHERE order_date > ? ORDER BY order_date",
      SELECT_ORDER
    ))?;
    let orders = stmt
      .query_map(params![timestamp(now)?], order_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(orders)
  }

  pub fn get_orders_by_status(&self, status: OrderStatus) -> StoreResult<Vec<Order>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare(&format!("{} WHERE status = ? ORDER BY id", SELECT_ORDER))?;
    let orders = stmt
      .query_map(params![status.as_str()], order_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(orders)
  }

  pub fn get_order(&self, id: i64) -> StoreResult<Option<Order>> {
    let conn = self.lock()?;
    let order = conn
      .query_row(
        &format!("{} WHERE id = ?", SELECT_ORDER),
        params![id],
        order_from_row,
      )
      .optional()?;
    Ok(order)
  }

  /// Insert a new order and return its freshly assigned id
  pub fn add_order(&self, order: NewOrder) -> StoreResult<i64> {
    let now = timestamp(Utc::now())?;
    let order_date = timestamp(order.order_date)?;
    let conn = self.lock()?;
    conn.execute(
      "INSERT INTO orders (order_date, products, buyer_name, platform, courier, status, created_at, updated_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
      params![
        order_date,
        order.products,
        order.buyer_name,
        order.platform,
        order.courier,
        order.status.as_str(),
        now,
        now
      ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, buyer = %order.buyer_name, "added order");
    Ok(id)
  }

  /// Merge `patch` into order `id` and refresh its `updated_at`
  pub fn update_order(&self, id: i64, patch: OrderPatch) -> StoreResult<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;

    let mut order = tx
      .query_row(
        &format!("{} WHERE id = ?", SELECT_ORDER),
        params![id],
        order_from_row,
      )
      .optional()?
      .ok_or(StoreError::NotFound(id))?;

    patch.apply(&mut order);
    // Never move backwards, even if the wall clock does
    let updated_at = Utc::now().max(order.updated_at);

    tx.execute(
      "UPDATE orders SET order_date = ?, products = ?, buyer_name = ?, platform = ?, courier = ?, status = ?, updated_at = ?
       WHERE id = ?",
      params![
        timestamp(order.order_date)?,
        order.products,
        order.buyer_name,
        order.platform,
        order.courier,
        order.status.as_str(),
        timestamp(updated_at)?,
        id
      ],
    )?;
    tx.commit()?;

    info!(id, "updated order");
    Ok(())
  }

  /// Remove order `id`; removing a missing order is not an error
  pub fn delete_order(&self, id: i64) -> StoreResult<()> {
    let conn = self.lock()?;
    let removed = conn.execute("DELETE FROM orders WHERE id = ?", params![id])?;
    debug!(id, removed, "deleted order");
    Ok(())
  }
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
  let status: String = row.get(6)?;
  let status = status.parse::<OrderStatus>().map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into())
  })?;

  Ok(Order {
    id: Some(row.get(0)?),
    order_date: datetime_column(row, 1)?,
    products: row.get(2)?,
    buyer_name: row.get(3)?,
    platform: row.get(4)?,
    courier: row.get(5)?,
    status,
    created_at: datetime_column(row, 7)?,
    updated_at: datetime_column(row, 8)?,
  })
}

/// Unix nanoseconds, the unit every timestamp column is stored in
fn timestamp(value: DateTime<Utc>) -> rusqlite::Result<i64> {
  value.timestamp_nanos_opt().ok_or_else(|| {
    rusqlite::Error::ToSqlConversionFailure(
      format!("timestamp {} out of range", value).into(),
    )
  })
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  let nanos: i64 = row.get(idx)?;
  Ok(DateTime::from_timestamp_nanos(nanos))
}
