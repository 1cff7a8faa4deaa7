//! Aggregate counts for the statistics view.

use super::store::{OrderStore, StoreResult};
use super::types::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrderStats {
  pub total: usize,
  pub pending: usize,
  pub completed: usize,
  /// Always zero: orders carry no price
  pub average_order_value: f64,
}

impl OrderStats {
  pub fn from_orders(orders: &[Order]) -> Self {
    let count = |status: OrderStatus| orders.iter().filter(|o| o.status == status).count();
    Self {
      total: orders.len(),
      pending: count(OrderStatus::Pending),
      completed: count(OrderStatus::Completed),
      average_order_value: 0.0,
    }
  }

  /// Fetch every order once and derive the counts
  pub fn fetch(store: &OrderStore) -> StoreResult<Self> {
    Ok(Self::from_orders(&store.get_all_orders()?))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use crate::orders::types::NewOrder;
  use chrono::Utc;

  #[test]
  fn test_counts_by_status() {
    let store = OrderStore::new(Database::open_in_memory().unwrap());
    for status in [
      OrderStatus::Pending,
      OrderStatus::Pending,
      OrderStatus::Completed,
      OrderStatus::Cancelled,
    ] {
      store
        .add_order(NewOrder {
          order_date: Utc::now(),
          products: "Widget".to_string(),
          buyer_name: "Alice".to_string(),
          platform: "Shopee".to_string(),
          courier: "JNE".to_string(),
          status,
        })
        .unwrap();
    }

    let stats = OrderStats::fetch(&store).unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.average_order_value, 0.0);
  }

  #[test]
  fn test_empty_store() {
    let stats = OrderStats::from_orders(&[]);
    assert_eq!(stats, OrderStats::default());
  }
}
