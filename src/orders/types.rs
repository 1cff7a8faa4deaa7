use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  #[default]
  Pending,
  Completed,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 3] = [
    OrderStatus::Pending,
    OrderStatus::Completed,
    OrderStatus::Cancelled,
  ];

  /// Value stored in the database
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Completed => "completed",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  /// Capitalized label for display
  pub fn label(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "Pending",
      OrderStatus::Completed => "Completed",
      OrderStatus::Cancelled => "Cancelled",
    }
  }

  /// Next status in the fixed cycle, used by the form picker
  pub fn next(&self) -> Self {
    match self {
      OrderStatus::Pending => OrderStatus::Completed,
      OrderStatus::Completed => OrderStatus::Cancelled,
      OrderStatus::Cancelled => OrderStatus::Pending,
    }
  }

  pub fn previous(&self) -> Self {
    match self {
      OrderStatus::Pending => OrderStatus::Cancelled,
      OrderStatus::Completed => OrderStatus::Pending,
      OrderStatus::Cancelled => OrderStatus::Completed,
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "pending" => Ok(OrderStatus::Pending),
      "completed" => Ok(OrderStatus::Completed),
      "cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(format!("unknown order status '{}'", other)),
    }
  }
}

/// A persisted shop order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Option<i64>,
  pub order_date: DateTime<Utc>,
  pub products: String,
  pub buyer_name: String,
  pub platform: String,
  pub courier: String,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Order data supplied on creation (the store assigns id and timestamps)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
  pub order_date: DateTime<Utc>,
  pub products: String,
  pub buyer_name: String,
  pub platform: String,
  pub courier: String,
  pub status: OrderStatus,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
  pub order_date: Option<DateTime<Utc>>,
  pub products: Option<String>,
  pub buyer_name: Option<String>,
  pub platform: Option<String>,
  pub courier: Option<String>,
  pub status: Option<OrderStatus>,
}

impl OrderPatch {
  /// Patch that replaces every mutable field
  pub fn replace_all(order: NewOrder) -> Self {
    Self {
      order_date: Some(order.order_date),
      products: Some(order.products),
      buyer_name: Some(order.buyer_name),
      platform: Some(order.platform),
      courier: Some(order.courier),
      status: Some(order.status),
    }
  }

  /// Apply the patch to an existing order in place
  pub fn apply(self, order: &mut Order) {
    if let Some(order_date) = self.order_date {
      order.order_date = order_date;
    }
    if let Some(products) = self.products {
      order.products = products;
    }
    if let Some(buyer_name) = self.buyer_name {
      order.buyer_name = buyer_name;
    }
    if let Some(platform) = self.platform {
      order.platform = platform;
    }
    if let Some(courier) = self.courier {
      order.courier = courier;
    }
    if let Some(status) = self.status {
      order.status = status;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_round_trips_through_str() {
    for status in OrderStatus::ALL {
      assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
    }
    assert!("shipped".parse::<OrderStatus>().is_err());
  }

  #[test]
  fn test_status_default_is_pending() {
    assert_eq!(OrderStatus::default(), OrderStatus::Pending);
  }

  #[test]
  fn test_status_cycle() {
    let mut status = OrderStatus::Pending;
    for _ in 0..3 {
      status = status.next();
    }
    assert_eq!(status, OrderStatus::Pending);
    assert_eq!(OrderStatus::Pending.previous(), OrderStatus::Cancelled);
  }

  #[test]
  fn test_patch_only_touches_given_fields() {
    let now = Utc::now();
    let mut order = Order {
      id: Some(1),
      order_date: now,
      products: "Widget".to_string(),
      buyer_name: "Alice".to_string(),
      platform: "Shopee".to_string(),
      courier: "JNE".to_string(),
      status: OrderStatus::Pending,
      created_at: now,
      updated_at: now,
    };

    OrderPatch {
      courier: Some("SiCepat".to_string()),
      status: Some(OrderStatus::Completed),
      ..Default::default()
    }
    .apply(&mut order);

    assert_eq!(order.courier, "SiCepat");
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.buyer_name, "Alice");
    assert_eq!(order.products, "Widget");
  }
}
