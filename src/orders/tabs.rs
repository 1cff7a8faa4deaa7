//! Tabbed categorization of orders for the list view.

use super::store::{OrderStore, StoreResult};
use super::types::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderTab {
  #[default]
  All,
  Upcoming,
  Pending,
  Completed,
}

impl OrderTab {
  pub const ALL: [OrderTab; 4] = [
    OrderTab::All,
    OrderTab::Upcoming,
    OrderTab::Pending,
    OrderTab::Completed,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      OrderTab::All => "All Orders",
      OrderTab::Upcoming => "Upcoming",
      OrderTab::Pending => "Pending",
      OrderTab::Completed => "Completed",
    }
  }

  pub fn index(&self) -> usize {
    Self::ALL.iter().position(|t| t == self).unwrap_or(0)
  }

  pub fn next(&self) -> Self {
    Self::ALL[(self.index() + 1) % Self::ALL.len()]
  }

  pub fn previous(&self) -> Self {
    Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
  }
}

impl std::str::FromStr for OrderTab {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "all" => Ok(OrderTab::All),
      "upcoming" => Ok(OrderTab::Upcoming),
      "pending" => Ok(OrderTab::Pending),
      "completed" => Ok(OrderTab::Completed),
      other => Err(format!("unknown tab '{}'", other)),
    }
  }
}

/// Contents of all four tabs.
///
/// Each list comes from its own store query, so the lists can briefly
/// disagree if the data changes between queries.
#[derive(Debug, Clone, Default)]
pub struct OrderTabs {
  pub all: Vec<Order>,
  pub upcoming: Vec<Order>,
  pub pending: Vec<Order>,
  pub completed: Vec<Order>,
}

impl OrderTabs {
  pub fn fetch(store: &OrderStore) -> StoreResult<Self> {
    Ok(Self {
      all: store.get_all_orders()?,
      upcoming: store.get_upcoming_orders()?,
      pending: store.get_orders_by_status(OrderStatus::Pending)?,
      completed: store.get_orders_by_status(OrderStatus::Completed)?,
    })
  }

  pub fn get(&self, tab: OrderTab) -> &[Order] {
    match tab {
      OrderTab::All => &self.all,
      OrderTab::Upcoming => &self.upcoming,
      OrderTab::Pending => &self.pending,
      OrderTab::Completed => &self.completed,
    }
  }
}
