//! Order domain: types, persistence, form model and derived views.

pub mod form;
pub mod stats;
pub mod store;
pub mod tabs;
pub mod types;

pub use store::OrderStore;
pub use types::{NewOrder, Order, OrderStatus};
