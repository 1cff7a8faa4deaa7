mod order_form;
mod order_list;
mod stats;

pub use order_form::OrderFormView;
pub use order_list::OrderListView;
pub use stats::StatsView;
