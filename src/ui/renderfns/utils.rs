use crate::orders::OrderStatus;
use ratatui::prelude::Color;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for an order status
pub fn status_color(status: OrderStatus) -> Color {
  match status {
    OrderStatus::Pending => Color::Yellow,
    OrderStatus::Completed => Color::Green,
    OrderStatus::Cancelled => Color::Red,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Zoë Zoë Zoë", 6), "Zoë...");
  }

  #[test]
  fn test_status_colors() {
    assert_eq!(status_color(OrderStatus::Pending), Color::Yellow);
    assert_eq!(status_color(OrderStatus::Completed), Color::Green);
    assert_eq!(status_color(OrderStatus::Cancelled), Color::Red);
  }
}
