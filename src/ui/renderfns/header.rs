use crate::routes::Route;
use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, current route, and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  database: &str,
  route: Route,
  shortcuts: &[ShortcutInfo],
) {
  let mut spans = vec![
    Span::styled(" shop-order-tracker ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", file_name(database)),
      Style::default().fg(Color::White),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", route),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::raw("  "),
  ];

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);

  // Shortcuts - keys and brackets highlighted, descriptions dimmed
  for (i, shortcut) in shortcuts.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("   "));
    }
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Last path component of the database location
fn file_name(path: &str) -> &str {
  path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_file_name() {
    assert_eq!(
      file_name("/home/me/.local/share/shop-order-tracker/orders.db"),
      "orders.db"
    );
    assert_eq!(file_name("C:\\data\\orders.db"), "orders.db");
    assert_eq!(file_name("orders.db"), "orders.db");
  }
}
