use crate::orders::tabs::{OrderTab, OrderTabs};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Render the order tab strip, with counts once data has loaded
pub fn draw_tab_bar(frame: &mut Frame, area: Rect, selected: OrderTab, data: Option<&OrderTabs>) {
  let mut spans = Vec::new();

  for (idx, tab) in OrderTab::ALL.iter().enumerate() {
    if idx > 0 {
      spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
    }
    let style = if *tab == selected {
      Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
      Style::default().fg(Color::Gray)
    };
    let label = match data {
      Some(tabs) => format!(" {} ({}) ", tab.label(), tabs.get(*tab).len()),
      None => format!(" {} ", tab.label()),
    };
    spans.push(Span::styled(label, style));
  }

  frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
