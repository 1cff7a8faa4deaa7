use crate::orders::form::{Banner, BannerKind};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw a one-line success or error message
pub fn draw_banner(frame: &mut Frame, area: Rect, banner: &Banner) {
  let (marker, color) = match banner.kind {
    BannerKind::Success => ("✓", Color::Green),
    BannerKind::Error => ("✗", Color::Red),
  };

  let line = Line::from(vec![
    Span::styled(format!(" {} ", marker), Style::default().fg(color).bold()),
    Span::styled(banner.message.as_str(), Style::default().fg(color)),
  ]);
  frame.render_widget(Paragraph::new(line), area);
}
