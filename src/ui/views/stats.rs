use crate::orders::stats::OrderStats;
use crate::orders::OrderStore;
use crate::query::{Query, QueryState};
use crate::routes::Route;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Order counts by status
pub struct StatsView {
  query: Query<OrderStats>,
}

impl StatsView {
  pub fn new(store: OrderStore) -> Self {
    let query = Query::start(move || OrderStats::fetch(&store));
    Self { query }
  }

  fn render_card(frame: &mut Frame, area: Rect, title: &str, value: String, color: Color) {
    let block = Block::default()
      .title(format!(" {} ", title))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));
    let paragraph = Paragraph::new(Line::from(Span::styled(
      value,
      Style::default().fg(color).bold(),
    )))
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(paragraph, area);
  }
}

impl View for StatsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Order Statistics ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let stats = match self.query.state() {
      QueryState::Loading => {
        let paragraph =
          Paragraph::new("Loading statistics...").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, inner);
        return;
      }
      QueryState::Error(_) => {
        let paragraph = Paragraph::new("Failed to load statistics. Please try again.")
          .style(Style::default().fg(Color::Red));
        frame.render_widget(paragraph, inner);
        return;
      }
      QueryState::Success(stats) => *stats,
    };

    if stats.total == 0 {
      let paragraph = Paragraph::new("No orders found. Start by creating some orders.")
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    }

    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(3), Constraint::Min(0)])
      .split(inner);
    let cards = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Ratio(1, 4); 4])
      .split(rows[0]);

    Self::render_card(frame, cards[0], "Total Orders", stats.total.to_string(), Color::White);
    Self::render_card(frame, cards[1], "Pending", stats.pending.to_string(), Color::Yellow);
    Self::render_card(frame, cards[2], "Completed", stats.completed.to_string(), Color::Green);
    Self::render_card(
      frame,
      cards[3],
      "Average Order Value",
      format!("${:.2}", stats.average_order_value),
      Color::Cyan,
    );
  }

  fn breadcrumb_label(&self) -> String {
    "Statistics".to_string()
  }

  fn route(&self) -> Route {
    Route::Stats
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.poll() {
      if let Some(e) = self.query.error() {
        tracing::warn!(error = %e, "failed to load statistics");
      }
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
