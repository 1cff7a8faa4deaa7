use crate::orders::form::{format_order_date, Banner};
use crate::orders::tabs::{OrderTab, OrderTabs};
use crate::orders::{Order, OrderStore};
use crate::query::{Query, QueryState};
use crate::routes::Route;
use crate::ui::components::{ConfirmDialog, ConfirmEvent, KeyResult};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{draw_banner, draw_tab_bar, status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{OrderFormView, StatsView};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

const DELETE_PROMPT: &str = "Are you sure you want to delete this order?";

/// Tabbed list of orders
pub struct OrderListView {
  store: OrderStore,
  query: Query<OrderTabs>,
  delete: Option<Query<()>>,
  tab: OrderTab,
  list_state: ListState,
  confirm: ConfirmDialog<i64>,
  banner: Option<Banner>,
}

impl OrderListView {
  pub fn new(store: OrderStore, tab: OrderTab) -> Self {
    let query_store = store.clone();
    let query = Query::start(move || OrderTabs::fetch(&query_store));

    Self {
      store,
      query,
      delete: None,
      tab,
      list_state: ListState::default(),
      confirm: ConfirmDialog::new(DELETE_PROMPT),
      banner: None,
    }
  }

  fn orders(&self) -> &[Order] {
    self
      .query
      .data()
      .map(|tabs| tabs.get(self.tab))
      .unwrap_or(&[])
  }

  fn selected_order(&self) -> Option<&Order> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.orders().get(idx))
  }

  fn select_tab(&mut self, tab: OrderTab) {
    self.tab = tab;
    self.list_state.select(None);
  }

  fn start_delete(&mut self, id: i64) {
    let store = self.store.clone();
    self.delete = Some(Query::start(move || store.delete_order(id)));
    self.banner = None;
  }

  fn poll_delete(&mut self) {
    let Some(delete) = self.delete.as_mut() else {
      return;
    };
    if !delete.poll() {
      return;
    }

    match delete.state() {
      QueryState::Success(()) => {
        self.query.refetch();
      }
      QueryState::Error(e) => {
        tracing::warn!(error = %e, "failed to delete order");
        self.banner = Some(Banner::error("Failed to delete order. Please try again."));
      }
      _ => {}
    }
    self.delete = None;
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.orders().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.tab.label()),
      _ => format!(" {} ({}) ", self.tab.label(), len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.query.is_error() {
      let paragraph = Paragraph::new("Failed to load orders. Please try again.")
        .block(block)
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, area);
      return;
    }

    if len == 0 {
      let content = if self.query.is_loading() {
        "Loading orders..."
      } else {
        "No orders found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .orders()
      .iter()
      .map(|order| {
        let line = Line::from(vec![
          Span::styled(
            format!("#{:<5}", order.id.unwrap_or_default()),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(
            format!("{:<20}", truncate(&order.buyer_name, 20)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", order.status.label()),
            Style::default().fg(status_color(order.status)),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<17}", format_order_date(order.order_date))),
          Span::raw(" "),
          Span::raw(format!("{:<30}", truncate(&order.products, 30))),
          Span::raw(" "),
          Span::styled(
            format!(
              "{} / {}",
              truncate(&order.platform, 15),
              truncate(&order.courier, 15)
            ),
            Style::default().fg(Color::Gray),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for OrderListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    // Confirmation overlay captures everything while open
    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(id)) => {
        self.start_delete(id);
        return ViewAction::None;
      }
      KeyResult::Event(ConfirmEvent::Cancelled) | KeyResult::Handled => {
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
        self.select_tab(self.tab.next());
      }
      KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
        self.select_tab(self.tab.previous());
      }
      KeyCode::Char(c @ '1'..='4') => {
        let idx = c as usize - '1' as usize;
        self.select_tab(OrderTab::ALL[idx]);
      }
      KeyCode::Char('r') => {
        self.query.refetch();
      }
      KeyCode::Char('n') => {
        return ViewAction::Push(Box::new(OrderFormView::create(self.store.clone())));
      }
      KeyCode::Enter | KeyCode::Char('e') => {
        if let Some(id) = self.selected_order().and_then(|o| o.id) {
          return ViewAction::Push(Box::new(OrderFormView::edit(self.store.clone(), id)));
        }
      }
      KeyCode::Char('d') | KeyCode::Delete => {
        if let Some(id) = self.selected_order().and_then(|o| o.id) {
          self.confirm.show(id);
        }
      }
      KeyCode::Char('s') => {
        return ViewAction::Push(Box::new(StatsView::new(self.store.clone())));
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Tabs
        Constraint::Length(1), // Banner
        Constraint::Min(1),    // List
      ])
      .split(area);

    draw_tab_bar(frame, chunks[0], self.tab, self.query.data());
    if let Some(banner) = &self.banner {
      draw_banner(frame, chunks[1], banner);
    }
    self.render_list(frame, chunks[2]);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Orders [{}]", self.tab.label())
  }

  fn route(&self) -> Route {
    Route::OrderList
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.is_stale() {
      self.query.refetch();
    }
    self.query.poll();
    self.poll_delete();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("n", "new").with_priority(20),
      ShortcutInfo::new("e", "edit").with_priority(21),
      ShortcutInfo::new("d", "delete").with_priority(22),
      ShortcutInfo::new("tab", "next tab").with_priority(25),
      ShortcutInfo::new("s", "stats").with_priority(26),
      ShortcutInfo::new("q", "quit").with_priority(30),
    ]
  }
}
