use crate::commands::{self, CommandTarget};
use crate::event::{Event, EventHandler};
use crate::orders::tabs::OrderTab;
use crate::orders::OrderStore;
use crate::routes::Route;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{OrderFormView, OrderListView, StatsView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

/// Main application state
pub struct App {
  store: OrderStore,

  /// Shown in the header
  database_label: String,

  /// Navigation stack - the order list is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Command palette (after pressing :)
  command: CommandInput,

  /// One-line message for the footer, cleared on the next key press
  status_message: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(store: OrderStore, database_label: String, route: Route) -> Self {
    let mut app = Self {
      store,
      database_label,
      view_stack: Vec::new(),
      command: CommandInput::new(),
      status_message: None,
      should_quit: false,
    };
    app.navigate(route);
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(100));
    info!(route = %self.current_route(), "tui started");

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }
    Ok(())
  }

  fn view_for(&self, route: Route) -> Box<dyn View> {
    let store = self.store.clone();
    match route {
      Route::OrderList => Box::new(OrderListView::new(store, OrderTab::All)),
      Route::NewOrder => Box::new(OrderFormView::create(store)),
      Route::EditOrder(id) => Box::new(OrderFormView::edit(store, id)),
      Route::Stats => Box::new(StatsView::new(store)),
    }
  }

  /// Replace the stack with the screen for `route`, keeping the order
  /// list underneath so back always lands there
  fn navigate(&mut self, route: Route) {
    debug!(%route, "navigate");
    let mut stack = vec![self.view_for(Route::OrderList)];
    if route != Route::OrderList {
      stack.push(self.view_for(route));
    }
    self.view_stack = stack;
  }

  fn tick(&mut self) {
    let action = match self.view_stack.last_mut() {
      Some(view) => view.tick(),
      None => return,
    };
    self.apply_action(action);
  }

  fn handle_key(&mut self, key: KeyEvent) {
    self.status_message = None;

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // `:` belongs to the view while it is taking text
    let editing = self.current_view().is_some_and(|v| v.is_editing());
    if self.command.is_active() || !editing {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => return,
    };
    self.apply_action(action);
  }

  fn execute_command(&mut self, cmd: &str) {
    match commands::resolve(cmd) {
      Some(CommandTarget::Navigate(route)) => self.navigate(route),
      Some(CommandTarget::Quit) => self.should_quit = true,
      None if cmd.is_empty() => {}
      None => self.status_message = Some(format!("Unknown command: {}", cmd)),
    }
  }

  fn apply_action(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Navigate(route) => self.navigate(route),
    }
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn current_route(&self) -> Route {
    self.current_view().map(|v| v.route()).unwrap_or_default()
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self.current_view().map(|v| v.shortcuts()).unwrap_or_default()
  }

  pub fn database_label(&self) -> &str {
    &self.database_label
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn status_message(&self) -> Option<&str> {
    self.status_message.as_deref()
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn app(route: Route) -> App {
    let store = OrderStore::new(Database::open_in_memory().unwrap());
    App::new(store, "orders.db".to_string(), route)
  }

  fn type_command(app: &mut App, cmd: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in cmd.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  #[tokio::test]
  async fn test_deep_link_keeps_list_underneath() {
    let mut app = app(Route::EditOrder(3));
    assert_eq!(app.current_route(), Route::EditOrder(3));
    assert_eq!(app.view_stack.len(), 2);

    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.current_route(), Route::OrderList);
    assert!(!app.should_quit);

    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_command_navigation() {
    let mut app = app(Route::OrderList);

    type_command(&mut app, "stats");
    assert_eq!(app.current_route(), Route::Stats);

    type_command(&mut app, "edit 12");
    assert_eq!(app.current_route(), Route::EditOrder(12));
    assert_eq!(app.breadcrumb(), vec!["Orders [All Orders]", "Edit #12"]);
  }

  #[tokio::test]
  async fn test_unknown_command_sets_status() {
    let mut app = app(Route::Stats);

    type_command(&mut app, "edit x");
    assert_eq!(app.status_message(), Some("Unknown command: edit x"));
    assert_eq!(app.current_route(), Route::Stats);

    app.handle_key(key(KeyCode::Char('r')));
    assert_eq!(app.status_message(), None);
  }

  #[tokio::test]
  async fn test_colon_goes_to_form_while_editing() {
    let mut app = app(Route::NewOrder);
    assert!(app.current_view().is_some_and(|v| v.is_editing()));

    app.handle_key(key(KeyCode::Char(':')));
    assert!(!app.command().is_active());
  }

  #[tokio::test]
  async fn test_quit_command() {
    let mut app = app(Route::OrderList);
    type_command(&mut app, "quit");
    assert!(app.should_quit);
  }
}
