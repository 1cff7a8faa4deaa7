use crate::orders::form::{FormField, FormMode, FormState, OrderForm};
use crate::orders::{Order, OrderStore};
use crate::query::{Query, QueryState};
use crate::routes::Route;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::renderfns::{draw_banner, status_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use std::time::Instant;

/// Create/edit form for a single order
pub struct OrderFormView {
  store: OrderStore,
  form: OrderForm,
  load: Option<Query<Option<Order>>>,
  save: Option<Query<()>>,
  focus: usize,
  editor: TextInput,
}

impl OrderFormView {
  pub fn create(store: OrderStore) -> Self {
    let form = OrderForm::create();
    let editor = TextInput::with_value(form.data().text(FormField::ALL[0]));
    Self {
      store,
      form,
      load: None,
      save: None,
      focus: 0,
      editor,
    }
  }

  pub fn edit(store: OrderStore, id: i64) -> Self {
    let load_store = store.clone();
    let load = Query::start(move || load_store.get_order(id));

    Self {
      store,
      form: OrderForm::edit(id),
      load: Some(load),
      save: None,
      focus: 0,
      editor: TextInput::new(),
    }
  }

  fn focused(&self) -> FormField {
    FormField::ALL[self.focus]
  }

  fn move_focus(&mut self, forward: bool) {
    let len = FormField::ALL.len();
    self.focus = if forward {
      (self.focus + 1) % len
    } else {
      (self.focus + len - 1) % len
    };
    self.reset_editor();
  }

  fn reset_editor(&mut self) {
    self.editor = TextInput::with_value(self.form.data().text(self.focused()));
  }

  fn submit(&mut self) {
    let Some(request) = self.form.begin_submit() else {
      // Jump to the first invalid field
      if let Some(idx) = FormField::ALL
        .iter()
        .position(|f| self.form.error_for(*f).is_some())
      {
        self.focus = idx;
        self.reset_editor();
      }
      return;
    };

    let store = self.store.clone();
    self.save = Some(Query::start(move || request.clone().execute(&store)));
  }

  fn poll_load(&mut self) {
    let Some(load) = self.load.as_mut() else {
      return;
    };
    if !load.poll() {
      return;
    }

    let result = match load.state() {
      QueryState::Success(order) => Ok(order.clone()),
      QueryState::Error(e) => Err(e.clone()),
      _ => return,
    };
    self.form.loaded(result, Instant::now());
    self.load = None;
    self.reset_editor();
  }

  fn poll_save(&mut self) {
    let Some(save) = self.save.as_mut() else {
      return;
    };
    if !save.poll() {
      return;
    }

    let result = match save.state() {
      QueryState::Success(()) => Ok(()),
      QueryState::Error(e) => Err(e.clone()),
      _ => return,
    };
    self.form.finish_submit(result, Instant::now());
    self.save = None;
  }

  fn title(&self) -> String {
    match self.form.mode() {
      FormMode::Create => " New Order ".to_string(),
      FormMode::Edit(id) => format!(" Edit Order #{} ", id),
    }
  }

  fn field_lines(&self, field: FormField, focused: bool) -> Vec<Line<'_>> {
    let label_style = if focused {
      Style::default().fg(Color::Yellow).bold()
    } else {
      Style::default().fg(Color::Gray)
    };
    let marker = if focused { "> " } else { "  " };

    let value = if field == FormField::Status {
      let status = self.form.data().status;
      let text = if focused {
        format!("< {} >", status.label())
      } else {
        status.label().to_string()
      };
      vec![Span::styled(text, Style::default().fg(status_color(status)))]
    } else if focused && self.form.state() == FormState::Ready {
      // Split around the cursor
      let value = self.editor.value();
      let split = value
        .char_indices()
        .nth(self.editor.cursor_position())
        .map(|(i, _)| i)
        .unwrap_or(value.len());
      vec![
        Span::raw(value[..split].to_string()),
        Span::styled("_", Style::default().fg(Color::Yellow)),
        Span::raw(value[split..].to_string()),
      ]
    } else {
      vec![Span::raw(self.form.data().text(field).to_string())]
    };

    let mut value_spans = vec![Span::raw("    ")];
    value_spans.extend(value);

    let mut lines = vec![
      Line::from(vec![
        Span::styled(marker, label_style),
        Span::styled(field.label(), label_style),
      ]),
      Line::from(value_spans),
    ];
    if let Some(message) = self.form.error_for(field) {
      lines.push(Line::from(Span::styled(
        format!("    {}", message),
        Style::default().fg(Color::Red),
      )));
    }
    lines
  }
}

impl View for OrderFormView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if key.code == KeyCode::Esc {
      return ViewAction::Pop;
    }
    if self.form.state() != FormState::Ready {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Tab | KeyCode::Down => self.move_focus(true),
      KeyCode::BackTab | KeyCode::Up => self.move_focus(false),
      KeyCode::Enter => self.submit(),
      KeyCode::Left | KeyCode::Right if self.focused() == FormField::Status => {
        self.form.cycle_status(key.code == KeyCode::Right);
      }
      _ if self.focused().is_text() => {
        if let InputResult::Consumed = self.editor.handle_key(key) {
          self.form.set_text(self.focused(), self.editor.value());
        }
      }
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Banner
        Constraint::Length(1),
        Constraint::Min(1), // Fields
      ])
      .split(inner);

    if let Some(banner) = self.form.banner() {
      draw_banner(frame, chunks[0], banner);
    }

    let content: Vec<Line> = match self.form.state() {
      FormState::Loading => vec![Line::from(Span::styled(
        "Loading order...",
        Style::default().fg(Color::DarkGray),
      ))],
      FormState::Idle => Vec::new(),
      state => {
        let mut lines: Vec<Line> = FormField::ALL
          .iter()
          .enumerate()
          .flat_map(|(idx, field)| self.field_lines(*field, idx == self.focus))
          .collect();
        if state == FormState::Submitting {
          lines.push(Line::from(""));
          lines.push(Line::from(Span::styled(
            "Saving...",
            Style::default().fg(Color::DarkGray),
          )));
        }
        lines
      }
    };

    frame.render_widget(Paragraph::new(content), chunks[2]);
  }

  fn breadcrumb_label(&self) -> String {
    match self.form.mode() {
      FormMode::Create => "New Order".to_string(),
      FormMode::Edit(id) => format!("Edit #{}", id),
    }
  }

  fn route(&self) -> Route {
    match self.form.mode() {
      FormMode::Create => Route::NewOrder,
      FormMode::Edit(id) => Route::EditOrder(id),
    }
  }

  fn is_editing(&self) -> bool {
    self.form.state() == FormState::Ready
  }

  fn tick(&mut self) -> ViewAction {
    self.poll_load();
    self.poll_save();
    if self.form.take_redirect(Instant::now()) {
      return ViewAction::Navigate(Route::OrderList);
    }
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next field").with_priority(10),
      ShortcutInfo::new("←/→", "status").with_priority(20),
      ShortcutInfo::new("enter", "save").with_priority(25),
      ShortcutInfo::new("esc", "cancel").with_priority(30),
    ]
  }
}
