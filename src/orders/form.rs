//! Create/edit form model: field data, validation and the submit state machine.
//!
//! The model is UI-agnostic; the TUI view feeds it text and polls its state.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::store::{OrderStore, StoreResult};
use super::types::{NewOrder, Order, OrderPatch, OrderStatus};

/// Format used for entering and displaying order dates (local time)
pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Delay before returning to the list after a successful save
pub const SAVE_REDIRECT_DELAY: Duration = Duration::from_millis(1500);

/// Delay before returning to the list when the edited order is missing
pub const NOT_FOUND_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// Form fields in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
  OrderDate,
  Status,
  BuyerName,
  Products,
  Platform,
  Courier,
}

impl FormField {
  pub const ALL: [FormField; 6] = [
    FormField::OrderDate,
    FormField::Status,
    FormField::BuyerName,
    FormField::Products,
    FormField::Platform,
    FormField::Courier,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      FormField::OrderDate => "Order Date and Time",
      FormField::Status => "Status",
      FormField::BuyerName => "Buyer Name",
      FormField::Products => "Products",
      FormField::Platform => "Platform (e.g., Tokopedia, Shopee)",
      FormField::Courier => "Courier (e.g., JNE, J&T, SiCepat)",
    }
  }

  /// Whether the field is edited as free text
  pub fn is_text(&self) -> bool {
    !matches!(self, FormField::Status)
  }
}

/// A field-scoped validation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
  pub field: FormField,
  pub message: &'static str,
}

/// Raw form values as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFormData {
  pub order_date: String,
  pub products: String,
  pub buyer_name: String,
  pub platform: String,
  pub courier: String,
  pub status: OrderStatus,
}

impl Default for OrderFormData {
  fn default() -> Self {
    Self {
      order_date: format_order_date(Utc::now()),
      products: String::new(),
      buyer_name: String::new(),
      platform: String::new(),
      courier: String::new(),
      status: OrderStatus::Pending,
    }
  }
}

impl From<&Order> for OrderFormData {
  fn from(order: &Order) -> Self {
    Self {
      order_date: format_order_date(order.order_date),
      products: order.products.clone(),
      buyer_name: order.buyer_name.clone(),
      platform: order.platform.clone(),
      courier: order.courier.clone(),
      status: order.status,
    }
  }
}

impl OrderFormData {
  pub fn text(&self, field: FormField) -> &str {
    match field {
      FormField::OrderDate => &self.order_date,
      FormField::Products => &self.products,
      FormField::BuyerName => &self.buyer_name,
      FormField::Platform => &self.platform,
      FormField::Courier => &self.courier,
      FormField::Status => self.status.label(),
    }
  }

  /// Check every required field, returning all failures at once
  pub fn validate(&self) -> Result<NewOrder, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let order_date = if self.order_date.trim().is_empty() {
      errors.push(ValidationError {
        field: FormField::OrderDate,
        message: "Order date is required",
      });
      None
    } else {
      let parsed = parse_order_date(&self.order_date);
      if parsed.is_none() {
        errors.push(ValidationError {
          field: FormField::OrderDate,
          message: "Order date is invalid",
        });
      }
      parsed
    };

    let required = [
      (FormField::Products, &self.products, "Products are required"),
      (FormField::BuyerName, &self.buyer_name, "Buyer name is required"),
      (FormField::Platform, &self.platform, "Platform is required"),
      (FormField::Courier, &self.courier, "Courier is required"),
    ];
    for (field, value, message) in required {
      if value.trim().is_empty() {
        errors.push(ValidationError { field, message });
      }
    }

    match order_date {
      Some(order_date) if errors.is_empty() => Ok(NewOrder {
        order_date,
        products: self.products.clone(),
        buyer_name: self.buyer_name.clone(),
        platform: self.platform.clone(),
        courier: self.courier.clone(),
        status: self.status,
      }),
      _ => Err(errors),
    }
  }
}

/// Parse a local `YYYY-MM-DD HH:MM` timestamp
pub fn parse_order_date(input: &str) -> Option<DateTime<Utc>> {
  let naive = NaiveDateTime::parse_from_str(input.trim(), DATE_INPUT_FORMAT).ok()?;
  Local
    .from_local_datetime(&naive)
    .earliest()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Render a timestamp in local time for the form and list
pub fn format_order_date(date: DateTime<Utc>) -> String {
  date.with_timezone(&Local).format(DATE_INPUT_FORMAT).to_string()
}

/// Create a new order or edit an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
  Create,
  Edit(i64),
}

/// Form lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
  Idle,
  Loading,
  Ready,
  Submitting,
  Saved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
  Success,
  Error,
}

/// Page-level message shown above the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
  pub kind: BannerKind,
  pub message: String,
}

impl Banner {
  pub fn success(message: &str) -> Self {
    Self {
      kind: BannerKind::Success,
      message: message.to_string(),
    }
  }

  pub fn error(message: &str) -> Self {
    Self {
      kind: BannerKind::Error,
      message: message.to_string(),
    }
  }
}

/// Validated save waiting to be executed against the store
#[derive(Debug, Clone)]
pub struct SubmitRequest {
  pub mode: FormMode,
  pub order: NewOrder,
}

impl SubmitRequest {
  pub fn execute(self, store: &OrderStore) -> StoreResult<()> {
    match self.mode {
      FormMode::Create => store.add_order(self.order).map(|_| ()),
      FormMode::Edit(id) => store.update_order(id, OrderPatch::replace_all(self.order)),
    }
  }
}

/// Order form model
#[derive(Debug, Clone)]
pub struct OrderForm {
  mode: FormMode,
  state: FormState,
  data: OrderFormData,
  errors: Vec<ValidationError>,
  banner: Option<Banner>,
  redirect_at: Option<Instant>,
}

impl OrderForm {
  /// Empty form for a new order, ready for input
  pub fn create() -> Self {
    Self {
      mode: FormMode::Create,
      state: FormState::Ready,
      data: OrderFormData::default(),
      errors: Vec::new(),
      banner: None,
      redirect_at: None,
    }
  }

  /// Form for order `id`; stays in `Loading` until `loaded` is called
  pub fn edit(id: i64) -> Self {
    Self {
      mode: FormMode::Edit(id),
      state: FormState::Loading,
      ..Self::create()
    }
  }

  pub fn mode(&self) -> FormMode {
    self.mode
  }

  pub fn state(&self) -> FormState {
    self.state
  }

  pub fn data(&self) -> &OrderFormData {
    &self.data
  }

  pub fn banner(&self) -> Option<&Banner> {
    self.banner.as_ref()
  }

  pub fn error_for(&self, field: FormField) -> Option<&'static str> {
    self
      .errors
      .iter()
      .find(|e| e.field == field)
      .map(|e| e.message)
  }

  /// Apply the result of fetching the edited order
  pub fn loaded(&mut self, result: Result<Option<Order>, String>, now: Instant) {
    match result {
      Ok(Some(order)) => {
        self.data = OrderFormData::from(&order);
        self.state = FormState::Ready;
      }
      Ok(None) => {
        self.banner = Some(Banner::error("Order not found"));
        self.state = FormState::Idle;
        self.redirect_at = Some(now + NOT_FOUND_REDIRECT_DELAY);
      }
      Err(e) => {
        tracing::warn!(error = %e, "failed to load order");
        self.banner = Some(Banner::error("Failed to load order details"));
        self.state = FormState::Ready;
      }
    }
  }

  /// Replace a text field's value, clearing its error
  pub fn set_text(&mut self, field: FormField, value: &str) {
    match field {
      FormField::OrderDate => self.data.order_date = value.to_string(),
      FormField::Products => self.data.products = value.to_string(),
      FormField::BuyerName => self.data.buyer_name = value.to_string(),
      FormField::Platform => self.data.platform = value.to_string(),
      FormField::Courier => self.data.courier = value.to_string(),
      FormField::Status => return,
    }
    self.errors.retain(|e| e.field != field);
  }

  pub fn cycle_status(&mut self, forward: bool) {
    self.data.status = if forward {
      self.data.status.next()
    } else {
      self.data.status.previous()
    };
    self.errors.retain(|e| e.field != FormField::Status);
  }

  /// Validate and move to `Submitting`.
  ///
  /// Returns `None` when the form is not ready or a field is invalid; in the
  /// latter case the field errors are populated and nothing is written.
  pub fn begin_submit(&mut self) -> Option<SubmitRequest> {
    if self.state != FormState::Ready {
      return None;
    }

    match self.data.validate() {
      Ok(order) => {
        self.errors.clear();
        self.banner = None;
        self.state = FormState::Submitting;
        Some(SubmitRequest {
          mode: self.mode,
          order,
        })
      }
      Err(errors) => {
        self.errors = errors;
        None
      }
    }
  }

  /// Record the outcome of a save started with `begin_submit`
  pub fn finish_submit(&mut self, result: Result<(), String>, now: Instant) {
    match result {
      Ok(()) => {
        let message = match self.mode {
          FormMode::Create => "Order added successfully",
          FormMode::Edit(_) => "Order updated successfully",
        };
        self.banner = Some(Banner::success(message));
        self.state = FormState::Saved;
        self.redirect_at = Some(now + SAVE_REDIRECT_DELAY);
      }
      Err(e) => {
        tracing::warn!(error = %e, "failed to save order");
        self.banner = Some(Banner::error("Failed to save order. Please try again."));
        self.state = FormState::Ready;
      }
    }
  }

  /// True once a pending redirect delay has elapsed; the form returns to `Idle`
  pub fn take_redirect(&mut self, now: Instant) -> bool {
    match self.redirect_at {
      Some(at) if now >= at => {
        self.redirect_at = None;
        self.state = FormState::Idle;
        true
      }
      _ => false,
    }
  }
}
