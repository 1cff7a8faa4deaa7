//! Background loading for views.
//!
//! Store calls are synchronous SQLite work, so a `Query<T>` runs its loader on
//! tokio's blocking pool and hands the result back over a channel. Views
//! start a query when they are built and `poll()` it on every tick:
//!
//! ```ignore
//! let store = store.clone();
//! let mut query = Query::start(move || OrderStats::fetch(&store));
//!
//! // on tick
//! if query.poll() {
//!     // new data or a new error, redraw
//! }
//! ```

use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::warn;

/// How long loaded data counts as fresh
pub const STALE_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub enum QueryState<T> {
  Loading,
  Success(T),
  /// The loader's error, already rendered for display
  Error(String),
}

type Loader<T> = Arc<dyn Fn() -> Result<T, String> + Send + Sync>;

pub struct Query<T> {
  state: QueryState<T>,
  loader: Loader<T>,
  pending: Option<oneshot::Receiver<Result<T, String>>>,
  loaded_at: Option<Instant>,
}

impl<T: Send + 'static> Query<T> {
  /// Build a query and start loading right away.
  ///
  /// `loader` runs on the blocking pool, once now and again on every
  /// `refetch()`.
  pub fn start<F, E>(loader: F) -> Self
  where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    E: Display,
  {
    let mut query = Self {
      state: QueryState::Loading,
      loader: Arc::new(move || loader().map_err(|e| e.to_string())),
      pending: None,
      loaded_at: None,
    };
    query.refetch();
    query
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match &self.state {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self.state, QueryState::Loading)
  }

  pub fn is_error(&self) -> bool {
    matches!(self.state, QueryState::Error(_))
  }

  /// Loaded data older than [`STALE_AFTER`]
  pub fn is_stale(&self) -> bool {
    self.is_stale_after(STALE_AFTER)
  }

  fn is_stale_after(&self, age: Duration) -> bool {
    match (&self.state, self.loaded_at) {
      (QueryState::Success(_), Some(at)) => at.elapsed() >= age,
      _ => false,
    }
  }

  /// Load again. A result still in flight from an earlier load is dropped.
  pub fn refetch(&mut self) {
    let (tx, rx) = oneshot::channel();
    self.pending = Some(rx);
    self.state = QueryState::Loading;

    let loader = Arc::clone(&self.loader);
    tokio::task::spawn_blocking(move || {
      let _ = tx.send(loader());
    });
  }

  /// Pick up a finished load. Returns `true` when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(rx) = self.pending.as_mut() else {
      return false;
    };

    let result = match rx.try_recv() {
      Ok(result) => result,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => {
        warn!("query loader exited without a result");
        Err("Loading was interrupted".to_string())
      }
    };

    self.pending = None;
    match result {
      Ok(data) => {
        self.state = QueryState::Success(data);
        self.loaded_at = Some(Instant::now());
      }
      Err(e) => self.state = QueryState::Error(e),
    }
    true
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("loaded_at", &self.loaded_at)
      .finish_non_exhaustive()
  }
}
