//! Registration state for cache workers, owned by a single background task.
//!
//! Requests, new workers and skip-wait signals arrive as messages. Install
//! runs on its own task and reports back; fetches are answered on spawned
//! tasks so a slow network never stalls the loop.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::fetcher::{FetchError, Fetcher};
use super::types::{Request, Response};
use super::worker::{CacheWorker, WorkerState};

enum Message {
  Fetch {
    request: Request,
    reply: oneshot::Sender<Result<Response, FetchError>>,
  },
  Register(CacheWorker),
  Restore(CacheWorker),
  SkipWaiting,
  Status(oneshot::Sender<ServiceStatus>),
}

struct Installed {
  id: u64,
  worker: CacheWorker,
  result: Result<(), FetchError>,
}

struct PendingInstall {
  id: u64,
  version: String,
  skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
  pub version: String,
  pub state: WorkerState,
}

impl From<&CacheWorker> for WorkerInfo {
  fn from(worker: &CacheWorker) -> Self {
    Self {
      version: worker.version().to_string(),
      state: worker.state(),
    }
  }
}

/// Snapshot of the registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
  pub active: Option<WorkerInfo>,
  pub waiting: Option<WorkerInfo>,
  pub installing: Option<String>,
}

/// Handle for talking to the cache service task.
#[derive(Clone)]
pub struct CacheServiceHandle {
  sender: mpsc::Sender<Message>,
}

impl CacheServiceHandle {
  /// Route a request through the active worker, or straight to the network
  /// when no worker is active yet.
  pub async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
    let (reply, response) = oneshot::channel();
    self.send(Message::Fetch { request, reply }).await?;
    response.await.map_err(|_| FetchError::ServiceStopped)?
  }

  /// Install a new worker. It takes over immediately if nothing is active,
  /// otherwise it waits for `skip_waiting`.
  pub async fn register(&self, worker: CacheWorker) -> Result<(), FetchError> {
    self.send(Message::Register(worker)).await
  }

  /// Put a worker whose bucket survived a restart in control, without
  /// touching the network. Ignored if its bucket is incomplete or another
  /// worker is already active.
  pub async fn restore(&self, worker: CacheWorker) -> Result<(), FetchError> {
    self.send(Message::Restore(worker)).await
  }

  pub async fn skip_waiting(&self) -> Result<(), FetchError> {
    self.send(Message::SkipWaiting).await
  }

  pub async fn status(&self) -> Result<ServiceStatus, FetchError> {
    let (reply, status) = oneshot::channel();
    self.send(Message::Status(reply)).await?;
    status.await.map_err(|_| FetchError::ServiceStopped)
  }

  async fn send(&self, message: Message) -> Result<(), FetchError> {
    self
      .sender
      .send(message)
      .await
      .map_err(|_| FetchError::ServiceStopped)
  }
}

pub struct CacheService {
  fetcher: Arc<dyn Fetcher>,
  active: Option<CacheWorker>,
  waiting: Option<CacheWorker>,
  installing: Option<PendingInstall>,
  next_id: u64,
  installed_tx: mpsc::Sender<Installed>,
}

impl CacheService {
  /// Start the service task. It stops once every handle is dropped.
  pub fn spawn(fetcher: Arc<dyn Fetcher>) -> CacheServiceHandle {
    let (sender, receiver) = mpsc::channel(256);
    let (installed_tx, installed_rx) = mpsc::channel(8);

    let service = Self {
      fetcher,
      active: None,
      waiting: None,
      installing: None,
      next_id: 0,
      installed_tx,
    };
    tokio::spawn(service.run(receiver, installed_rx));

    CacheServiceHandle { sender }
  }

  async fn run(
    mut self,
    mut receiver: mpsc::Receiver<Message>,
    mut installed_rx: mpsc::Receiver<Installed>,
  ) {
    loop {
      tokio::select! {
        message = receiver.recv() => {
          match message {
            Some(message) => self.handle(message),
            None => break,
          }
        }
        Some(installed) = installed_rx.recv() => {
          self.finish_install(installed);
        }
      }
    }
    debug!("cache service stopped");
  }

  fn handle(&mut self, message: Message) {
    match message {
      Message::Fetch { request, reply } => {
        let active = self.active.clone();
        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
          let result = match active {
            Some(worker) => worker.handle_fetch(request).await,
            None => fetcher.fetch(&request).await,
          };
          let _ = reply.send(result);
        });
      }
      Message::Register(worker) => self.start_install(worker),
      Message::Restore(worker) => self.restore(worker),
      Message::SkipWaiting => {
        if let Some(worker) = self.waiting.take() {
          info!(version = %worker.version(), "skip waiting");
          self.promote(worker);
        } else if let Some(pending) = self.installing.as_mut() {
          pending.skip_waiting = true;
        } else {
          debug!("skip waiting with no waiting worker");
        }
      }
      Message::Status(reply) => {
        let _ = reply.send(self.status());
      }
    }
  }

  fn restore(&mut self, mut worker: CacheWorker) {
    if self.active.is_some() {
      debug!(version = %worker.version(), "restore skipped, worker already active");
      return;
    }
    match worker.restore() {
      Ok(true) => self.promote(worker),
      Ok(false) => debug!(version = %worker.version(), "no complete cache to restore"),
      Err(e) => warn!(version = %worker.version(), error = %e, "cache restore failed"),
    }
  }

  fn start_install(&mut self, worker: CacheWorker) {
    let id = self.next_id;
    self.next_id += 1;

    if let Some(previous) = self.installing.replace(PendingInstall {
      id,
      version: worker.version().to_string(),
      skip_waiting: false,
    }) {
      debug!(version = %previous.version, "install superseded");
    }

    let tx = self.installed_tx.clone();
    tokio::spawn(async move {
      let mut worker = worker;
      let result = worker.install().await;
      let _ = tx.send(Installed { id, worker, result }).await;
    });
  }

  fn finish_install(&mut self, installed: Installed) {
    let Installed {
      id,
      mut worker,
      result,
    } = installed;

    let pending = match self.installing.take() {
      Some(pending) if pending.id == id => pending,
      other => {
        self.installing = other;
        worker.mark_redundant();
        if result.is_ok() {
          self.discard(&worker);
        }
        return;
      }
    };

    if let Err(e) = result {
      warn!(version = %pending.version, error = %e, "worker install failed");
      return;
    }

    // A reinstall of the active version only refreshed the bucket in use
    let same_version = self
      .active
      .as_ref()
      .is_some_and(|active| active.version() == worker.version());

    if self.active.is_none() || pending.skip_waiting || same_version {
      self.promote(worker);
    } else {
      info!(version = %worker.version(), "worker installed, waiting");
      if let Some(mut replaced) = self.waiting.replace(worker) {
        replaced.mark_redundant();
        self.discard(&replaced);
      }
    }
  }

  /// Drop the bucket of a worker that will never take over, unless another
  /// worker still uses the same version.
  fn discard(&self, worker: &CacheWorker) {
    let version = worker.version();
    let in_use = self.active.as_ref().is_some_and(|w| w.version() == version)
      || self.waiting.as_ref().is_some_and(|w| w.version() == version)
      || self.installing.as_ref().is_some_and(|p| p.version == version);
    if in_use {
      return;
    }
    match worker.discard() {
      Ok(true) => debug!(version, "deleted bucket of superseded worker"),
      Ok(false) => {}
      Err(e) => warn!(version, error = %e, "failed to delete superseded bucket"),
    }
  }

  fn promote(&mut self, mut worker: CacheWorker) {
    if let Err(e) = worker.activate() {
      warn!(version = %worker.version(), error = %e, "worker activation failed");
      worker.mark_redundant();
      return;
    }
    if let Some(mut previous) = self.active.replace(worker) {
      previous.mark_redundant();
    }
  }

  fn status(&self) -> ServiceStatus {
    ServiceStatus {
      active: self.active.as_ref().map(WorkerInfo::from),
      waiting: self.waiting.as_ref().map(WorkerInfo::from),
      installing: self.installing.as_ref().map(|p| p.version.clone()),
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::config::OfflineConfig;
  use crate::offline::fetcher::fake::FakeFetcher;
  use crate::offline::storage::CacheStorage;
  use std::time::Duration;
  use url::Url;

  const ORIGIN: &str = "http://localhost:5173";

  fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
  }

  fn worker(version: &str, fetcher: &Arc<FakeFetcher>, storage: &Arc<CacheStorage>) -> CacheWorker {
    let config = OfflineConfig {
      version: version.to_string(),
      precache: vec!["/offline.html".to_string(), "/app.css".to_string()],
      ..OfflineConfig::default()
    };
    CacheWorker::new(config, storage.clone(), fetcher.clone()).unwrap()
  }

  fn fixtures() -> (Arc<FakeFetcher>, Arc<CacheStorage>) {
    let fetcher = Arc::new(FakeFetcher::new());
    fetcher.serve(url("/offline.html").as_str(), "text/html", "offline");
    fetcher.serve(url("/app.css").as_str(), "text/css", "body{}");
    (fetcher, Arc::new(CacheStorage::open_in_memory().unwrap()))
  }

  /// Poll status until `done` holds
  pub(crate) async fn wait_for(
    handle: &CacheServiceHandle,
    done: impl Fn(&ServiceStatus) -> bool,
  ) -> ServiceStatus {
    for _ in 0..100 {
      let status = handle.status().await.unwrap();
      if done(&status) {
        return status;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cache service did not settle");
  }

  fn active_version(status: &ServiceStatus) -> Option<&str> {
    status.active.as_ref().map(|w| w.version.as_str())
  }

  #[tokio::test]
  async fn test_passthrough_without_worker() {
    let (fetcher, _) = fixtures();
    let handle = CacheService::spawn(fetcher.clone());

    let response = handle.fetch(Request::get(url("/app.css"))).await.unwrap();
    assert_eq!(response.body, b"body{}");

    fetcher.set_offline(true);
    let result = handle.fetch(Request::get(url("/app.css"))).await;
    assert!(matches!(result, Err(FetchError::Network(_))));
  }

  #[tokio::test]
  async fn test_first_worker_activates_after_install() {
    let (fetcher, storage) = fixtures();
    let handle = CacheService::spawn(fetcher.clone());

    handle.register(worker("v1", &fetcher, &storage)).await.unwrap();
    let status = wait_for(&handle, |s| s.active.is_some()).await;
    assert_eq!(active_version(&status), Some("v1"));
    assert_eq!(status.active.unwrap().state, WorkerState::Activated);

    fetcher.set_offline(true);
    let response = handle
      .fetch(Request::navigate(url("/orders/new")))
      .await
      .unwrap();
    assert_eq!(response.body, b"offline");
  }

  #[tokio::test]
  async fn test_new_worker_waits_until_skip_waiting() {
    let (fetcher, storage) = fixtures();
    let handle = CacheService::spawn(fetcher.clone());
    handle.register(worker("v1", &fetcher, &storage)).await.unwrap();
    wait_for(&handle, |s| s.active.is_some()).await;

    handle.register(worker("v2", &fetcher, &storage)).await.unwrap();
    let status = wait_for(&handle, |s| s.waiting.is_some()).await;
    assert_eq!(active_version(&status), Some("v1"));
    assert_eq!(status.waiting.unwrap().state, WorkerState::Installed);

    handle.skip_waiting().await.unwrap();
    let status = wait_for(&handle, |s| active_version(s) == Some("v2")).await;
    assert!(status.waiting.is_none());
    assert_eq!(storage.bucket_names().unwrap(), vec!["v2".to_string()]);
  }

  #[tokio::test]
  async fn test_skip_waiting_during_install() {
    let (fetcher, storage) = fixtures();
    let handle = CacheService::spawn(fetcher.clone());
    handle.register(worker("v1", &fetcher, &storage)).await.unwrap();
    wait_for(&handle, |s| s.active.is_some()).await;

    handle.register(worker("v2", &fetcher, &storage)).await.unwrap();
    handle.skip_waiting().await.unwrap();

    let status = wait_for(&handle, |s| active_version(s) == Some("v2")).await;
    assert!(status.waiting.is_none());
    assert!(status.installing.is_none());
  }

  #[tokio::test]
  async fn test_skip_waiting_without_worker_is_noop() {
    let (fetcher, _) = fixtures();
    let handle = CacheService::spawn(fetcher);

    handle.skip_waiting().await.unwrap();
    let status = handle.status().await.unwrap();
    assert_eq!(
      status,
      ServiceStatus {
        active: None,
        waiting: None,
        installing: None,
      }
    );
  }

  #[tokio::test]
  async fn test_restart_offline_restores_installed_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let (fetcher, _) = fixtures();
    {
      let storage = Arc::new(CacheStorage::open(&path).unwrap());
      let handle = CacheService::spawn(fetcher.clone());
      handle.register(worker("v1", &fetcher, &storage)).await.unwrap();
      wait_for(&handle, |s| s.active.is_some()).await;
    }

    fetcher.set_offline(true);
    let storage = Arc::new(CacheStorage::open(&path).unwrap());
    let handle = CacheService::spawn(fetcher.clone());
    handle.restore(worker("v1", &fetcher, &storage)).await.unwrap();
    handle.register(worker("v1", &fetcher, &storage)).await.unwrap();

    let status = wait_for(&handle, |s| s.active.is_some() && s.installing.is_none()).await;
    assert_eq!(active_version(&status), Some("v1"));
    assert!(status.waiting.is_none());

    let response = handle
      .fetch(Request::navigate(url("/orders/new")))
      .await
      .unwrap();
    assert_eq!(response.body, b"offline");
  }

  #[tokio::test]
  async fn test_restore_ignores_partial_bucket() {
    let (fetcher, storage) = fixtures();
    storage
      .put("v1", url("/offline.html").as_str(), &Response::empty("text/html"))
      .unwrap();
    let handle = CacheService::spawn(fetcher.clone());

    handle.restore(worker("v1", &fetcher, &storage)).await.unwrap();
    let status = handle.status().await.unwrap();
    assert!(status.active.is_none());
  }

  #[tokio::test]
  async fn test_reinstall_of_active_version_takes_over() {
    let (fetcher, storage) = fixtures();
    let handle = CacheService::spawn(fetcher.clone());
    handle.register(worker("v1", &fetcher, &storage)).await.unwrap();
    wait_for(&handle, |s| s.active.is_some()).await;

    fetcher.serve(url("/app.css").as_str(), "text/css", "body{color:red}");
    handle.register(worker("v1", &fetcher, &storage)).await.unwrap();
    let status = wait_for(&handle, |s| s.installing.is_none()).await;

    assert_eq!(active_version(&status), Some("v1"));
    assert!(status.waiting.is_none());
    let cached = storage.get("v1", url("/app.css").as_str()).unwrap().unwrap();
    assert_eq!(cached.body, b"body{color:red}");
  }

  #[tokio::test]
  async fn test_superseded_install_leaves_no_bucket() {
    let (fetcher, storage) = fixtures();
    let handle = CacheService::spawn(fetcher.clone());
    handle.register(worker("v1", &fetcher, &storage)).await.unwrap();
    wait_for(&handle, |s| s.active.is_some()).await;

    handle.register(worker("v2", &fetcher, &storage)).await.unwrap();
    handle.register(worker("v3", &fetcher, &storage)).await.unwrap();

    let expected = vec!["v1".to_string(), "v3".to_string()];
    let status = wait_for(&handle, |s| {
      s.waiting.is_some() && s.installing.is_none() && storage.bucket_names().unwrap() == expected
    })
    .await;
    assert_eq!(status.waiting.unwrap().version, "v3");
  }

  #[tokio::test]
  async fn test_failed_install_keeps_active_worker() {
    let (fetcher, storage) = fixtures();
    let handle = CacheService::spawn(fetcher.clone());
    handle.register(worker("v1", &fetcher, &storage)).await.unwrap();
    wait_for(&handle, |s| s.active.is_some()).await;

    fetcher.set_offline(true);
    handle.register(worker("v2", &fetcher, &storage)).await.unwrap();
    let status = wait_for(&handle, |s| s.installing.is_none()).await;

    assert_eq!(active_version(&status), Some("v1"));
    assert!(status.waiting.is_none());
    assert_eq!(storage.bucket_names().unwrap(), vec!["v1".to_string()]);
  }
}
