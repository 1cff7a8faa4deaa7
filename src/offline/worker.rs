//! A single versioned cache worker: precache on install, prune old buckets on
//! activate, and answer fetches from cache or network.

use futures::future::try_join_all;
use reqwest::Method;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::fetcher::{FetchError, Fetcher};
use super::storage::CacheStorage;
use super::types::{cache_key, Destination, Request, RequestMode, Response};
use crate::config::OfflineConfig;

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
  Parsed,
  Installing,
  /// Installed and waiting to take over
  Installed,
  Activating,
  Activated,
  /// Failed to install or replaced by a newer worker
  Redundant,
}

impl fmt::Display for WorkerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      WorkerState::Parsed => "parsed",
      WorkerState::Installing => "installing",
      WorkerState::Installed => "installed",
      WorkerState::Activating => "activating",
      WorkerState::Activated => "activated",
      WorkerState::Redundant => "redundant",
    };
    write!(f, "{}", s)
  }
}

#[derive(Clone)]
pub struct CacheWorker {
  config: Arc<OfflineConfig>,
  origin: Url,
  storage: Arc<CacheStorage>,
  fetcher: Arc<dyn Fetcher>,
  state: WorkerState,
}

impl CacheWorker {
  pub fn new(
    config: OfflineConfig,
    storage: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
  ) -> Result<Self, FetchError> {
    let origin = Url::parse(&config.origin)?;
    Ok(Self {
      config: Arc::new(config),
      origin,
      storage,
      fetcher,
      state: WorkerState::Parsed,
    })
  }

  pub fn version(&self) -> &str {
    &self.config.version
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn mark_redundant(&mut self) {
    self.state = WorkerState::Redundant;
  }

  /// Precache the manifest into the current bucket.
  ///
  /// Every entry must come back as a 200 before anything is written. On
  /// failure the worker becomes redundant and the bucket is left untouched.
  pub async fn install(&mut self) -> Result<(), FetchError> {
    self.state = WorkerState::Installing;
    info!(version = %self.config.version, "installing cache worker");

    match self.precache().await {
      Ok(count) => {
        info!(version = %self.config.version, count, "precache complete");
        self.state = WorkerState::Installed;
        Ok(())
      }
      Err(e) => {
        warn!(version = %self.config.version, error = %e, "install failed");
        self.state = WorkerState::Redundant;
        Err(e)
      }
    }
  }

  /// Pick up a bucket left complete by an earlier install of this version.
  /// Returns false when the worker still needs a network install.
  pub fn restore(&mut self) -> Result<bool, FetchError> {
    if !self.storage.is_complete(&self.config.version)? {
      return Ok(false);
    }
    info!(version = %self.config.version, "restored cache worker from storage");
    self.state = WorkerState::Installed;
    Ok(true)
  }

  /// Delete this worker's bucket. Returns whether it existed.
  pub fn discard(&self) -> Result<bool, FetchError> {
    Ok(self.storage.delete_bucket(&self.config.version)?)
  }

  async fn precache(&self) -> Result<usize, FetchError> {
    let urls = self
      .config
      .precache
      .iter()
      .map(|path| self.origin.join(path))
      .collect::<Result<Vec<_>, _>>()?;

    let fetches = urls.into_iter().map(|url| async move {
      let request = Request::get(url);
      let response = self.fetcher.fetch(&request).await?;
      if response.status != 200 {
        return Err(FetchError::BadStatus {
          url: request.url.to_string(),
          status: response.status,
        });
      }
      Ok((request.cache_key(), response))
    });
    let entries = try_join_all(fetches).await?;

    self.storage.put_all(&self.config.version, &entries)?;
    Ok(entries.len())
  }

  /// Take over: delete every bucket other than this worker's version.
  /// Returns the names of the removed buckets.
  pub fn activate(&mut self) -> Result<Vec<String>, FetchError> {
    self.state = WorkerState::Activating;

    let mut removed = Vec::new();
    for name in self.storage.bucket_names()? {
      if name != self.config.version && self.storage.delete_bucket(&name)? {
        info!(bucket = %name, "deleted old cache");
        removed.push(name);
      }
    }

    self.state = WorkerState::Activated;
    info!(version = %self.config.version, "cache worker activated");
    Ok(removed)
  }

  /// Answer a request on behalf of the page.
  pub async fn handle_fetch(&self, request: Request) -> Result<Response, FetchError> {
    if request.url.origin() != self.origin.origin() {
      return self.fetcher.fetch(&request).await;
    }
    if request.method != Method::GET {
      return self.fetcher.fetch(&request).await;
    }
    if request.mode == RequestMode::Navigate {
      return self.network_first(&request).await;
    }
    if request.url.path().contains(self.config.api_prefix.as_str()) {
      return self.fetcher.fetch(&request).await;
    }
    self.stale_while_revalidate(request).await
  }

  async fn network_first(&self, request: &Request) -> Result<Response, FetchError> {
    match self.fetcher.fetch(request).await {
      Ok(response) => {
        // Only a complete 200 page replaces what the offline shell relies on
        if response.is_cacheable() {
          self.store(&request.cache_key(), &response);
        }
        Ok(response)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "navigation offline, serving offline page");
        self
          .cached_path(&self.config.offline_page)?
          .ok_or_else(|| FetchError::NoFallback(request.url.to_string()))
      }
    }
  }

  async fn stale_while_revalidate(&self, request: Request) -> Result<Response, FetchError> {
    let key = request.cache_key();

    if let Some(cached) = self.storage.get(&self.config.version, &key)? {
      let worker = self.clone();
      tokio::spawn(async move { worker.revalidate(request).await });
      return Ok(cached);
    }

    match self.fetcher.fetch(&request).await {
      Ok(response) => {
        if response.is_cacheable() {
          self.store(&key, &response);
        }
        Ok(response)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "asset fetch failed, trying fallback");
        self.fallback(&request)
      }
    }
  }

  /// Refresh a cached entry from the network
  pub async fn revalidate(&self, request: Request) {
    match self.fetcher.fetch(&request).await {
      Ok(response) if response.is_cacheable() => {
        self.store(&request.cache_key(), &response);
      }
      Ok(response) => {
        debug!(url = %request.url, status = response.status, "revalidation not cacheable");
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "revalidation failed");
      }
    }
  }

  fn fallback(&self, request: &Request) -> Result<Response, FetchError> {
    let response = match request.destination {
      Destination::Image => self.cached_path(&self.config.fallback_icon)?,
      Destination::Document => self.cached_path(&self.config.offline_page)?,
      Destination::Style => Some(Response::empty("text/css")),
      Destination::Script => Some(Response::empty("application/javascript")),
      Destination::Other => None,
    };
    response.ok_or_else(|| FetchError::NoFallback(request.url.to_string()))
  }

  fn cached_path(&self, path: &str) -> Result<Option<Response>, FetchError> {
    let url = self.origin.join(path)?;
    Ok(self.storage.get(&self.config.version, &cache_key(&url))?)
  }

  fn store(&self, key: &str, response: &Response) {
    if let Err(e) = self.storage.put(&self.config.version, key, response) {
      warn!(key, error = %e, "failed to update cache");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::offline::fetcher::fake::FakeFetcher;
  use crate::offline::types::ResponseKind;
  use reqwest::header::HeaderMap;
  use std::time::Duration;

  const ORIGIN: &str = "http://localhost:5173";

  fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
  }

  fn config(version: &str) -> OfflineConfig {
    OfflineConfig {
      version: version.to_string(),
      precache: vec![
        "/".to_string(),
        "/offline.html".to_string(),
        "/icons/icon.svg".to_string(),
        "/assets/index.css".to_string(),
      ],
      ..OfflineConfig::default()
    }
  }

  fn serve_shell(fetcher: &FakeFetcher) {
    fetcher.serve(url("/").as_str(), "text/html", "<html>shell</html>");
    fetcher.serve(url("/offline.html").as_str(), "text/html", "offline");
    fetcher.serve(url("/icons/icon.svg").as_str(), "image/svg+xml", "<svg/>");
    fetcher.serve(url("/assets/index.css").as_str(), "text/css", "body{}");
  }

  fn setup(version: &str) -> (CacheWorker, Arc<FakeFetcher>, Arc<CacheStorage>) {
    let fetcher = Arc::new(FakeFetcher::new());
    let storage = Arc::new(CacheStorage::open_in_memory().unwrap());
    let worker = CacheWorker::new(config(version), storage.clone(), fetcher.clone()).unwrap();
    (worker, fetcher, storage)
  }

  async fn installed(version: &str) -> (CacheWorker, Arc<FakeFetcher>, Arc<CacheStorage>) {
    let (mut worker, fetcher, storage) = setup(version);
    serve_shell(&fetcher);
    worker.install().await.unwrap();
    worker.activate().unwrap();
    (worker, fetcher, storage)
  }

  #[tokio::test]
  async fn test_install_precaches_manifest() {
    let (mut worker, fetcher, storage) = setup("v3");
    serve_shell(&fetcher);

    worker.install().await.unwrap();

    assert_eq!(worker.state(), WorkerState::Installed);
    let cached = storage.get("v3", url("/offline.html").as_str()).unwrap();
    assert_eq!(cached.unwrap().body, b"offline");
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let (mut worker, fetcher, storage) = setup("v3");
    serve_shell(&fetcher);
    fetcher.serve_response(
      url("/assets/index.css").as_str(),
      Response {
        status: 500,
        content_type: None,
        headers: HeaderMap::new(),
        body: Vec::new(),
        kind: ResponseKind::Basic,
      },
    );

    let result = worker.install().await;

    assert!(matches!(result, Err(FetchError::BadStatus { status: 500, .. })));
    assert_eq!(worker.state(), WorkerState::Redundant);
    assert!(storage.get("v3", url("/").as_str()).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_restore_needs_complete_bucket() {
    let (mut worker, fetcher, storage) = setup("v3");
    storage
      .put("v3", url("/").as_str(), &Response::empty("text/html"))
      .unwrap();
    assert!(!worker.restore().unwrap());
    assert_eq!(worker.state(), WorkerState::Parsed);

    serve_shell(&fetcher);
    worker.install().await.unwrap();

    let mut restarted = CacheWorker::new(config("v3"), storage, fetcher).unwrap();
    assert!(restarted.restore().unwrap());
    assert_eq!(restarted.state(), WorkerState::Installed);
  }

  #[tokio::test]
  async fn test_activate_deletes_other_buckets() {
    let (mut worker, fetcher, storage) = setup("v3");
    serve_shell(&fetcher);
    storage.open_bucket("shop-order-tracker-v1").unwrap();
    storage.open_bucket("shop-order-tracker-v2").unwrap();

    worker.install().await.unwrap();
    let mut removed = worker.activate().unwrap();
    removed.sort();

    assert_eq!(removed, vec!["shop-order-tracker-v1", "shop-order-tracker-v2"]);
    assert_eq!(storage.bucket_names().unwrap(), vec!["v3".to_string()]);
    assert_eq!(worker.state(), WorkerState::Activated);
  }

  #[tokio::test]
  async fn test_offline_navigation_serves_offline_page() {
    let (worker, fetcher, _) = installed("v3").await;
    fetcher.set_offline(true);

    let response = worker
      .handle_fetch(Request::navigate(url("/orders/new")))
      .await
      .unwrap();

    assert_eq!(response.body, b"offline");
  }

  #[tokio::test]
  async fn test_online_navigation_stores_copy() {
    let (worker, fetcher, storage) = installed("v3").await;
    fetcher.serve(url("/stats").as_str(), "text/html", "stats page");

    let response = worker
      .handle_fetch(Request::navigate(url("/stats")))
      .await
      .unwrap();

    assert_eq!(response.body, b"stats page");
    let cached = storage.get("v3", url("/stats").as_str()).unwrap().unwrap();
    assert_eq!(cached.body, b"stats page");
  }

  #[tokio::test]
  async fn test_error_page_does_not_replace_shell() {
    let (worker, fetcher, storage) = installed("v3").await;
    fetcher.serve_response(
      url("/").as_str(),
      Response {
        status: 500,
        content_type: Some("text/html".to_string()),
        headers: HeaderMap::new(),
        body: b"server error".to_vec(),
        kind: ResponseKind::Basic,
      },
    );

    let response = worker
      .handle_fetch(Request::navigate(url("/")))
      .await
      .unwrap();

    assert_eq!(response.status, 500);
    let cached = storage.get("v3", url("/").as_str()).unwrap().unwrap();
    assert_eq!(cached.body, b"<html>shell</html>");
  }

  #[tokio::test]
  async fn test_uncached_stylesheet_offline_is_empty_css() {
    let (worker, fetcher, _) = installed("v3").await;
    fetcher.set_offline(true);

    let response = worker
      .handle_fetch(Request::get(url("/assets/other.css")))
      .await
      .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type.as_deref(), Some("text/css"));
    assert!(response.body.is_empty());
  }

  #[tokio::test]
  async fn test_typed_fallbacks() {
    let (worker, fetcher, _) = installed("v3").await;
    fetcher.set_offline(true);

    let image = worker
      .handle_fetch(Request::get(url("/icons/missing.png")))
      .await
      .unwrap();
    assert_eq!(image.body, b"<svg/>");

    let script = worker
      .handle_fetch(Request::get(url("/assets/chunk.js")))
      .await
      .unwrap();
    assert_eq!(
      script.content_type.as_deref(),
      Some("application/javascript")
    );

    let other = worker
      .handle_fetch(Request::get(url("/manifest.json")))
      .await;
    assert!(matches!(other, Err(FetchError::NoFallback(_))));
  }

  #[tokio::test]
  async fn test_cache_hit_revalidates_in_background() {
    let (worker, fetcher, storage) = installed("v3").await;
    fetcher.serve(url("/assets/index.css").as_str(), "text/css", "body{color:red}");

    let response = worker
      .handle_fetch(Request::get(url("/assets/index.css")))
      .await
      .unwrap();
    assert_eq!(response.body, b"body{}");

    let key = url("/assets/index.css").to_string();
    let mut refreshed = false;
    for _ in 0..50 {
      tokio::time::sleep(Duration::from_millis(10)).await;
      if storage.get("v3", &key).unwrap().unwrap().body == b"body{color:red}" {
        refreshed = true;
        break;
      }
    }
    assert!(refreshed);
  }

  #[tokio::test]
  async fn test_revalidation_skips_opaque_responses() {
    let (worker, fetcher, storage) = installed("v3").await;
    fetcher.serve_response(
      url("/assets/index.css").as_str(),
      Response {
        status: 200,
        content_type: Some("text/css".to_string()),
        headers: HeaderMap::new(),
        body: b"opaque".to_vec(),
        kind: ResponseKind::Opaque,
      },
    );

    worker.revalidate(Request::get(url("/assets/index.css"))).await;

    let cached = storage.get("v3", url("/assets/index.css").as_str()).unwrap();
    assert_eq!(cached.unwrap().body, b"body{}");
  }

  #[tokio::test]
  async fn test_api_and_cross_origin_pass_through() {
    let (worker, fetcher, storage) = installed("v3").await;
    fetcher.serve(url("/api/orders").as_str(), "application/json", "[]");
    fetcher.serve("https://cdn.example.com/lib.js", "application/javascript", "lib");

    let api = worker
      .handle_fetch(Request::get(url("/api/orders")))
      .await
      .unwrap();
    assert_eq!(api.body, b"[]");

    let cdn = Url::parse("https://cdn.example.com/lib.js").unwrap();
    let lib = worker.handle_fetch(Request::get(cdn)).await.unwrap();
    assert_eq!(lib.body, b"lib");

    assert!(storage.get("v3", url("/api/orders").as_str()).unwrap().is_none());
    assert!(storage
      .get("v3", "https://cdn.example.com/lib.js")
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_non_get_is_never_cached() {
    let (worker, fetcher, storage) = installed("v3").await;
    fetcher.serve(url("/submit").as_str(), "text/plain", "ok");

    let mut request = Request::get(url("/submit"));
    request.method = Method::POST;
    let calls_before = fetcher.calls();
    worker.handle_fetch(request).await.unwrap();

    assert_eq!(fetcher.calls(), calls_before + 1);
    assert!(storage.get("v3", url("/submit").as_str()).unwrap().is_none());
  }
}
