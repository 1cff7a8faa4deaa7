use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::fetcher::Fetcher;
use super::service::{CacheServiceHandle, ServiceStatus};
use super::storage::CacheStorage;
use super::worker::CacheWorker;
use crate::config::{Config, OfflineConfig};

/// Re-reads the configuration and registers a new worker when the cache
/// version or precache manifest changes.
pub struct UpdateChecker {
  config_path: Option<PathBuf>,
  current: OfflineConfig,
  storage: Arc<CacheStorage>,
  fetcher: Arc<dyn Fetcher>,
  handle: CacheServiceHandle,
}

impl UpdateChecker {
  pub fn new(
    config_path: Option<PathBuf>,
    current: OfflineConfig,
    storage: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    handle: CacheServiceHandle,
  ) -> Self {
    Self {
      config_path,
      current,
      storage,
      fetcher,
      handle,
    }
  }

  /// Check once. Returns true when a new worker was registered.
  ///
  /// With no worker in control (every install so far failed) the current
  /// configuration is installed again even if it did not change.
  pub async fn check(&mut self) -> Result<bool> {
    let mut latest = Config::load(self.config_path.as_deref())?.offline;
    // Addresses may have been overridden on the command line
    latest.origin = self.current.origin.clone();
    latest.listen = self.current.listen.clone();

    if worker_changed(&self.current, &latest) {
      info!(
        from = %self.current.version,
        to = %latest.version,
        "cache update found, registering worker"
      );
    } else if needs_retry(&self.handle.status().await?) {
      info!(version = %latest.version, "no active cache worker, retrying install");
    } else {
      debug!(version = %self.current.version, "no cache update");
      return Ok(false);
    }

    let worker = CacheWorker::new(latest.clone(), self.storage.clone(), self.fetcher.clone())?;
    self.handle.register(worker).await?;
    self.current = latest;
    Ok(true)
  }

  /// Check every `interval` until the service goes away.
  pub async fn run(mut self, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately
    ticker.tick().await;
    loop {
      ticker.tick().await;
      if let Err(e) = self.check().await {
        warn!(error = %e, "cache update check failed");
        if self.handle.status().await.is_err() {
          break;
        }
      }
    }
  }
}

fn worker_changed(current: &OfflineConfig, latest: &OfflineConfig) -> bool {
  current.version != latest.version || current.precache != latest.precache
}

fn needs_retry(status: &ServiceStatus) -> bool {
  status.active.is_none() && status.waiting.is_none() && status.installing.is_none()
}
