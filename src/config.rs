use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::db;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  /// Order database file (defaults to $XDG_DATA_HOME/shop-order-tracker/orders.db)
  pub database_path: Option<PathBuf>,
  #[serde(default)]
  pub offline: OfflineConfig,
}

/// Settings for the offline cache proxy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
  /// Origin serving the web bundle
  pub origin: String,
  /// Address the proxy listens on
  pub listen: String,
  /// Cache bucket version tag; changing it replaces the cache on activation
  pub version: String,
  /// Paths fetched into the bucket on install
  pub precache: Vec<String>,
  pub offline_page: String,
  pub fallback_icon: String,
  /// Requests whose path contains this prefix are never cached
  pub api_prefix: String,
  /// How often `serve` re-reads the config looking for a new version
  pub update_interval_secs: u64,
  /// Cache database file (defaults to cache.db next to the order database)
  pub cache_path: Option<PathBuf>,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      origin: "http://localhost:5173".to_string(),
      listen: "127.0.0.1:4173".to_string(),
      version: "shop-order-tracker-v3".to_string(),
      precache: [
        "/",
        "/index.html",
        "/offline.html",
        "/manifest.json",
        "/icons/icon.svg",
        "/icons/icon-72x72.png",
        "/icons/icon-96x96.png",
        "/icons/icon-128x128.png",
        "/icons/icon-144x144.png",
        "/icons/icon-152x152.png",
        "/icons/icon-192x192.png",
        "/icons/icon-384x384.png",
        "/icons/icon-512x512.png",
        "/assets/index-CLaRkcQM.css",
        "/assets/index-CdjcC5ru.js",
      ]
      .iter()
      .map(|s| s.to_string())
      .collect(),
      offline_page: "/offline.html".to_string(),
      fallback_icon: "/icons/icon.svg".to_string(),
      api_prefix: "/api/".to_string(),
      update_interval_secs: 60 * 60,
      cache_path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shop-order-tracker.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shop-order-tracker/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  /// Path of the file `load` would read, if any
  pub fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shop-order-tracker.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shop-order-tracker").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  pub fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolved order database path
  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.database_path {
      Some(p) => Ok(p.clone()),
      None => db::Database::default_path(),
    }
  }

  /// Resolved cache database path
  pub fn cache_path(&self) -> Result<PathBuf> {
    if let Some(p) = &self.offline.cache_path {
      return Ok(p.clone());
    }
    let db_path = self.database_path()?;
    Ok(
      db_path
        .parent()
        .map(|dir| dir.join("cache.db"))
        .unwrap_or_else(|| PathBuf::from("cache.db")),
    )
  }
}
