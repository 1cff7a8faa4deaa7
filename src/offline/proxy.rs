//! Local HTTP front for the cache service.
//!
//! Every request not aimed at a control route is handed to the active worker.
//!
//! - POST /__worker/skip-waiting - promote the waiting worker
//! - GET /__worker/status - active/waiting worker as JSON

use axum::{
  body::{to_bytes, Body},
  extract::State,
  http::{header, HeaderMap, HeaderValue, Method, StatusCode},
  response::{IntoResponse, Json},
  routing::{get, post},
  Router,
};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

use super::fetcher::{FetchError, Fetcher, HttpFetcher};
use super::service::{CacheService, CacheServiceHandle};
use super::storage::CacheStorage;
use super::types::{end_to_end_headers, Destination, Request, RequestMode, Response};
use super::update::UpdateChecker;
use super::worker::CacheWorker;
use crate::config::OfflineConfig;

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct ProxyState {
  pub handle: CacheServiceHandle,
  pub origin: Url,
}

pub fn router(state: ProxyState) -> Router {
  Router::new()
    .route("/__worker/skip-waiting", post(skip_waiting))
    .route("/__worker/status", get(status))
    .fallback(forward)
    .with_state(state)
}

/// Run the proxy until Ctrl+C.
pub async fn serve(
  offline: OfflineConfig,
  cache_path: PathBuf,
  config_path: Option<PathBuf>,
) -> Result<()> {
  let storage = Arc::new(CacheStorage::open(&cache_path)?);
  let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new());
  let handle = CacheService::spawn(fetcher.clone());

  // Serve from the last complete install right away, then refresh it
  let restored = CacheWorker::new(offline.clone(), storage.clone(), fetcher.clone())?;
  handle.restore(restored).await?;
  let worker = CacheWorker::new(offline.clone(), storage.clone(), fetcher.clone())?;
  handle.register(worker).await?;

  let interval = Duration::from_secs(offline.update_interval_secs.max(1));
  let checker = UpdateChecker::new(
    config_path,
    offline.clone(),
    storage,
    fetcher,
    handle.clone(),
  );
  tokio::spawn(checker.run(interval));

  let origin = Url::parse(&offline.origin)?;
  let app = router(ProxyState { handle, origin });

  let listener = TcpListener::bind(&offline.listen)
    .await
    .map_err(|e| eyre!("Failed to bind {}: {}", offline.listen, e))?;
  info!(
    listen = %offline.listen,
    origin = %offline.origin,
    cache = %cache_path.display(),
    "offline proxy listening"
  );

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(error = %e, "failed to listen for Ctrl+C");
    std::future::pending::<()>().await;
  }
  info!("shutting down offline proxy");
}

async fn skip_waiting(State(state): State<ProxyState>) -> StatusCode {
  match state.handle.skip_waiting().await {
    Ok(()) => StatusCode::NO_CONTENT,
    Err(_) => StatusCode::SERVICE_UNAVAILABLE,
  }
}

async fn status(State(state): State<ProxyState>) -> axum::response::Response {
  match state.handle.status().await {
    Ok(status) => Json(status).into_response(),
    Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
  }
}

async fn forward(
  State(state): State<ProxyState>,
  request: axum::extract::Request,
) -> axum::response::Response {
  let (parts, body) = request.into_parts();
  let body = match to_bytes(body, MAX_BODY_BYTES).await {
    Ok(bytes) => bytes.to_vec(),
    Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
  };

  let path_and_query = parts
    .uri
    .path_and_query()
    .map(|pq| pq.as_str())
    .unwrap_or("/");
  let request = match to_cache_request(
    &state.origin,
    &parts.method,
    path_and_query,
    &parts.headers,
    body,
  ) {
    Ok(request) => request,
    Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
  };

  debug!(method = %request.method, url = %request.url, mode = ?request.mode, "proxy request");
  into_http_response(state.handle.fetch(request).await)
}

/// Build the worker's view of an incoming request.
pub fn to_cache_request(
  origin: &Url,
  method: &Method,
  path_and_query: &str,
  headers: &HeaderMap,
  body: Vec<u8>,
) -> Result<Request, FetchError> {
  let url = origin.join(path_and_query)?;

  let fetch_mode = header_str(headers, "sec-fetch-mode");
  let accepts_html = header_str(headers, header::ACCEPT.as_str())
    .map(|accept| accept.contains("text/html"))
    .unwrap_or(false);
  let navigate = match fetch_mode {
    Some(mode) => mode == "navigate",
    None => *method == Method::GET && accepts_html,
  };
  let mode = if navigate {
    RequestMode::Navigate
  } else {
    RequestMode::Subresource
  };

  let destination = match header_str(headers, "sec-fetch-dest") {
    Some(dest) => Destination::from_fetch_dest(dest),
    None if mode == RequestMode::Navigate => Destination::Document,
    None => Destination::from_path(url.path()),
  };

  Ok(Request {
    method: method.clone(),
    url,
    mode,
    destination,
    headers: end_to_end_headers(headers),
    body,
  })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers.get(name).and_then(|v| v.to_str().ok())
}

fn into_http_response(result: Result<Response, FetchError>) -> axum::response::Response {
  match result {
    Ok(response) => {
      let mut http = axum::http::Response::new(Body::from(response.body));
      *http.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
      *http.headers_mut() = response.headers;
      if let Some(content_type) = response
        .content_type
        .and_then(|v| HeaderValue::from_str(&v).ok())
      {
        http.headers_mut().insert(header::CONTENT_TYPE, content_type);
      }
      http
    }
    Err(e) => {
      debug!(error = %e, "proxy fetch failed");
      (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
    }
  }
}
