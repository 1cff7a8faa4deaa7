//! Network access for the cache worker.

use async_trait::async_trait;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_TYPE};
use thiserror::Error;

use super::storage::StorageError;
use super::types::{end_to_end_headers, Request, Response, ResponseKind};

/// Errors surfaced by fetch handling
#[derive(Error, Debug)]
pub enum FetchError {
  /// The network request itself failed (offline, DNS, connection reset)
  #[error("network error: {0}")]
  Network(String),

  /// The network failed and there is no fallback for this request
  #[error("network request failed and no suitable fallback for {0}")]
  NoFallback(String),

  /// A precache response was not a 200
  #[error("precache of {url} returned status {status}")]
  BadStatus { url: String, status: u16 },

  #[error("invalid url: {0}")]
  InvalidUrl(#[from] url::ParseError),

  #[error("cache service stopped")]
  ServiceStopped,

  #[error(transparent)]
  Storage(#[from] StorageError),
}

/// Source of network responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Fetcher backed by `reqwest`.
#[derive(Clone, Default)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    // Leave content negotiation to the client so bodies arrive decoded
    let mut headers = end_to_end_headers(&request.headers);
    headers.remove(ACCEPT_ENCODING);

    let mut builder = self
      .client
      .request(request.method.clone(), request.url.clone())
      .headers(headers);
    if !request.body.is_empty() {
      builder = builder.body(request.body.clone());
    }

    let response = builder
      .send()
      .await
      .map_err(|e| FetchError::Network(e.to_string()))?;

    // A redirect to another origin yields a response we must not trust
    let kind = if response.url().origin() == request.url.origin() {
      ResponseKind::Basic
    } else {
      ResponseKind::Opaque
    };
    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let headers = end_to_end_headers(response.headers());
    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::Network(e.to_string()))?
      .to_vec();

    Ok(Response {
      status,
      content_type,
      headers,
      body,
      kind,
    })
  }
}
