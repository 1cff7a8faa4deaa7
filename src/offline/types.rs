//! Request/response values exchanged with the cache worker.

use reqwest::header::{self, HeaderMap, HeaderName};
use reqwest::Method;
use serde::Serialize;
use url::Url;

/// How a request was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Full page load
  Navigate,
  /// Any subordinate fetch (assets, data)
  Subresource,
}

/// What the requester intends to do with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
  Document,
  Image,
  Style,
  Script,
  Other,
}

impl Destination {
  /// Map a `Sec-Fetch-Dest` header value
  pub fn from_fetch_dest(value: &str) -> Self {
    match value.trim().to_ascii_lowercase().as_str() {
      "document" | "iframe" | "frame" => Destination::Document,
      "image" => Destination::Image,
      "style" => Destination::Style,
      "script" | "worker" | "sharedworker" | "serviceworker" => Destination::Script,
      _ => Destination::Other,
    }
  }

  /// Guess from the file extension of a URL path
  pub fn from_path(path: &str) -> Self {
    let extension = path
      .rsplit('/')
      .next()
      .and_then(|name| name.rsplit_once('.'))
      .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
      Some("html") | Some("htm") => Destination::Document,
      Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("svg") | Some("webp")
      | Some("ico") => Destination::Image,
      Some("css") => Destination::Style,
      Some("js") | Some("mjs") => Destination::Script,
      _ => Destination::Other,
    }
  }
}

/// An outgoing fetch
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub mode: RequestMode,
  pub destination: Destination,
  /// End-to-end headers forwarded to the origin
  pub headers: HeaderMap,
  pub body: Vec<u8>,
}

impl Request {
  /// Plain GET for an asset, destination inferred from the path
  pub fn get(url: Url) -> Self {
    let destination = Destination::from_path(url.path());
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Subresource,
      destination,
      headers: HeaderMap::new(),
      body: Vec::new(),
    }
  }

  /// Page load
  pub fn navigate(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Navigate,
      destination: Destination::Document,
      headers: HeaderMap::new(),
      body: Vec::new(),
    }
  }

  /// Key under which responses to this request are cached (fragment stripped)
  pub fn cache_key(&self) -> String {
    cache_key(&self.url)
  }
}

/// Connection-level headers that must not be relayed by a proxy, plus the
/// ones the HTTP client sets itself
const HOP_BY_HOP: [HeaderName; 9] = [
  header::CONNECTION,
  header::HOST,
  header::CONTENT_LENGTH,
  header::TRANSFER_ENCODING,
  header::TE,
  header::TRAILER,
  header::UPGRADE,
  header::PROXY_AUTHORIZATION,
  header::PROXY_AUTHENTICATE,
];

/// Copy `headers` without hop-by-hop entries. Headers named by
/// `Connection` are dropped too, as is `Keep-Alive`.
pub fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
  let listed: Vec<String> = headers
    .get_all(header::CONNECTION)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(','))
    .map(|name| name.trim().to_ascii_lowercase())
    .collect();

  let mut out = HeaderMap::new();
  for (name, value) in headers {
    if HOP_BY_HOP.contains(name)
      || name.as_str() == "keep-alive"
      || listed.iter().any(|l| l == name.as_str())
    {
      continue;
    }
    out.append(name.clone(), value.clone());
  }
  out
}

pub fn cache_key(url: &Url) -> String {
  let mut url = url.clone();
  url.set_fragment(None);
  url.to_string()
}

/// Response classification, mirroring what a browser exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
  /// Same-origin network response
  Basic,
  /// Cross-origin response whose contents are not trusted for caching
  Opaque,
  /// Built locally as a fallback
  Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub content_type: Option<String>,
  /// Headers from the network; empty for cached and synthetic responses
  pub headers: HeaderMap,
  pub body: Vec<u8>,
  pub kind: ResponseKind,
}

impl Response {
  /// Empty 200 with the given content type
  pub fn empty(content_type: &str) -> Self {
    Self {
      status: 200,
      content_type: Some(content_type.to_string()),
      headers: HeaderMap::new(),
      body: Vec::new(),
      kind: ResponseKind::Synthetic,
    }
  }

  /// A complete, same-origin 200 that may overwrite a cache entry
  pub fn is_cacheable(&self) -> bool {
    self.status == 200 && self.kind == ResponseKind::Basic
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_destination_from_path() {
    assert_eq!(
      Destination::from_path("/assets/index-CLaRkcQM.css"),
      Destination::Style
    );
    assert_eq!(
      Destination::from_path("/assets/index-CdjcC5ru.js"),
      Destination::Script
    );
    assert_eq!(
      Destination::from_path("/icons/icon-192x192.png"),
      Destination::Image
    );
    assert_eq!(Destination::from_path("/offline.html"), Destination::Document);
    assert_eq!(Destination::from_path("/manifest.json"), Destination::Other);
    assert_eq!(Destination::from_path("/"), Destination::Other);
  }

  #[test]
  fn test_destination_from_fetch_dest() {
    assert_eq!(Destination::from_fetch_dest("image"), Destination::Image);
    assert_eq!(Destination::from_fetch_dest("Style"), Destination::Style);
    assert_eq!(Destination::from_fetch_dest("empty"), Destination::Other);
  }

  #[test]
  fn test_cache_key_strips_fragment() {
    let url = Url::parse("http://localhost:5173/index.html#top").unwrap();
    assert_eq!(cache_key(&url), "http://localhost:5173/index.html");
  }

  #[test]
  fn test_end_to_end_headers_drop_hop_by_hop() {
    let mut headers = HeaderMap::new();
    headers.insert(header::HOST, "localhost:4173".parse().unwrap());
    headers.insert(header::CONNECTION, "keep-alive, x-trace".parse().unwrap());
    headers.insert("keep-alive", "timeout=5".parse().unwrap());
    headers.insert("x-trace", "1".parse().unwrap());
    headers.insert(header::AUTHORIZATION, "Bearer t".parse().unwrap());
    headers.append(header::COOKIE, "a=1".parse().unwrap());
    headers.append(header::COOKIE, "b=2".parse().unwrap());

    let out = end_to_end_headers(&headers);

    assert_eq!(out.len(), 3);
    assert_eq!(out[header::AUTHORIZATION], "Bearer t");
    assert_eq!(out.get_all(header::COOKIE).iter().count(), 2);
    assert!(out.get("x-trace").is_none());
  }

  #[test]
  fn test_only_basic_200_is_cacheable() {
    let mut response = Response {
      status: 200,
      content_type: None,
      headers: HeaderMap::new(),
      body: b"ok".to_vec(),
      kind: ResponseKind::Basic,
    };
    assert!(response.is_cacheable());

    response.kind = ResponseKind::Opaque;
    assert!(!response.is_cacheable());

    response.kind = ResponseKind::Basic;
    response.status = 206;
    assert!(!response.is_cacheable());
  }
}
