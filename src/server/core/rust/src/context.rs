/* src/server/core/rust/src/context.rs */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::HeaderMap;
use http::header::COOKIE;

use crate::cache::DataCache;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What the pipeline knows about an inbound page request.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
  /// Path plus query, as requested.
  pub url: String,
  pub path: String,
  pub query: Option<String>,
  pub headers: HeaderMap,
}

impl RequestInfo {
  pub fn new(url: &str, headers: HeaderMap) -> Self {
    let (path, query) = match url.split_once('?') {
      Some((p, q)) => (p, Some(q.to_string())),
      None => (url, None),
    };
    let path = if path.is_empty() { "/".to_string() } else { path.to_string() };
    Self { url: url.to_string(), path, query, headers }
  }

  /// Header value as a string; non-UTF-8 values read as absent.
  pub fn header(&self, name: &str) -> Option<&str> {
    self.headers.get(name).and_then(|v| v.to_str().ok())
  }

  /// First value of `name` in the query string, undecoded.
  pub fn query_param(&self, name: &str) -> Option<&str> {
    query_value(self.query.as_deref(), name)
  }

  pub fn cookie(&self, name: &str) -> Option<&str> {
    self
      .headers
      .get_all(COOKIE)
      .iter()
      .filter_map(|v| v.to_str().ok())
      .flat_map(|v| v.split(';'))
      .filter_map(|pair| pair.trim().split_once('='))
      .find(|(k, _)| *k == name)
      .map(|(_, v)| v)
  }
}

pub(crate) fn query_value<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
  query?.split('&').filter_map(|pair| pair.split_once('=')).find(|(k, _)| *k == name).map(|(_, v)| v)
}

/// Per-request state owned by the handling task.
#[derive(Debug)]
pub struct RequestContext {
  pub request_id: String,
  pub info: RequestInfo,
  pub cache: DataCache,
  streaming: Arc<AtomicBool>,
}

impl RequestContext {
  pub fn new(info: RequestInfo) -> Self {
    let request_id = info
      .header(REQUEST_ID_HEADER)
      .filter(|id| !id.is_empty())
      .map(str::to_string)
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    Self { request_id, info, cache: DataCache::new(), streaming: Arc::new(AtomicBool::new(false)) }
  }

  /// Set once the first body byte is handed to the transport.
  pub fn streaming_flag(&self) -> Arc<AtomicBool> {
    self.streaming.clone()
  }

  pub fn is_streaming(&self) -> bool {
    self.streaming.load(Ordering::Acquire)
  }
}
