/* src/server/core/rust/src/backend.rs */

use http::HeaderMap;
use serde_json::Value;

use crate::errors::LoaderError;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Headers copied from the page request onto backend calls so data is
/// fetched on behalf of the same user and tenant.
pub const FORWARDED_HEADERS: [&str; 3] = ["authorization", "cookie", TENANT_HEADER];

/// JSON client for the console's REST API.
#[derive(Debug, Clone)]
pub struct BackendClient {
  http: reqwest::Client,
  base_url: Option<String>,
}

impl BackendClient {
  pub fn new(base_url: impl Into<String>) -> Self {
    let base = base_url.into().trim_end_matches('/').to_string();
    Self { http: reqwest::Client::new(), base_url: Some(base) }
  }

  /// A client with no API configured; every call fails fast.
  pub fn unconfigured() -> Self {
    Self { http: reqwest::Client::new(), base_url: None }
  }

  pub fn base_url(&self) -> Option<&str> {
    self.base_url.as_deref()
  }

  pub fn url(&self, path: &str) -> Option<String> {
    let base = self.base_url.as_deref()?;
    Some(format!("{base}/{}", path.trim_start_matches('/')))
  }

  /// `GET {base}/{path}` and decode the body as JSON.
  pub async fn get_json(&self, path: &str, inbound: &HeaderMap) -> Result<Value, LoaderError> {
    let url =
      self.url(path).ok_or_else(|| LoaderError::Failed("backend API URL not configured".into()))?;

    let mut req = self.http.get(&url);
    for name in FORWARDED_HEADERS {
      for value in inbound.get_all(name) {
        req = req.header(name, value.clone());
      }
    }

    let resp = req.send().await.map_err(|source| LoaderError::Request { url: url.clone(), source })?;
    let status = resp.status();
    if !status.is_success() {
      return Err(LoaderError::Status { status: status.as_u16(), url });
    }
    resp.json::<Value>().await.map_err(|source| LoaderError::Decode { url, source })
  }
}

#[cfg(test)]
mod tests {
  use axum::Router;
  use axum::http::{HeaderValue, StatusCode};
  use axum::routing::get;
  use http::header::AUTHORIZATION;
  use serde_json::json;

  use super::*;

  async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
  }

  #[test]
  fn joins_base_and_path() {
    let client = BackendClient::new("http://api.local/v1/");
    assert_eq!(client.url("/users/me").as_deref(), Some("http://api.local/v1/users/me"));
    assert_eq!(BackendClient::unconfigured().url("x"), None);
  }

  #[tokio::test]
  async fn forwards_auth_and_tenant_headers() {
    let router = Router::new().route(
      "/echo",
      get(|headers: axum::http::HeaderMap| async move {
        axum::Json(json!({
          "auth": headers.get("authorization").and_then(|v| v.to_str().ok()),
          "tenant": headers.get("x-tenant-id").and_then(|v| v.to_str().ok()),
          "other": headers.get("x-other").and_then(|v| v.to_str().ok()),
        }))
      }),
    );
    let client = BackendClient::new(spawn_backend(router).await);

    let mut inbound = HeaderMap::new();
    inbound.insert(AUTHORIZATION, HeaderValue::from_static("Bearer t0k"));
    inbound.insert(TENANT_HEADER, HeaderValue::from_static("acme"));
    inbound.insert("x-other", HeaderValue::from_static("dropped"));

    let body = client.get_json("/echo", &inbound).await.unwrap();
    assert_eq!(body, json!({"auth": "Bearer t0k", "tenant": "acme", "other": null}));
  }

  #[tokio::test]
  async fn non_success_status_is_an_error() {
    let router = Router::new().route("/gone", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let client = BackendClient::new(spawn_backend(router).await);
    let err = client.get_json("gone", &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, LoaderError::Status { status: 503, .. }));
  }

  #[tokio::test]
  async fn unconfigured_fails_without_network() {
    let err = BackendClient::unconfigured().get_json("x", &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, LoaderError::Failed(_)));
  }
}
