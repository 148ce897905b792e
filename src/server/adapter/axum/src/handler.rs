/* src/server/adapter/axum/src/handler.rs */

use axum::extract::State;
use axum::http::header::ALLOW;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use warden_ssr::{RequestInfo, SsrContext};

use crate::response::{PageError, page_response};

/// Catch-all page handler: every path not claimed by a static mount.
pub(crate) async fn render_page(
  State(ssr): State<SsrContext>,
  method: Method,
  uri: Uri,
  headers: HeaderMap,
) -> Response {
  if method != Method::GET && method != Method::HEAD {
    return (StatusCode::METHOD_NOT_ALLOWED, [(ALLOW, "GET, HEAD")]).into_response();
  }

  let url = uri.path_and_query().map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
  match ssr.handle(RequestInfo::new(&url, headers)).await {
    Ok(resp) => page_response(resp, method == Method::HEAD),
    Err(err) => {
      let body = ssr.error_body(&err);
      PageError { err, body }.into_response()
    }
  }
}
