/* src/server/adapter/axum/src/response.rs */

use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use warden_ssr::{AssembledResponse, HTML_CONTENT_TYPE, SsrError};

/// Newtype wrapper to implement `IntoResponse` for `SsrError`, carrying the
/// body already chosen for the current render mode.
pub(crate) struct PageError {
  pub err: SsrError,
  pub body: String,
}

impl IntoResponse for PageError {
  fn into_response(self) -> Response {
    let status =
      StatusCode::from_u16(self.err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(CONTENT_TYPE, HTML_CONTENT_TYPE)], self.body).into_response()
  }
}

/// Stream an assembled page. HEAD requests get the status and headers only.
pub(crate) fn page_response(resp: AssembledResponse, head_only: bool) -> Response {
  let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK);
  let body = if head_only { Body::empty() } else { Body::from_stream(resp.body) };
  (status, [(CONTENT_TYPE, HTML_CONTENT_TYPE)], body).into_response()
}
