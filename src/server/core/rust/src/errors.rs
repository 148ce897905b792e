/* src/server/core/rust/src/errors.rs */

use std::path::PathBuf;
use std::time::Duration;

use warden_injector::TemplateError;

/// Request-level failures. Every variant ends the request with a 500 before
/// any page byte is written; post-shell problems are [`RenderError`]s that
/// travel inside the stream instead.
#[derive(Debug, thiserror::Error)]
pub enum SsrError {
  #[error("invalid page template: {0}")]
  Template(#[from] TemplateError),

  #[error("failed to read page template {}", path.display())]
  TemplateIo {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("render entry unavailable: {0}")]
  Entry(String),

  #[error("unknown page component `{0}`")]
  UnknownComponent(String),

  #[error("shell render failed")]
  Shell(#[source] RenderError),

  #[error("render deadline of {}ms exceeded before the shell was ready", .0.as_millis())]
  DeadlineExceeded(Duration),
}

impl SsrError {
  pub fn code(&self) -> &'static str {
    match self {
      Self::Template(_) | Self::TemplateIo { .. } => "TEMPLATE_ERROR",
      Self::Entry(_) | Self::UnknownComponent(_) => "ENTRY_ERROR",
      Self::Shell(_) => "SHELL_ERROR",
      Self::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
    }
  }

  pub fn status(&self) -> u16 {
    500
  }

  /// Display of the error followed by its source chain, one cause per line.
  pub fn report(&self) -> String {
    report_chain(self, "\n  caused by: ")
  }
}

pub(crate) fn report_chain(err: &dyn std::error::Error, sep: &str) -> String {
  let mut out = err.to_string();
  let mut source = err.source();
  while let Some(cause) = source {
    out.push_str(sep);
    out.push_str(&cause.to_string());
    source = cause.source();
  }
  out
}

/// Failures raised while producing markup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
  #[error("component `{component}` failed: {message}")]
  Component { component: String, message: String },

  #[error("suspended boundary {id} failed: {message}")]
  Boundary { id: usize, message: String },

  #[error("render aborted")]
  Aborted,

  #[error("render task ended without completing")]
  Crashed,
}

impl RenderError {
  pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Component { component: component.into(), message: message.into() }
  }
}

/// Failures of a single data loader. Never fatal to the request.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
  #[error("backend request to {url} failed")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("backend answered {status} for {url}")]
  Status { status: u16, url: String },

  #[error("backend sent malformed JSON for {url}")]
  Decode {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("timed out after {}ms", .0.as_millis())]
  Timeout(Duration),

  #[error("loader panicked: {0}")]
  Panicked(String),

  #[error("{0}")]
  Failed(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_and_status() {
    let err = SsrError::Entry("boom".into());
    assert_eq!(err.code(), "ENTRY_ERROR");
    assert_eq!(err.status(), 500);
    assert_eq!(SsrError::DeadlineExceeded(Duration::from_secs(10)).code(), "DEADLINE_EXCEEDED");
  }

  #[test]
  fn template_error_converts() {
    let err: SsrError = TemplateError::MissingMarker { marker: "<div id=\"root\"></div>".into() }.into();
    assert_eq!(err.code(), "TEMPLATE_ERROR");
    assert!(err.to_string().contains("not found"));
  }

  #[test]
  fn report_walks_source_chain() {
    let err = SsrError::Shell(RenderError::component("dashboard", "settings missing"));
    let report = err.report();
    assert!(report.starts_with("shell render failed"));
    assert!(report.contains("caused by: component `dashboard` failed: settings missing"));
  }

  #[test]
  fn deadline_display() {
    let err = SsrError::DeadlineExceeded(Duration::from_millis(10_000));
    assert_eq!(err.to_string(), "render deadline of 10000ms exceeded before the shell was ready");
  }
}
