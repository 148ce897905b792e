/* src/server/core/rust/src/assemble.rs */

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use warden_injector::{DEFAULT_MOUNT_MARKER, DEFAULT_STATE_GLOBAL, PageTemplate, state_script};

use crate::cache::FrozenCache;
use crate::deadline::DeadlineGuard;
use crate::errors::{RenderError, SsrError};
use crate::render::{RenderEvent, RenderHandle};

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

#[derive(Debug)]
pub struct AssembleOptions {
  pub marker: String,
  pub state_global: String,
  /// Status sent once the shell is ready.
  pub status: u16,
  pub request_id: String,
  /// Set when the first body byte is produced.
  pub streaming: Arc<AtomicBool>,
  /// Moved into the body so the timer lives exactly as long as the response.
  pub deadline: Option<DeadlineGuard>,
}

impl Default for AssembleOptions {
  fn default() -> Self {
    Self {
      marker: DEFAULT_MOUNT_MARKER.to_string(),
      state_global: DEFAULT_STATE_GLOBAL.to_string(),
      status: 200,
      request_id: String::new(),
      streaming: Arc::default(),
      deadline: None,
    }
  }
}

pub struct AssembledResponse {
  pub status: u16,
  pub body: BodyStream,
}

impl std::fmt::Debug for AssembledResponse {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AssembledResponse").field("status", &self.status).finish_non_exhaustive()
  }
}

impl AssembledResponse {
  /// Drain the body into a string. Meant for tests and tooling.
  pub async fn into_string(mut self) -> Result<String, io::Error> {
    let mut out = Vec::new();
    while let Some(chunk) = self.body.next().await {
      out.extend_from_slice(&chunk?);
    }
    String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
  }
}

/// Splice a render between the template's head and tail.
///
/// Waits for the first render event so the status is known before any byte
/// is produced. Everything after `ShellReady` is streamed; the document is
/// always closed, whether the render completes, aborts, or vanishes.
pub async fn assemble(
  template_html: &str,
  mut handle: RenderHandle,
  cache: FrozenCache,
  options: AssembleOptions,
) -> Result<AssembledResponse, SsrError> {
  let template = match PageTemplate::parse(template_html, &options.marker) {
    Ok(t) => t,
    Err(err) => {
      handle.abort();
      return Err(err.into());
    }
  };

  let shell = match handle.next_event().await {
    Some(RenderEvent::ShellReady(shell)) => shell,
    Some(RenderEvent::ShellError(RenderError::Aborted)) => {
      return Err(match &options.deadline {
        Some(guard) if guard.is_expired() => SsrError::DeadlineExceeded(guard.budget()),
        _ => SsrError::Shell(RenderError::Aborted),
      });
    }
    Some(RenderEvent::ShellError(err)) => return Err(SsrError::Shell(err)),
    Some(other) => {
      tracing::error!(request_id = %options.request_id, event = ?other, "render began without a shell");
      handle.abort();
      return Err(SsrError::Shell(RenderError::Crashed));
    }
    None => return Err(SsrError::Shell(RenderError::Crashed)),
  };

  let AssembleOptions { state_global, status, request_id, streaming, deadline, .. } = options;

  let body = async_stream::stream! {
    let _deadline = deadline;
    let mut opening = template.opening().into_bytes();
    opening.extend_from_slice(&shell);
    streaming.store(true, Ordering::Release);
    yield Ok(Bytes::from(opening));

    loop {
      match handle.next_event().await {
        Some(RenderEvent::Chunk(chunk)) => yield Ok(chunk),
        Some(RenderEvent::Error(err)) => {
          tracing::debug!(request_id = %request_id, error = %err, "streaming past boundary error");
        }
        Some(RenderEvent::AllReady) => break,
        Some(RenderEvent::Aborted) => {
          tracing::warn!(request_id = %request_id, "render aborted mid-stream, closing document");
          break;
        }
        Some(RenderEvent::ShellError(err)) => {
          tracing::error!(request_id = %request_id, error = %err, "shell error after bytes were sent");
          yield Err(io::Error::other(err));
          return;
        }
        Some(RenderEvent::ShellReady(_)) => {
          tracing::debug!(request_id = %request_id, "ignored duplicate shell");
        }
        None => {
          tracing::warn!(request_id = %request_id, "render ended without a terminal event");
          break;
        }
      }
    }

    let script = state_script(&state_global, &cache.dehydrate());
    yield Ok(Bytes::from(template.closing(&script)));
  };

  Ok(AssembledResponse { status, body: Box::pin(body) })
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use serde_json::json;
  use tokio::sync::mpsc;
  use warden_injector::extract_state;

  use super::*;
  use crate::abort::abort_pair;
  use crate::cache::{CacheKey, DataCache};
  use crate::providers::{App, RenderScope};
  use crate::render::render;
  use crate::tree::Node;

  const TEMPLATE: &str = "<!DOCTYPE html><html><head><title>Warden</title></head><body>\
    <div id=\"root\"></div><script type=\"module\" src=\"/assets/app.js\"></script></body></html>";
  const TAIL: &str = "<script type=\"module\" src=\"/assets/app.js\"></script></body></html>";

  fn cache(entries: &[(&str, serde_json::Value)]) -> FrozenCache {
    let mut cache = DataCache::new();
    for (name, value) in entries {
      let key = CacheKey::new(name);
      cache.mark_pending(&key).unwrap();
      cache.resolve(&key, value.clone()).unwrap();
    }
    cache.freeze()
  }

  fn start(root: Node) -> RenderHandle {
    let (abort, _) = abort_pair();
    render(App { root, scope: RenderScope::default() }, abort)
  }

  #[tokio::test]
  async fn stitches_head_shell_state_and_tail() {
    let handle = start(Node::el("h1").text("Dashboard").into());
    let resp = assemble(TEMPLATE, handle, cache(&[("a", json!(1))]), AssembleOptions::default())
      .await
      .unwrap();
    assert_eq!(resp.status, 200);
    let html = resp.into_string().await.unwrap();
    assert!(html.starts_with("<!DOCTYPE html><html><head><title>Warden</title></head><body>"));
    assert!(html.contains(
      "<div id=\"root\"><h1>Dashboard</h1></div><script>window.__WARDEN_STATE__={\"a\":1};</script>"
    ));
    assert!(html.ends_with(TAIL));
  }

  #[tokio::test]
  async fn declared_status_and_streaming_flag() {
    let streaming = Arc::new(AtomicBool::new(false));
    let options =
      AssembleOptions { status: 404, streaming: streaming.clone(), ..AssembleOptions::default() };
    let resp = assemble(TEMPLATE, start(Node::text("not found")), FrozenCache::default(), options)
      .await
      .unwrap();
    assert_eq!(resp.status, 404);
    assert!(!streaming.load(Ordering::Acquire));
    resp.into_string().await.unwrap();
    assert!(streaming.load(Ordering::Acquire));
  }

  #[tokio::test]
  async fn missing_marker_fails_before_any_byte() {
    let err = assemble(
      "<html><body></body></html>",
      start(Node::text("x")),
      FrozenCache::default(),
      AssembleOptions::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "TEMPLATE_ERROR");
  }

  #[tokio::test]
  async fn duplicated_marker_fails() {
    let html = "<div id=\"root\"></div><div id=\"root\"></div>";
    let err = assemble(html, start(Node::text("x")), FrozenCache::default(), AssembleOptions::default())
      .await
      .unwrap_err();
    assert!(matches!(err, SsrError::Template(_)));
  }

  #[tokio::test]
  async fn shell_error_is_a_clean_failure() {
    let root = Node::component("dashboard", |_| Err(RenderError::component("dashboard", "boom")));
    let err = assemble(TEMPLATE, start(root), FrozenCache::default(), AssembleOptions::default())
      .await
      .unwrap_err();
    assert_eq!(err.code(), "SHELL_ERROR");
  }

  #[tokio::test]
  async fn state_script_is_injection_safe() {
    let hostile = json!({"email": "</script><script>alert(1)</script>", "banner": "<!-- x -->"});
    let resp = assemble(
      TEMPLATE,
      start(Node::text("ok")),
      cache(&[("support-settings", hostile.clone())]),
      AssembleOptions::default(),
    )
    .await
    .unwrap();
    let html = resp.into_string().await.unwrap();
    let start = html.find("window.__WARDEN_STATE__=").unwrap();
    let end = start + html[start..].find(";</script>").unwrap();
    let payload = &html[start..end];
    assert!(!payload.contains('<'));
    assert!(!payload.contains("<!--"));
    assert_eq!(
      extract_state(&html, DEFAULT_STATE_GLOBAL),
      Some(json!({"support-settings": hostile}))
    );
  }

  #[tokio::test]
  async fn abort_mid_stream_still_closes_document() {
    let root = Node::suspense(Node::text("loading"), async {
      std::future::pending::<()>().await;
      Ok(Node::empty())
    });
    let (abort, _) = abort_pair();
    let handle = render(App { root, scope: RenderScope::default() }, abort.clone());
    let guard = DeadlineGuard::arm(Duration::from_millis(20), abort);
    let options = AssembleOptions { deadline: Some(guard), ..AssembleOptions::default() };
    let resp = assemble(TEMPLATE, handle, FrozenCache::default(), options).await.unwrap();
    let html = tokio::time::timeout(Duration::from_secs(2), resp.into_string())
      .await
      .unwrap()
      .unwrap();
    assert!(html.contains("$WX(\"B:0\")"));
    assert!(html.ends_with(TAIL));
  }

  #[tokio::test]
  async fn deadline_before_shell_reports_deadline() {
    let (abort, _) = abort_pair();
    let guard = DeadlineGuard::arm(Duration::from_millis(5), abort.clone());
    tokio::time::sleep(Duration::from_millis(30)).await;
    let handle = render(App { root: Node::text("late"), scope: RenderScope::default() }, abort);
    let options = AssembleOptions { deadline: Some(guard), ..AssembleOptions::default() };
    let err = assemble(TEMPLATE, handle, FrozenCache::default(), options).await.unwrap_err();
    assert!(matches!(err, SsrError::DeadlineExceeded(d) if d == Duration::from_millis(5)));
  }

  #[tokio::test]
  async fn vanished_render_task_terminates_document() {
    let (tx, rx) = mpsc::channel(4);
    let (abort, _) = abort_pair();
    tx.send(RenderEvent::ShellReady(Bytes::from_static(b"<p>shell</p>"))).await.unwrap();
    tx.send(RenderEvent::Chunk(Bytes::from_static(b"<i>more</i>"))).await.unwrap();
    drop(tx);
    let resp = assemble(
      TEMPLATE,
      RenderHandle::scripted(rx, abort),
      FrozenCache::default(),
      AssembleOptions::default(),
    )
    .await
    .unwrap();
    let html = resp.into_string().await.unwrap();
    assert!(html.contains("<div id=\"root\"><p>shell</p><i>more</i></div>"));
    assert!(html.ends_with(TAIL));
  }

  #[tokio::test]
  async fn shell_error_after_bytes_breaks_the_body() {
    let (tx, rx) = mpsc::channel(4);
    let (abort, _) = abort_pair();
    tx.send(RenderEvent::ShellReady(Bytes::from_static(b"<p>shell</p>"))).await.unwrap();
    tx.send(RenderEvent::ShellError(RenderError::Crashed)).await.unwrap();
    let resp = assemble(
      TEMPLATE,
      RenderHandle::scripted(rx, abort),
      FrozenCache::default(),
      AssembleOptions::default(),
    )
    .await
    .unwrap();
    let err = resp.into_string().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
  }
}
