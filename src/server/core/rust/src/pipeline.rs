/* src/server/core/rust/src/pipeline.rs */

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;
use warden_injector::{DEFAULT_MOUNT_MARKER, DEFAULT_STATE_GLOBAL, escape_html};

use crate::abort::AbortHandle;
use crate::assemble::{AssembleOptions, AssembledResponse, assemble};
use crate::context::{RequestContext, RequestInfo};
use crate::deadline::{DEFAULT_RENDER_DEADLINE, DeadlineGuard};
use crate::environment::{RenderEnvironment, RenderMode};
use crate::errors::SsrError;
use crate::render::render;

#[derive(Debug, Clone)]
pub struct SsrOptions {
  pub render_deadline: Duration,
  pub marker: String,
  pub state_global: String,
}

impl Default for SsrOptions {
  fn default() -> Self {
    Self {
      render_deadline: DEFAULT_RENDER_DEADLINE,
      marker: DEFAULT_MOUNT_MARKER.to_string(),
      state_global: DEFAULT_STATE_GLOBAL.to_string(),
    }
  }
}

/// Immutable server context shared by every request handler.
#[derive(Clone)]
pub struct SsrContext {
  env: Arc<dyn RenderEnvironment>,
  options: Arc<SsrOptions>,
}

impl SsrContext {
  pub fn new(env: Arc<dyn RenderEnvironment>, options: SsrOptions) -> Self {
    Self { env, options: Arc::new(options) }
  }

  pub fn mode(&self) -> RenderMode {
    self.env.mode()
  }

  pub fn environment(&self) -> &Arc<dyn RenderEnvironment> {
    &self.env
  }

  pub fn options(&self) -> &SsrOptions {
    &self.options
  }

  /// Render one page request. `Err` means nothing has been written yet and
  /// the caller should answer with [`SsrContext::error_body`].
  pub async fn handle(&self, info: RequestInfo) -> Result<AssembledResponse, SsrError> {
    let ctx = RequestContext::new(info);
    let span = tracing::info_span!("ssr", request_id = %ctx.request_id, path = %ctx.info.path);
    self.run(ctx).instrument(span).await
  }

  async fn run(&self, ctx: RequestContext) -> Result<AssembledResponse, SsrError> {
    let started = Instant::now();
    let request_id = ctx.request_id.clone();
    let streaming = ctx.streaming_flag();
    let budget = self.options.render_deadline;

    let abort = AbortHandle::new();
    let guard = DeadlineGuard::arm(budget, abort.clone());
    let mut signal = abort.signal();

    let outcome = async {
      let template = self.env.resolve_template().await?;
      let entry = self.env.resolve_entry()?;
      let created = tokio::select! {
        created = entry.create_app(ctx) => created?,
        () = signal.aborted() => return Err(SsrError::DeadlineExceeded(budget)),
      };

      let status = created.status;
      let handle = render(created.app, abort);
      let options = AssembleOptions {
        marker: self.options.marker.clone(),
        state_global: self.options.state_global.clone(),
        status,
        request_id: request_id.clone(),
        streaming,
        deadline: Some(guard),
      };
      assemble(&template, handle, created.data_cache, options).await
    }
    .await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
      Ok(resp) => tracing::info!(status = resp.status, elapsed_ms, "shell ready"),
      Err(err) => tracing::error!(code = err.code(), elapsed_ms, error = %err.report(), "page render failed"),
    }
    outcome
  }

  /// Body for a failed render: the error chain in development, a generic
  /// message in production.
  pub fn error_body(&self, err: &SsrError) -> String {
    match self.mode() {
      RenderMode::Development => format!(
        "<!DOCTYPE html><html><head><title>{code}</title></head><body><h1>{code}</h1><pre>{report}</pre></body></html>",
        code = err.code(),
        report = escape_html(&err.report()),
      ),
      RenderMode::Production => {
        "<!DOCTYPE html><html><head><title>Server error</title></head><body><h1>Internal Server Error</h1></body></html>".to_string()
      }
    }
  }
}

impl std::fmt::Debug for SsrContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SsrContext").field("mode", &self.mode()).field("options", &self.options).finish()
  }
}
