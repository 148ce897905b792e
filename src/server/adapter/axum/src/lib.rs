/* src/server/adapter/axum/src/lib.rs */

mod assets;
mod handler;
mod response;
mod serve;

use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use warden_ssr::SsrContext;

/// Re-export warden-ssr core for convenience
pub use warden_ssr;

pub use serve::{TlsPaths, load_tls, serve};

/// Extension trait that converts an `SsrContext` into an Axum router.
pub trait IntoAxumRouter {
  fn into_axum_router(self) -> axum::Router;
}

impl IntoAxumRouter for SsrContext {
  fn into_axum_router(self) -> axum::Router {
    let mounts = self.environment().static_mounts();
    assets::mount_static(axum::Router::new(), &mounts)
      .fallback(handler::render_page)
      .with_state(self)
      .layer(CatchPanicLayer::new())
      .layer(TraceLayer::new_for_http())
  }
}
