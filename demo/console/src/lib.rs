/* demo/console/src/lib.rs */

pub mod config;
pub mod loaders;
pub mod pages;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use warden_ssr::{
  AppEntry, BackendClient, EntryFactory, EnvironmentConfig, RenderEntry, SsrContext, SsrError,
  SsrOptions, select_environment,
};

use crate::config::Launch;

/// Builds the console's render entry. Called once in production and on
/// every request in development.
pub fn entry_factory(backend: BackendClient, loader_timeout: Duration) -> EntryFactory {
  Arc::new(move || {
    let loaders = loaders::registry(backend.clone()).timeout(loader_timeout);
    let entry = AppEntry::new(routes::table(), loaders, pages::registry());
    Ok(Arc::new(entry) as Arc<dyn RenderEntry>)
  })
}

/// Select the render environment for `launch` and wrap it in the shared
/// server context.
pub async fn build_context(launch: &Launch) -> Result<SsrContext, SsrError> {
  let server = &launch.server;
  let backend = match &server.api_url {
    Some(url) => BackendClient::new(url.clone()),
    None => {
      tracing::warn!("WARDEN_API_URL is not set, data loaders will fail and pages render empty");
      BackendClient::unconfigured()
    }
  };

  let options = SsrOptions { render_deadline: server.render_deadline(), ..SsrOptions::default() };
  let env = select_environment(EnvironmentConfig {
    mode: launch.mode,
    dist_dir: server.dist_dir.clone(),
    client_dir: launch.client_dir.clone(),
    marker: options.marker.clone(),
    factory: entry_factory(backend, server.loader_timeout()),
  })
  .await?;

  Ok(SsrContext::new(env, options))
}
