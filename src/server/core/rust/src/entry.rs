/* src/server/core/rust/src/entry.rs */

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::cache::FrozenCache;
use crate::context::RequestContext;
use crate::errors::{RenderError, SsrError};
use crate::loader::LoaderRegistry;
use crate::providers::{App, RenderScope, wrap_providers};
use crate::route::{MatchedRoute, RouteTable, match_routes};
use crate::tree::Node;

pub type ScopedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A page or layout: renders itself around `outlet`, the already-composed
/// subtree of the next matched route (empty for leaves).
pub type PageFn = Arc<dyn Fn(&RenderScope, Node) -> Result<Node, RenderError> + Send + Sync>;

/// What an entry hands the pipeline for one request.
#[derive(Debug)]
pub struct CreatedApp {
  pub app: App,
  pub data_cache: FrozenCache,
  pub status: u16,
}

/// The boundary between application code and the pipeline.
pub trait RenderEntry: Send + Sync {
  fn create_app(&self, ctx: RequestContext) -> ScopedFuture<'_, Result<CreatedApp, SsrError>>;
}

#[derive(Clone, Default)]
pub struct PageRegistry {
  pages: HashMap<String, PageFn>,
  not_found: Option<PageFn>,
}

impl PageRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn page<F>(mut self, component: &str, render: F) -> Self
  where
    F: Fn(&RenderScope, Node) -> Result<Node, RenderError> + Send + Sync + 'static,
  {
    self.pages.insert(component.to_string(), Arc::new(render));
    self
  }

  pub fn not_found<F>(mut self, render: F) -> Self
  where
    F: Fn(&RenderScope, Node) -> Result<Node, RenderError> + Send + Sync + 'static,
  {
    self.not_found = Some(Arc::new(render));
    self
  }

  pub fn get(&self, component: &str) -> Option<&PageFn> {
    self.pages.get(component)
  }
}

impl std::fmt::Debug for PageRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut names: Vec<&str> = self.pages.keys().map(String::as_str).collect();
    names.sort_unstable();
    f.debug_struct("PageRegistry")
      .field("pages", &names)
      .field("not_found", &self.not_found.is_some())
      .finish()
  }
}

/// Standard entry: match routes, run loaders, freeze the cache, then
/// compose the matched pages into one tree, outermost layout first.
#[derive(Debug, Clone)]
pub struct AppEntry {
  routes: RouteTable,
  loaders: LoaderRegistry,
  pages: PageRegistry,
}

impl AppEntry {
  pub fn new(routes: RouteTable, loaders: LoaderRegistry, pages: PageRegistry) -> Self {
    Self { routes, loaders, pages }
  }

  fn compose(&self, matched: &[MatchedRoute]) -> Result<Node, SsrError> {
    let mut outlet = Node::empty();
    for route in matched.iter().rev() {
      let page = self
        .pages
        .get(&route.component)
        .cloned()
        .ok_or_else(|| SsrError::UnknownComponent(route.component.clone()))?;
      let inner = outlet;
      outlet = Node::component(&route.component, move |scope| page(scope, inner));
    }
    Ok(outlet)
  }

  fn not_found(&self) -> Node {
    match self.pages.not_found.clone() {
      Some(page) => Node::component("not-found", move |scope| page(scope, Node::empty())),
      None => Node::el("main").child(Node::el("h1").text("Page not found")).into(),
    }
  }
}

impl RenderEntry for AppEntry {
  fn create_app(&self, mut ctx: RequestContext) -> ScopedFuture<'_, Result<CreatedApp, SsrError>> {
    Box::pin(async move {
      let matched = match_routes(&ctx.info.path, &self.routes);
      let report = self.loaders.run_loaders(&mut ctx, &matched).await;
      tracing::debug!(
        request_id = %ctx.request_id,
        matched = matched.len(),
        resolved = report.resolved.len(),
        failed = report.failed.len(),
        "loaders settled"
      );

      let RequestContext { request_id, info, cache, .. } = ctx;
      let cache = cache.freeze();

      let (root, status) = if matched.is_empty() {
        (self.not_found(), 404)
      } else {
        (self.compose(&matched)?, 200)
      };
      let params = matched.last().map(|m| m.params.clone()).unwrap_or_default();
      let app = wrap_providers(root, &request_id, &info, params, cache.clone());
      Ok(CreatedApp { app, data_cache: cache, status })
    })
  }
}
