/* src/server/core/rust/src/loader.rs */

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use http::HeaderMap;
use serde_json::Value;
use tokio::task::JoinSet;

use crate::backend::BackendClient;
use crate::cache::CacheKey;
use crate::context::{RequestContext, RequestInfo};
use crate::errors::{LoaderError, report_chain};
use crate::route::MatchedRoute;

pub const DEFAULT_LOADER_TIMEOUT: Duration = Duration::from_secs(3);

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub type MatchFn = Arc<dyn Fn(&LoaderRequest<'_>) -> bool + Send + Sync>;
pub type ParamsFn = Arc<dyn Fn(&LoaderRequest<'_>) -> Value + Send + Sync>;
pub type LoaderFn = Arc<dyn Fn(LoaderContext) -> BoxFuture<Result<Value, LoaderError>> + Send + Sync>;

/// Read-only view handed to `matches` and `params` predicates.
pub struct LoaderRequest<'a> {
  pub info: &'a RequestInfo,
  pub matched: &'a [MatchedRoute],
}

impl LoaderRequest<'_> {
  /// Whether any matched route lists `name` among its loader hints.
  pub fn hinted(&self, name: &str) -> bool {
    self.matched.iter().any(|m| m.loaders.iter().any(|l| l == name))
  }

  /// Route parameter from the deepest matched segment.
  pub fn param(&self, name: &str) -> Option<&str> {
    self.matched.last()?.params.get(name).map(String::as_str)
  }
}

/// Everything a running loader may touch.
pub struct LoaderContext {
  pub name: String,
  pub url: String,
  pub params: Value,
  pub route_params: HashMap<String, String>,
  pub headers: HeaderMap,
  pub backend: BackendClient,
}

impl LoaderContext {
  /// Backend GET on behalf of the requesting user.
  pub async fn get_json(&self, path: &str) -> Result<Value, LoaderError> {
    self.backend.get_json(path, &self.headers).await
  }
}

#[derive(Clone)]
pub struct LoaderDef {
  pub name: String,
  pub matches: MatchFn,
  pub params: ParamsFn,
  pub handler: LoaderFn,
}

impl LoaderDef {
  /// A loader that runs whenever a matched route hints its name.
  pub fn new<F, Fut>(name: &str, handler: F) -> Self
  where
    F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, LoaderError>> + Send + 'static,
  {
    let hint = name.to_string();
    Self {
      name: name.to_string(),
      matches: Arc::new(move |req: &LoaderRequest<'_>| req.hinted(&hint)),
      params: Arc::new(|_: &LoaderRequest<'_>| Value::Null),
      handler: Arc::new(move |ctx: LoaderContext| -> BoxFuture<Result<Value, LoaderError>> {
        Box::pin(handler(ctx))
      }),
    }
  }

  /// Replace the applicability predicate.
  pub fn when<F>(mut self, matches: F) -> Self
  where
    F: Fn(&LoaderRequest<'_>) -> bool + Send + Sync + 'static,
  {
    self.matches = Arc::new(matches);
    self
  }

  /// Derive the parameters that go into the cache key.
  pub fn keyed<F>(mut self, params: F) -> Self
  where
    F: Fn(&LoaderRequest<'_>) -> Value + Send + Sync + 'static,
  {
    self.params = Arc::new(params);
    self
  }
}

impl std::fmt::Debug for LoaderDef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoaderDef").field("name", &self.name).finish_non_exhaustive()
  }
}

/// Outcome of one `run_loaders` call, in registration order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoaderReport {
  pub resolved: Vec<CacheKey>,
  pub failed: Vec<(CacheKey, String)>,
}

#[derive(Debug, Clone)]
pub struct LoaderRegistry {
  loaders: Vec<LoaderDef>,
  timeout: Duration,
  backend: BackendClient,
}

impl LoaderRegistry {
  pub fn new(backend: BackendClient) -> Self {
    Self { loaders: Vec::new(), timeout: DEFAULT_LOADER_TIMEOUT, backend }
  }

  pub fn loader(mut self, def: LoaderDef) -> Self {
    self.loaders.push(def);
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.loaders.iter().map(|l| l.name.as_str())
  }

  /// Run every applicable loader concurrently and settle one cache entry
  /// per loader. Failures of any kind are logged and recorded as `Error`
  /// entries; this never fails as a whole.
  pub async fn run_loaders(&self, ctx: &mut RequestContext, matched: &[MatchedRoute]) -> LoaderReport {
    let req = LoaderRequest { info: &ctx.info, matched };
    let mut dispatch = Vec::new();
    for (idx, loader) in self.loaders.iter().enumerate() {
      if !(loader.matches)(&req) {
        continue;
      }
      let params = (loader.params)(&req);
      let key = CacheKey::with_params(&loader.name, &params);
      let lctx = LoaderContext {
        name: loader.name.clone(),
        url: ctx.info.url.clone(),
        params,
        route_params: matched.last().map(|m| m.params.clone()).unwrap_or_default(),
        headers: ctx.info.headers.clone(),
        backend: self.backend.clone(),
      };
      dispatch.push((idx, key, lctx));
    }

    let mut join_set = JoinSet::new();
    for (idx, key, lctx) in dispatch {
      if let Err(err) = ctx.cache.mark_pending(&key) {
        tracing::warn!(request_id = %ctx.request_id, loader = %lctx.name, %err, "loader skipped");
        continue;
      }
      let handler = self.loaders[idx].handler.clone();
      let timeout = self.timeout;
      join_set.spawn(async move {
        let started = Instant::now();
        let run = AssertUnwindSafe(async move { handler(lctx).await }).catch_unwind();
        let outcome = match tokio::time::timeout(timeout, run).await {
          Err(_) => Err(LoaderError::Timeout(timeout)),
          Ok(Err(panic)) => Err(LoaderError::Panicked(panic_message(panic.as_ref()))),
          Ok(Ok(result)) => result,
        };
        (idx, key, outcome, started.elapsed())
      });
    }

    let mut settled = Vec::new();
    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok(done) => settled.push(done),
        // Only reachable on runtime shutdown; the key stays pending and
        // freezes into an error.
        Err(err) => tracing::warn!(request_id = %ctx.request_id, %err, "loader task lost"),
      }
    }
    settled.sort_by_key(|(idx, ..)| *idx);

    let mut report = LoaderReport::default();
    for (idx, key, outcome, elapsed) in settled {
      let name = &self.loaders[idx].name;
      let elapsed_ms = elapsed.as_millis() as u64;
      let write = match outcome {
        Ok(value) => {
          tracing::debug!(request_id = %ctx.request_id, loader = %name, elapsed_ms, "loader resolved");
          report.resolved.push(key.clone());
          ctx.cache.resolve(&key, value)
        }
        Err(err) => {
          let reason = report_chain(&err, ": ");
          tracing::warn!(
            request_id = %ctx.request_id,
            loader = %name,
            elapsed_ms,
            reason = %reason,
            "loader failed"
          );
          report.failed.push((key.clone(), reason.clone()));
          ctx.cache.fail(&key, reason)
        }
      };
      if let Err(err) = write {
        tracing::warn!(request_id = %ctx.request_id, loader = %name, %err, "rejected cache write");
      }
    }
    report
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}
