/* src/server/core/rust/src/lib.rs */

pub mod abort;
pub mod assemble;
pub mod backend;
pub mod cache;
pub mod context;
pub mod deadline;
pub mod entry;
pub mod environment;
pub mod errors;
pub mod loader;
pub mod pipeline;
pub mod providers;
pub mod render;
pub mod route;
pub mod tree;

// Re-exports for ergonomic use
pub use abort::{AbortHandle, AbortSignal, abort_pair};
pub use assemble::{AssembleOptions, AssembledResponse, BodyStream, HTML_CONTENT_TYPE, assemble};
pub use backend::BackendClient;
pub use cache::{CacheEntry, CacheKey, DataCache, FrozenCache};
pub use context::{RequestContext, RequestInfo};
pub use deadline::{DEFAULT_RENDER_DEADLINE, DeadlineGuard};
pub use entry::{AppEntry, CreatedApp, PageFn, PageRegistry, RenderEntry, ScopedFuture};
pub use environment::{
  DevEnvironment, EntryFactory, EnvironmentConfig, ProdEnvironment, RenderEnvironment, RenderMode,
  StaticMount, select_environment,
};
pub use errors::{LoaderError, RenderError, SsrError};
pub use loader::{
  BoxFuture, DEFAULT_LOADER_TIMEOUT, LoaderContext, LoaderDef, LoaderRegistry, LoaderReport,
  LoaderRequest,
};
pub use pipeline::{SsrContext, SsrOptions};
pub use providers::{App, RenderScope, Session, Theme, wrap_providers};
pub use render::{RenderEvent, RenderHandle, RenderPhase, render};
pub use route::{MatchedRoute, RouteDef, RouteTable, match_routes};
pub use tree::{Element, Node};
