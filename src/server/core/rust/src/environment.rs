/* src/server/core/rust/src/environment.rs */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use warden_injector::PageTemplate;

use crate::entry::{RenderEntry, ScopedFuture};
use crate::errors::SsrError;

pub const TEMPLATE_FILE: &str = "index.html";
pub const IMMUTABLE_YEAR: &str = "public, max-age=31536000, immutable";
pub const IMMUTABLE_HOUR: &str = "public, max-age=3600, immutable";
pub const NO_CACHE: &str = "no-cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
  Development,
  Production,
}

impl RenderMode {
  pub fn is_development(self) -> bool {
    self == Self::Development
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Development => "development",
      Self::Production => "production",
    }
  }
}

/// A directory served under a URL prefix with a fixed `Cache-Control`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMount {
  pub route: &'static str,
  pub dir: PathBuf,
  pub cache_control: &'static str,
}

pub type EntryFactory = Arc<dyn Fn() -> Result<Arc<dyn RenderEntry>, SsrError> + Send + Sync>;

/// Where templates, entries and assets come from.
pub trait RenderEnvironment: Send + Sync {
  fn mode(&self) -> RenderMode;
  fn resolve_template(&self) -> ScopedFuture<'_, Result<Arc<str>, SsrError>>;
  fn resolve_entry(&self) -> Result<Arc<dyn RenderEntry>, SsrError>;
  fn static_mounts(&self) -> Vec<StaticMount>;
}

async fn read_template(path: &Path) -> Result<Arc<str>, SsrError> {
  tokio::fs::read_to_string(path)
    .await
    .map(Arc::from)
    .map_err(|source| SsrError::TemplateIo { path: path.to_path_buf(), source })
}

/// Re-reads the template and rebuilds the entry on every request.
pub struct DevEnvironment {
  client_dir: PathBuf,
  dist_dir: PathBuf,
  factory: EntryFactory,
}

impl DevEnvironment {
  pub fn new(
    client_dir: impl Into<PathBuf>,
    dist_dir: impl Into<PathBuf>,
    factory: EntryFactory,
  ) -> Self {
    Self { client_dir: client_dir.into(), dist_dir: dist_dir.into(), factory }
  }
}

impl RenderEnvironment for DevEnvironment {
  fn mode(&self) -> RenderMode {
    RenderMode::Development
  }

  fn resolve_template(&self) -> ScopedFuture<'_, Result<Arc<str>, SsrError>> {
    let path = self.client_dir.join(TEMPLATE_FILE);
    Box::pin(async move { read_template(&path).await })
  }

  fn resolve_entry(&self) -> Result<Arc<dyn RenderEntry>, SsrError> {
    (self.factory)()
  }

  fn static_mounts(&self) -> Vec<StaticMount> {
    vec![
      StaticMount { route: "/assets", dir: self.client_dir.join("assets"), cache_control: NO_CACHE },
      StaticMount { route: "/remote", dir: self.dist_dir.join("remote"), cache_control: NO_CACHE },
    ]
  }
}

/// Template read and entry built once at startup, then shared read-only.
pub struct ProdEnvironment {
  dist_dir: PathBuf,
  template: Arc<str>,
  entry: Arc<dyn RenderEntry>,
}

impl ProdEnvironment {
  /// Load `dist_dir/index.html` and validate it against `marker` before
  /// serving anything.
  pub async fn load(
    dist_dir: impl Into<PathBuf>,
    marker: &str,
    factory: &EntryFactory,
  ) -> Result<Self, SsrError> {
    let dist_dir = dist_dir.into();
    let template = read_template(&dist_dir.join(TEMPLATE_FILE)).await?;
    PageTemplate::parse(&template, marker)?;
    let entry = factory()?;
    Ok(Self { dist_dir, template, entry })
  }
}

impl RenderEnvironment for ProdEnvironment {
  fn mode(&self) -> RenderMode {
    RenderMode::Production
  }

  fn resolve_template(&self) -> ScopedFuture<'_, Result<Arc<str>, SsrError>> {
    let template = self.template.clone();
    Box::pin(async move { Ok(template) })
  }

  fn resolve_entry(&self) -> Result<Arc<dyn RenderEntry>, SsrError> {
    Ok(self.entry.clone())
  }

  fn static_mounts(&self) -> Vec<StaticMount> {
    vec![
      StaticMount {
        route: "/assets",
        dir: self.dist_dir.join("assets"),
        cache_control: IMMUTABLE_YEAR,
      },
      StaticMount {
        route: "/remote",
        dir: self.dist_dir.join("remote"),
        cache_control: IMMUTABLE_HOUR,
      },
    ]
  }
}

#[derive(Clone)]
pub struct EnvironmentConfig {
  pub mode: RenderMode,
  /// Precompiled client output; templates come from here in production.
  pub dist_dir: PathBuf,
  /// Client source root; templates and assets come from here in development.
  pub client_dir: PathBuf,
  /// Mount marker the production template is validated against.
  pub marker: String,
  pub factory: EntryFactory,
}

/// Pick the environment once at startup.
pub async fn select_environment(
  config: EnvironmentConfig,
) -> Result<Arc<dyn RenderEnvironment>, SsrError> {
  tracing::info!(mode = config.mode.as_str(), dist_dir = %config.dist_dir.display(), "render environment");
  Ok(match config.mode {
    RenderMode::Development => {
      Arc::new(DevEnvironment::new(config.client_dir, config.dist_dir, config.factory))
    }
    RenderMode::Production => {
      let env = ProdEnvironment::load(config.dist_dir, &config.marker, &config.factory).await?;
      Arc::new(env)
    }
  })
}
