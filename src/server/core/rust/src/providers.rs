/* src/server/core/rust/src/providers.rs */

use std::collections::HashMap;

use serde_json::Value;

use crate::backend::TENANT_HEADER;
use crate::cache::FrozenCache;
use crate::context::{RequestInfo, query_value};
use crate::tree::Node;

pub const THEME_COOKIE: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
  #[default]
  Light,
  Dark,
}

impl Theme {
  pub fn from_cookie(value: Option<&str>) -> Self {
    match value {
      Some(v) if v.eq_ignore_ascii_case("dark") => Self::Dark,
      _ => Self::Light,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Light => "light",
      Self::Dark => "dark",
    }
  }
}

/// Who the page is rendered for. Tokens are forwarded, never decoded here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
  #[default]
  Anonymous,
  Authenticated {
    tenant: Option<String>,
  },
}

impl Session {
  pub fn from_request(info: &RequestInfo) -> Self {
    let has_token = info.header("authorization").is_some_and(|v| !v.trim().is_empty());
    if !has_token {
      return Self::Anonymous;
    }
    Self::Authenticated { tenant: info.header(TENANT_HEADER).map(str::to_string) }
  }

  pub fn is_authenticated(&self) -> bool {
    matches!(self, Self::Authenticated { .. })
  }

  pub fn tenant(&self) -> Option<&str> {
    match self {
      Self::Authenticated { tenant } => tenant.as_deref(),
      Self::Anonymous => None,
    }
  }
}

/// Context every component reads synchronously while rendering.
#[derive(Debug, Clone, Default)]
pub struct RenderScope {
  pub request_id: String,
  pub path: String,
  pub query: Option<String>,
  pub params: HashMap<String, String>,
  pub theme: Theme,
  pub session: Session,
  pub cache: FrozenCache,
}

impl RenderScope {
  pub fn data(&self, key: &str) -> Option<&Value> {
    self.cache.value(key)
  }

  pub fn data_error(&self, key: &str) -> Option<&str> {
    self.cache.error(key)
  }

  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.get(name).map(String::as_str)
  }

  pub fn query_param(&self, name: &str) -> Option<&str> {
    query_value(self.query.as_deref(), name)
  }
}

/// A page tree together with the providers it renders under.
#[derive(Debug)]
pub struct App {
  pub root: Node,
  pub scope: RenderScope,
}

/// Seed theme, session and data providers from the request and wrap `root`.
pub fn wrap_providers(
  root: Node,
  request_id: &str,
  info: &RequestInfo,
  params: HashMap<String, String>,
  cache: FrozenCache,
) -> App {
  let scope = RenderScope {
    request_id: request_id.to_string(),
    path: info.path.clone(),
    query: info.query.clone(),
    params,
    theme: Theme::from_cookie(info.cookie(THEME_COOKIE)),
    session: Session::from_request(info),
    cache,
  };
  App { root, scope }
}
