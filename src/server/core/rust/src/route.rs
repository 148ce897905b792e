/* src/server/core/rust/src/route.rs */

use std::cmp::Ordering;
use std::collections::HashMap;

use percent_encoding::percent_decode_str;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
  Static(String),
  Param(String),
  Splat(String),
}

impl Segment {
  fn parse(raw: &str) -> Self {
    if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
      if let Some(name) = inner.strip_prefix('*') {
        return Self::Splat(name.to_string());
      }
      return Self::Param(inner.to_string());
    }
    Self::Static(raw.to_string())
  }

  fn weight(&self) -> u8 {
    match self {
      Self::Static(_) => 3,
      Self::Param(_) => 2,
      Self::Splat(_) => 1,
    }
  }
}

fn split_path(path: &str) -> Vec<&str> {
  path.split('/').filter(|s| !s.is_empty()).collect()
}

/// One node of the static route tree.
///
/// Patterns use axum syntax relative to the parent: `dashboard`,
/// `modules/{id}`, `files/{*rest}`. An empty pattern marks an index route.
#[derive(Debug, Clone)]
pub struct RouteDef {
  pub pattern: String,
  pub component: String,
  /// Loaders this route asks for, by name.
  pub loaders: Vec<String>,
  pub children: Vec<RouteDef>,
  segments: Vec<Segment>,
}

impl RouteDef {
  pub fn new(pattern: &str, component: &str) -> Self {
    Self {
      pattern: pattern.trim_matches('/').to_string(),
      component: component.to_string(),
      loaders: Vec::new(),
      children: Vec::new(),
      segments: split_path(pattern).into_iter().map(Segment::parse).collect(),
    }
  }

  pub fn index(component: &str) -> Self {
    Self::new("", component)
  }

  pub fn loaders<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.loaders.extend(names.into_iter().map(Into::into));
    self
  }

  pub fn children(mut self, children: Vec<RouteDef>) -> Self {
    self.children = children;
    self
  }

  fn is_index(&self) -> bool {
    self.segments.is_empty()
  }

  /// Try to consume a prefix of `path`. Returns the number of segments used.
  fn consume(&self, path: &[&str], params: &mut HashMap<String, String>) -> Option<usize> {
    let mut used = 0;
    for seg in &self.segments {
      match seg {
        Segment::Static(s) => {
          if path.get(used)? != s {
            return None;
          }
          used += 1;
        }
        Segment::Param(name) => {
          let raw = path.get(used)?;
          params.insert(name.clone(), decode(raw));
          used += 1;
        }
        Segment::Splat(name) => {
          let rest: Vec<String> = path[used..].iter().map(|s| decode(s)).collect();
          params.insert(name.clone(), rest.join("/"));
          return Some(path.len());
        }
      }
    }
    Some(used)
  }
}

fn decode(raw: &str) -> String {
  percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Siblings sorted most specific first; ties keep registration order.
fn rank(a: &RouteDef, b: &RouteDef) -> Ordering {
  let wa = a.segments.iter().map(Segment::weight);
  let wb = b.segments.iter().map(Segment::weight);
  wb.cmp(wa)
}

fn sort_tree(routes: &mut [RouteDef]) {
  routes.sort_by(rank);
  for route in routes.iter_mut() {
    sort_tree(&mut route.children);
  }
}

/// A matched segment of the route tree, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
  /// Full pattern from the root, e.g. `/modules/{id}`.
  pub pattern: String,
  pub component: String,
  /// Parameters captured by this segment and its ancestors.
  pub params: HashMap<String, String>,
  pub loaders: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
  routes: Vec<RouteDef>,
}

impl RouteTable {
  pub fn new(mut routes: Vec<RouteDef>) -> Self {
    sort_tree(&mut routes);
    Self { routes }
  }

  pub fn routes(&self) -> &[RouteDef] {
    &self.routes
  }
}

/// Resolve `path` (query string allowed) against the route table.
///
/// Returns the matched branch from root to leaf, or an empty list when
/// nothing matches.
pub fn match_routes(path: &str, table: &RouteTable) -> Vec<MatchedRoute> {
  let path = path.split(['?', '#']).next().unwrap_or_default();
  let segments = split_path(path);
  match_level(&table.routes, &segments, "", &HashMap::new()).unwrap_or_default()
}

fn match_level(
  routes: &[RouteDef],
  path: &[&str],
  parent_pattern: &str,
  parent_params: &HashMap<String, String>,
) -> Option<Vec<MatchedRoute>> {
  for route in routes {
    let mut params = parent_params.clone();
    let Some(used) = route.consume(path, &mut params) else {
      continue;
    };
    let rest = &path[used..];

    let pattern = join_pattern(parent_pattern, &route.pattern);
    let matched = MatchedRoute {
      pattern: pattern.clone(),
      component: route.component.clone(),
      params: params.clone(),
      loaders: route.loaders.clone(),
    };

    if !route.children.is_empty() {
      if let Some(mut branch) = match_level(&route.children, rest, &pattern, &params) {
        branch.insert(0, matched);
        return Some(branch);
      }
    }

    if rest.is_empty() && (route.children.is_empty() || !route.is_index()) {
      return Some(vec![matched]);
    }
  }
  None
}

fn join_pattern(parent: &str, own: &str) -> String {
  let parent = parent.trim_end_matches('/');
  if own.is_empty() {
    if parent.is_empty() { "/".to_string() } else { parent.to_string() }
  } else {
    format!("{parent}/{own}")
  }
}
