/* src/server/core/rust/src/cache.rs */

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Cache key derived from a loader name and its parameters.
///
/// Rendered as the bare name when there are no parameters, otherwise as
/// `name:<json>` with object keys sorted so equal parameters always produce
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn new(name: &str) -> Self {
    Self(name.to_string())
  }

  pub fn with_params(name: &str, params: &Value) -> Self {
    match params {
      Value::Null => Self::new(name),
      Value::Object(map) if map.is_empty() => Self::new(name),
      other => Self(format!("{name}:{}", canonical_json(other))),
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

fn canonical_json(value: &Value) -> String {
  fn sorted(value: &Value) -> Value {
    match value {
      Value::Object(map) => {
        let ordered: BTreeMap<&String, Value> = map.iter().map(|(k, v)| (k, sorted(v))).collect();
        Value::Object(ordered.into_iter().map(|(k, v)| (k.clone(), v)).collect())
      }
      Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
      other => other.clone(),
    }
  }
  sorted(value).to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
  Pending,
  Resolved(Value),
  Error(String),
}

impl CacheEntry {
  pub fn is_settled(&self) -> bool {
    !matches!(self, Self::Pending)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
  #[error("cache key `{0}` is already settled")]
  AlreadySettled(CacheKey),
  #[error("cache key `{0}` is already in flight")]
  AlreadyPending(CacheKey),
  #[error("cache key `{0}` was never marked pending")]
  NotPending(CacheKey),
}

/// Request-scoped data cache filled by the loaders.
///
/// Every key moves `Pending -> Resolved | Error` exactly once. The cache is
/// frozen before rendering starts; [`FrozenCache`] has no write methods.
#[derive(Debug, Default)]
pub struct DataCache {
  entries: HashMap<CacheKey, CacheEntry>,
}

impl DataCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn mark_pending(&mut self, key: &CacheKey) -> Result<(), CacheError> {
    match self.entries.get(key) {
      Some(CacheEntry::Pending) => Err(CacheError::AlreadyPending(key.clone())),
      Some(_) => Err(CacheError::AlreadySettled(key.clone())),
      None => {
        self.entries.insert(key.clone(), CacheEntry::Pending);
        Ok(())
      }
    }
  }

  pub fn resolve(&mut self, key: &CacheKey, value: Value) -> Result<(), CacheError> {
    self.settle(key, CacheEntry::Resolved(value))
  }

  pub fn fail(&mut self, key: &CacheKey, reason: impl Into<String>) -> Result<(), CacheError> {
    self.settle(key, CacheEntry::Error(reason.into()))
  }

  fn settle(&mut self, key: &CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
    match self.entries.get_mut(key) {
      Some(slot @ CacheEntry::Pending) => {
        *slot = entry;
        Ok(())
      }
      Some(_) => Err(CacheError::AlreadySettled(key.clone())),
      None => Err(CacheError::NotPending(key.clone())),
    }
  }

  pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
    self.entries.get(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Stop accepting writes. Keys still pending at this point are recorded
  /// as errors so the renderer only ever sees settled entries.
  pub fn freeze(mut self) -> FrozenCache {
    for entry in self.entries.values_mut() {
      if !entry.is_settled() {
        *entry = CacheEntry::Error("loader did not settle before render".to_string());
      }
    }
    FrozenCache { entries: Arc::new(self.entries) }
  }
}

/// Read-only view of a request's data cache, shared by the renderer and the
/// stream assembler.
#[derive(Debug, Clone, Default)]
pub struct FrozenCache {
  entries: Arc<HashMap<CacheKey, CacheEntry>>,
}

impl FrozenCache {
  pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
    self.entries.get(key)
  }

  /// Resolved value for `key`, if the loader succeeded.
  pub fn value(&self, key: &str) -> Option<&Value> {
    match self.entries.get(&CacheKey::new(key))? {
      CacheEntry::Resolved(v) => Some(v),
      _ => None,
    }
  }

  pub fn error(&self, key: &str) -> Option<&str> {
    match self.entries.get(&CacheKey::new(key))? {
      CacheEntry::Error(reason) => Some(reason),
      _ => None,
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// JSON snapshot for the client: resolved entries only, keys sorted.
  pub fn dehydrate(&self) -> Value {
    let resolved: BTreeMap<&str, &Value> = self
      .entries
      .iter()
      .filter_map(|(key, entry)| match entry {
        CacheEntry::Resolved(v) => Some((key.as_str(), v)),
        _ => None,
      })
      .collect();
    serde_json::to_value(resolved).unwrap_or_else(|_| Value::Object(Default::default()))
  }
}
