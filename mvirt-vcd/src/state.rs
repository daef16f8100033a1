//! Persisted resource state and presence-aware field access.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::Locator;

/// Key under which local state tracks a resource.
///
/// `Name` exists for resource kinds whose identity has always been their
/// name. Names are not guaranteed unique on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalId {
    Locator(Locator),
    Name(String),
}

impl LocalId {
    pub fn as_str(&self) -> &str {
        match self {
            LocalId::Locator(l) => l.as_str(),
            LocalId::Name(n) => n,
        }
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the orchestrator persists for one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LocalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    /// Last applied desired attributes plus computed ones (`href`).
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ResourceState {
    pub fn is_present(&self) -> bool {
        self.id.is_some()
    }

    /// Forget the resource entirely.
    pub fn clear(&mut self) {
        *self = ResourceState::default();
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Typed view over user-supplied fields that remembers whether an optional
/// field was set at all.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    values: Map<String, Value>,
}

impl Fields {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn from_value(kind: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(Error::validation(
                kind,
                format!("expected an object, got {}", other),
            )),
        }
    }

    /// The value if the caller set it. `null` counts as unset.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn opt_str(&self, kind: &'static str, key: &str) -> Result<Option<String>> {
        match self.get_ok(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Error::validation(
                kind,
                format!("'{}' must be a string, got {}", key, other),
            )),
        }
    }

    pub fn required_str(&self, kind: &'static str, key: &str) -> Result<String> {
        self.opt_str(kind, key)?
            .ok_or_else(|| Error::validation(kind, format!("'{}' is required", key)))
    }

    pub fn opt_i64(&self, kind: &'static str, key: &str) -> Result<Option<i64>> {
        match self.get_ok(key) {
            None => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| {
                Error::validation(kind, format!("'{}' must be an integer, got {}", key, v))
            }),
        }
    }

    pub fn required_i64(&self, kind: &'static str, key: &str) -> Result<i64> {
        self.opt_i64(kind, key)?
            .ok_or_else(|| Error::validation(kind, format!("'{}' is required", key)))
    }

    pub fn opt_bool(&self, kind: &'static str, key: &str) -> Result<Option<bool>> {
        match self.get_ok(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(Error::validation(
                kind,
                format!("'{}' must be a boolean, got {}", key, other),
            )),
        }
    }

    /// A nested block (object) if set.
    pub fn block(&self, kind: &'static str, key: &str) -> Result<Option<Fields>> {
        match self.get_ok(key) {
            None => Ok(None),
            Some(Value::Object(values)) => Ok(Some(Fields::new(values.clone()))),
            Some(other) => Err(Error::validation(
                kind,
                format!("'{}' must be a block, got {}", key, other),
            )),
        }
    }

    /// A repeated block. A single object is accepted as a list of one.
    pub fn blocks(&self, kind: &'static str, key: &str) -> Result<Vec<Fields>> {
        match self.get_ok(key) {
            None => Ok(Vec::new()),
            Some(Value::Object(values)) => Ok(vec![Fields::new(values.clone())]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Object(values) => Ok(Fields::new(values.clone())),
                    other => Err(Error::validation(
                        kind,
                        format!("'{}' entries must be blocks, got {}", key, other),
                    )),
                })
                .collect(),
            Some(other) => Err(Error::validation(
                kind,
                format!("'{}' must be a list of blocks, got {}", key, other),
            )),
        }
    }
}

/// JSON file holding the state of one resource.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state. A missing file means the resource is not tracked yet.
    pub async fn load(&self) -> std::io::Result<ResourceState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ResourceState::default()),
            Err(e) => Err(e),
        }
    }

    /// Write state through a temp file and rename.
    pub async fn save(&self, state: &ResourceState) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}
