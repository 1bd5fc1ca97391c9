//! Process-wide configuration store.
//!
//! # Responsibilities
//! - Hold key/value options behind normalized keys
//! - Fall back to the defaults declared at construction
//! - Merge TOML config files over the defaults
//! - Carry function-valued options (router mounts) for the assembler
//!
//! # Design Decisions
//! - Keys are trimmed and lowercased; `"Admin Path"` and `"admin path"` are
//!   the same entry
//! - `set` overwrites without type checking; policy lives in the consumers
//! - The store is shared read/write for the process lifetime; writes are
//!   expected during the startup phase

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use dashmap::DashMap;
use thiserror::Error;

/// Function-valued configuration entry: a transform applied to the router
/// at assembly time (user routes, custom middleware, direct hook slots).
pub type MountFn = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// A configuration value.
///
/// Values are untyped at the store level; consumers read them through the
/// typed accessors and decide what counts as "enabled".
#[derive(Clone)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Structured records (language options, redirect table).
    Json(serde_json::Value),
    /// Router transform supplied by the embedding application.
    Mount(MountFn),
}

impl ConfigValue {
    /// Truthiness across variants, matching how option flags gate stages.
    pub fn is_truthy(&self) -> bool {
        match self {
            ConfigValue::Bool(b) => *b,
            ConfigValue::Int(i) => *i != 0,
            ConfigValue::Str(s) => !s.is_empty(),
            ConfigValue::Json(v) => match v {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                _ => true,
            },
            ConfigValue::Mount(_) => true,
        }
    }
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "Bool({b})"),
            ConfigValue::Int(i) => write!(f, "Int({i})"),
            ConfigValue::Str(s) => write!(f, "Str({s:?})"),
            ConfigValue::Json(v) => write!(f, "Json({v})"),
            ConfigValue::Mount(_) => write!(f, "Mount(..)"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(v: serde_json::Value) -> Self {
        ConfigValue::Json(v)
    }
}

impl From<MountFn> for ConfigValue {
    fn from(v: MountFn) -> Self {
        ConfigValue::Mount(v)
    }
}

/// Error type for configuration file loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config file root must be a table")]
    NotATable,
}

/// Key/value configuration shared by every subsystem.
pub struct ConfigStore {
    entries: DashMap<String, ConfigValue>,
    defaults: HashMap<String, ConfigValue>,
}

impl ConfigStore {
    /// Create a store with the standard default option table.
    pub fn new() -> Self {
        Self::with_defaults([
            ("name", ConfigValue::from("Keel")),
            ("brand", ConfigValue::from("Keel")),
            ("admin path", ConfigValue::from("keel")),
            ("compress", ConfigValue::from(true)),
            ("headless", ConfigValue::from(false)),
            ("logger", ConfigValue::from(":method :url :status :response-time ms")),
            ("frame guard", ConfigValue::from("sameorigin")),
            ("env", ConfigValue::from("development")),
            ("host", ConfigValue::from("127.0.0.1")),
            ("port", ConfigValue::from(3000)),
            ("storage uri", ConfigValue::from("memory://keel")),
            ("session", ConfigValue::from(false)),
            ("body limit", ConfigValue::from(1024 * 1024)),
            ("auto update", ConfigValue::from(false)),
        ])
    }

    /// Create a store with a caller-declared default table.
    pub fn with_defaults<K>(defaults: impl IntoIterator<Item = (K, ConfigValue)>) -> Self
    where
        K: AsRef<str>,
    {
        let defaults = defaults
            .into_iter()
            .map(|(k, v)| (normalize(k.as_ref()), v))
            .collect();
        Self {
            entries: DashMap::new(),
            defaults,
        }
    }

    /// Unconditional overwrite. Never fails.
    pub fn set(&self, key: &str, value: impl Into<ConfigValue>) {
        self.entries.insert(normalize(key), value.into());
    }

    /// Stored value, or the declared default, or `None` for unknown keys.
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let key = normalize(key);
        self.entries
            .get(&key)
            .map(|e| e.value().clone())
            .or_else(|| self.defaults.get(&key).cloned())
    }

    /// Whether the value under `key` is set and truthy.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.is_truthy())
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ConfigValue::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn get_json(&self, key: &str) -> Option<serde_json::Value> {
        match self.get(key)? {
            ConfigValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_mount(&self, key: &str) -> Option<MountFn> {
        match self.get(key)? {
            ConfigValue::Mount(f) => Some(f),
            _ => None,
        }
    }

    /// Register a redirect mapping under the `redirects` table.
    pub fn redirect(&self, from: &str, to: &str) {
        let mut table = self
            .get_json("redirects")
            .and_then(|v| match v {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        table.insert(from.to_string(), serde_json::Value::String(to.to_string()));
        self.set("redirects", serde_json::Value::Object(table));
    }

    /// The redirect table as plain path → location pairs.
    pub fn redirects(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        if let Some(serde_json::Value::Object(map)) = self.get_json("redirects") {
            for (from, to) in map {
                if let serde_json::Value::String(to) = to {
                    out.insert(from, to);
                }
            }
        }
        out
    }

    /// Merge a TOML file over the current entries.
    ///
    /// File values overwrite earlier entries for the same key; `set` calls
    /// made after loading win over the file.
    pub fn load_toml(&self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.merge_toml_str(&content)
    }

    /// Merge TOML source text over the current entries.
    pub fn merge_toml_str(&self, source: &str) -> Result<(), ConfigError> {
        let value: toml::Value = toml::from_str(source)?;
        let table = value.as_table().ok_or(ConfigError::NotATable)?;
        for (key, value) in table {
            self.set(key, toml_to_config(value));
        }
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("entries", &self.entries.len())
            .field("defaults", &self.defaults.len())
            .finish()
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

fn toml_to_config(value: &toml::Value) -> ConfigValue {
    match value {
        toml::Value::Boolean(b) => ConfigValue::Bool(*b),
        toml::Value::Integer(i) => ConfigValue::Int(*i),
        toml::Value::String(s) => ConfigValue::Str(s.clone()),
        other => {
            // Tables, arrays, floats and datetimes land as structured JSON.
            let json = serde_json::to_value(other).unwrap_or(serde_json::Value::Null);
            ConfigValue::Json(json)
        }
    }
}
