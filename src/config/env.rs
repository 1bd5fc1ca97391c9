//! Environment-derived configuration defaults.
//!
//! # Responsibilities
//! - Seed the store from process environment variables at startup
//! - Leave keys untouched when the corresponding variable is absent
//!
//! # Design Decisions
//! - Environment values are external input; they populate the same store
//!   every other subsystem reads, nothing more
//! - Credentials stay as opaque strings; validation is the consumer's job

use crate::config::store::{ConfigStore, ConfigValue};

/// Populate the store from the process environment.
///
/// Called once during startup, before any config file merge or explicit
/// `set` calls the embedding application wants to win.
pub fn apply_env_defaults(store: &ConfigStore) {
    set_from_env(store, "env", &["KEEL_ENV", "NODE_ENV"]);
    set_from_env(store, "host", &["HOST", "IP"]);
    set_from_env(store, "cookie secret", &["COOKIE_SECRET"]);
    set_from_env(store, "storage uri", &["STORAGE_URI", "DATABASE_URL"]);

    if let Some(port) = first_env(&["PORT"]) {
        match port.parse::<i64>() {
            Ok(port) => store.set("port", port),
            Err(_) => tracing::warn!(value = %port, "Ignoring non-numeric PORT"),
        }
    }

    if let Some(ranges) = first_env(&["ALLOWED_IP_RANGES"]) {
        let list: Vec<serde_json::Value> = ranges
            .split(',')
            .map(|r| serde_json::Value::String(r.trim().to_string()))
            .filter(|r| r.as_str().is_some_and(|s| !s.is_empty()))
            .collect();
        if !list.is_empty() {
            store.set("allowed ip ranges", serde_json::Value::Array(list));
        }
    }
}

fn set_from_env(store: &ConfigStore, key: &str, vars: &[&str]) {
    if let Some(value) = first_env(vars) {
        store.set(key, ConfigValue::Str(value));
    }
}

fn first_env(vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|v| std::env::var(v).ok())
        .find(|v| !v.is_empty())
}
