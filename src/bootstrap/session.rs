//! Session subsystem seam.
//!
//! # Responsibilities
//! - Define the store contract the session stage and admin surface use
//! - Provide the in-memory store used for embedding and tests
//!
//! # Design Decisions
//! - Sessions are cheap handles; the value map is shared behind an `Arc` so
//!   the request extension and the store observe the same data

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::BoxError;

/// One authenticated (or anonymous) visitor session.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    values: Arc<DashMap<String, serde_json::Value>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).map(|v| v.value().clone())
    }

    pub fn insert(&self, key: &str, value: serde_json::Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) {
        self.values.remove(key);
    }
}

/// Backing store for sessions.
///
/// `init` is called once per bootstrap attempt before the pipeline is
/// assembled; a failure there aborts the bootstrap.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn init(&self) -> Result<(), BoxError>;
    async fn load(&self, id: &str) -> Option<Session>;
    async fn create(&self) -> Session;
    async fn destroy(&self, id: &str);
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn init(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn load(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    async fn create(&self) -> Session {
        let session = Session::new(Uuid::new_v4().to_string());
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    async fn destroy(&self, id: &str) {
        self.sessions.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_sessions_are_loadable_and_shared() {
        let store = MemorySessionStore::new();
        assert!(store.is_empty());
        let session = store.create().await;
        assert_eq!(store.len(), 1);
        session.insert("user", serde_json::json!("ada"));

        let loaded = store.load(&session.id).await.unwrap();
        assert_eq!(loaded.get("user"), Some(serde_json::json!("ada")));

        store.destroy(&session.id).await;
        assert!(store.load(&session.id).await.is_none());
        assert!(store.is_empty());
    }
}
