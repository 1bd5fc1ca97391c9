//! Storage connection seam.
//!
//! The persistence engine itself is an external collaborator; the bootstrap
//! core only owns when a connection is opened and whether an open one is
//! reused.

use async_trait::async_trait;

use crate::error::BoxError;

/// Handle to an open storage connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageHandle {
    pub uri: String,
}

/// Opens storage connections for the bootstrapper.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<StorageHandle, BoxError>;
}

/// Connector that "opens" an in-process handle; the default for embedding
/// and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage;

impl MemoryStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageConnector for MemoryStorage {
    async fn connect(&self, uri: &str) -> Result<StorageHandle, BoxError> {
        tracing::debug!(uri = %uri, "Opening in-memory storage");
        Ok(StorageHandle {
            uri: uri.to_string(),
        })
    }
}
