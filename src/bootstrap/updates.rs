//! Update-run seam for `apply_updates`.
//!
//! The migration procedure itself lives outside the core; the bootstrapper
//! wraps whatever runner is supplied in the `updates` pre/post hook chains.

use async_trait::async_trait;

use crate::error::BoxError;

/// Runs the application's pending updates.
#[async_trait]
pub trait UpdateRunner: Send + Sync {
    async fn apply(&self) -> Result<(), BoxError>;
}

/// Runner with nothing to do.
#[derive(Debug, Default)]
pub struct NoopUpdates;

#[async_trait]
impl UpdateRunner for NoopUpdates {
    async fn apply(&self) -> Result<(), BoxError> {
        Ok(())
    }
}
