//! Bootstrap subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrapper::initialize():
//!     cached Application?  → return it unchanged
//!     ConfigStore → storage connect (reuse an open handle for the same uri)
//!                 → session store init
//!                 → apply_updates (iff `auto update`)
//!                 → pipeline::assemble
//!                 → cache Arc<Application>
//!
//! Bootstrapper::apply_updates():
//!     pre:updates hooks → update runner → post:updates hooks
//! ```
//!
//! # Design Decisions
//! - Fail fast: any initialization error aborts the attempt and caches
//!   nothing; the next call starts over
//! - Subsystems initialize in order, not concurrently
//! - The application instance exclusively owns its pipeline and shares the
//!   config store and hook registry by `Arc`

pub mod session;
pub mod storage;
pub mod updates;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{apply_env_defaults, ConfigStore};
use crate::error::BootstrapError;
use crate::hooks::{HookContext, HookRegistry, Phase};
use crate::pipeline::{self, Pipeline};

pub use session::{MemorySessionStore, Session, SessionStore};
pub use storage::{MemoryStorage, StorageConnector, StorageHandle};
pub use updates::{NoopUpdates, UpdateRunner};

/// A fully bootstrapped application instance.
///
/// Owns the assembled pipeline; created lazily by the first `initialize`
/// call and returned unchanged by every subsequent one.
pub struct Application {
    pipeline: Pipeline,
    config: Arc<ConfigStore>,
    hooks: Arc<HookRegistry>,
    storage: StorageHandle,
}

impl Application {
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The composed request handler.
    pub fn router(&self) -> Router {
        self.pipeline.router()
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    /// Serve the pipeline until ctrl-c.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Application serving");

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Application stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("stages", &self.pipeline.stages())
            .field("storage", &self.storage)
            .finish()
    }
}

/// Idempotent constructor for the application instance.
pub struct Bootstrapper {
    config: Arc<ConfigStore>,
    hooks: Arc<HookRegistry>,
    storage: Arc<dyn StorageConnector>,
    sessions: Arc<dyn SessionStore>,
    updates: Arc<dyn UpdateRunner>,
    connection: Option<StorageHandle>,
    app: Option<Arc<Application>>,
}

impl Bootstrapper {
    /// Bootstrapper over a fresh config store and the default hook names.
    pub fn new() -> Self {
        Self {
            config: Arc::new(ConfigStore::new()),
            hooks: Arc::new(HookRegistry::with_default_hooks()),
            storage: Arc::new(MemoryStorage::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            updates: Arc::new(NoopUpdates),
            connection: None,
            app: None,
        }
    }

    /// Like [`Bootstrapper::new`], with environment-derived configuration
    /// entries applied first.
    pub fn from_env() -> Self {
        let bootstrapper = Self::new();
        apply_env_defaults(&bootstrapper.config);
        bootstrapper
    }

    pub fn with_config(mut self, config: Arc<ConfigStore>) -> Self {
        self.config = config;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageConnector>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_updates(mut self, updates: Arc<dyn UpdateRunner>) -> Self {
        self.updates = updates;
        self
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Build the application instance, or return the cached one unchanged.
    ///
    /// Initialization order: storage, sessions, updates (iff `auto update`),
    /// pipeline assembly. The first failure aborts the attempt; a partially
    /// initialized instance is never cached.
    pub async fn initialize(&mut self) -> Result<Arc<Application>, BootstrapError> {
        if let Some(app) = &self.app {
            return Ok(app.clone());
        }

        let uri = self
            .config
            .get_str("storage uri")
            .unwrap_or_else(|| "memory://keel".into());
        let storage = match &self.connection {
            Some(open) if open.uri == uri => {
                tracing::debug!(uri = %uri, "Reusing open storage connection");
                open.clone()
            }
            _ => {
                let handle = self
                    .storage
                    .connect(&uri)
                    .await
                    .map_err(BootstrapError::Storage)?;
                self.connection = Some(handle.clone());
                handle
            }
        };

        self.sessions.init().await.map_err(BootstrapError::Session)?;

        if self.config.get_bool("auto update") {
            self.apply_updates().await?;
        }

        let pipeline =
            pipeline::assemble(self.config.clone(), self.hooks.clone(), self.sessions.clone());
        let app = Arc::new(Application {
            pipeline,
            config: self.config.clone(),
            hooks: self.hooks.clone(),
            storage,
        });
        self.app = Some(app.clone());
        tracing::info!(stages = app.pipeline.stages().len(), "Application bootstrapped");
        Ok(app)
    }

    /// Run pending updates inside the `updates` pre/post hook chains.
    ///
    /// Halts at the first failing stage and propagates its error.
    pub async fn apply_updates(&self) -> Result<(), BootstrapError> {
        self.hooks
            .invoke(Phase::Pre, "updates", HookContext::new())
            .await?;
        self.updates.apply().await.map_err(BootstrapError::Updates)?;
        self.hooks
            .invoke(Phase::Post, "updates", HookContext::new())
            .await?;
        Ok(())
    }
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl StorageConnector for CountingConnector {
        async fn connect(&self, uri: &str) -> Result<StorageHandle, BoxError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("connection refused".into());
            }
            Ok(StorageHandle {
                uri: uri.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let connector = Arc::new(CountingConnector::default());
        let mut bootstrapper = Bootstrapper::new().with_storage(connector.clone());

        let first = bootstrapper.initialize().await.unwrap();
        let second = bootstrapper.initialize().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn storage_failure_caches_nothing() {
        let failing = Arc::new(CountingConnector {
            connects: AtomicUsize::new(0),
            fail: true,
        });
        let mut bootstrapper = Bootstrapper::new().with_storage(failing.clone());

        let err = bootstrapper.initialize().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Storage(_)));

        // The next attempt starts over instead of returning a broken cache.
        let err = bootstrapper.initialize().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Storage(_)));
        assert_eq!(failing.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn session_failure_prevents_assembly() {
        struct FailingSessions;

        #[async_trait]
        impl SessionStore for FailingSessions {
            async fn init(&self) -> Result<(), BoxError> {
                Err("session backend offline".into())
            }
            async fn load(&self, _id: &str) -> Option<Session> {
                None
            }
            async fn create(&self) -> Session {
                Session::new("unused")
            }
            async fn destroy(&self, _id: &str) {}
        }

        let mut bootstrapper = Bootstrapper::new().with_sessions(Arc::new(FailingSessions));
        let err = bootstrapper.initialize().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Session(_)));
    }

    #[tokio::test]
    async fn apply_updates_runs_hooks_around_the_runner() {
        use std::sync::Mutex;

        struct RecordingRunner(Arc<Mutex<Vec<&'static str>>>);

        #[async_trait]
        impl UpdateRunner for RecordingRunner {
            async fn apply(&self) -> Result<(), BoxError> {
                self.0.lock().unwrap().push("runner");
                Ok(())
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let bootstrapper =
            Bootstrapper::new().with_updates(Arc::new(RecordingRunner(log.clone())));

        let pre_log = log.clone();
        bootstrapper
            .hooks()
            .pre("updates", move |ctx| {
                pre_log.lock().unwrap().push("pre");
                async { Ok(ctx) }
            })
            .unwrap();
        let post_log = log.clone();
        bootstrapper
            .hooks()
            .post("updates", move |ctx| {
                post_log.lock().unwrap().push("post");
                async { Ok(ctx) }
            })
            .unwrap();

        bootstrapper.apply_updates().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["pre", "runner", "post"]);
    }

    #[tokio::test]
    async fn apply_updates_halts_on_pre_hook_failure() {
        use std::sync::Mutex;

        struct RecordingRunner(Arc<Mutex<Vec<&'static str>>>);

        #[async_trait]
        impl UpdateRunner for RecordingRunner {
            async fn apply(&self) -> Result<(), BoxError> {
                self.0.lock().unwrap().push("runner");
                Ok(())
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let bootstrapper =
            Bootstrapper::new().with_updates(Arc::new(RecordingRunner(log.clone())));
        bootstrapper
            .hooks()
            .pre("updates", |_ctx| async {
                Err::<HookContext, BoxError>("schema locked".into())
            })
            .unwrap();

        let err = bootstrapper.apply_updates().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Hook(_)));
        assert!(log.lock().unwrap().is_empty());
    }
}
