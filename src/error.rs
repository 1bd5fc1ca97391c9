//! Error taxonomy for the bootstrap core.
//!
//! # Design Decisions
//! - Configuration misuse (sealed allow-list, undeclared hook) fails
//!   synchronously at the call site
//! - Handler failures travel through `Result`, never across an await as a
//!   panic
//! - Initialization failures are fatal to that bootstrap attempt and leave
//!   nothing cached

use thiserror::Error;

/// Boxed error produced by hook handlers and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the hook registry.
#[derive(Debug, Error)]
pub enum HookError {
    /// The allow-list is sealed at construction; late declarations of new
    /// names are a programmer error.
    #[error("hook allow-list is sealed; cannot declare `{0}`")]
    Sealed(String),

    /// Registration or invocation against a name that was never declared.
    #[error("hook `{0}` is not declared")]
    Undeclared(String),

    /// A registered handler signalled failure; the rest of the chain was
    /// aborted.
    #[error("handler for hook `{hook}` failed: {source}")]
    Handler {
        hook: String,
        #[source]
        source: BoxError,
    },
}

impl HookError {
    /// Name of the hook the error relates to.
    pub fn hook_name(&self) -> &str {
        match self {
            HookError::Sealed(name) | HookError::Undeclared(name) => name,
            HookError::Handler { hook, .. } => hook,
        }
    }
}

/// Errors raised while bootstrapping the application instance.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("storage initialization failed: {0}")]
    Storage(#[source] BoxError),

    #[error("session initialization failed: {0}")]
    Session(#[source] BoxError),

    #[error("update run failed: {0}")]
    Updates(#[source] BoxError),

    #[error(transparent)]
    Hook(#[from] HookError),
}
