//! Lifecycle hook subsystem.
//!
//! # Data Flow
//! ```text
//! construction: HookRegistry::new(allow-list)   ← sealed once
//! startup:      registry.pre / registry.post    ← ordered registration
//! request/lifecycle time:
//!     pipeline stage or bootstrapper
//!         → registry.invoke(phase, name, ctx)
//!         → handler 1 → handler 2 → … (sequential, each awaited)
//!         → Ok(ctx) | first Err aborts the chain
//! ```
//!
//! # Design Decisions
//! - The registry is an explicit object owned by the application instance,
//!   not behavior mixed into the instance's own surface
//! - "no handlers" is success; "unknown hook" is a programmer error

pub mod context;
pub mod registry;

pub use context::HookContext;
pub use registry::{HookRegistry, Phase, DEFAULT_HOOKS};
