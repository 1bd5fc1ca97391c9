//! keel: bootstrap core for a content-management framework.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                  BOOTSTRAP CORE                  │
//!                 │                                                  │
//!   env / file    │  ┌─────────┐         ┌───────────────────────┐   │
//!   ─────────────▶│  │ config  │────────▶│       pipeline        │   │
//!                 │  │  store  │  flags  │  assembler + stages   │   │
//!                 │  └─────────┘  mounts └──────────┬────────────┘   │
//!                 │       ▲                         │ hook points    │
//!                 │       │                         ▼                │
//!                 │  ┌────┴──────┐         ┌───────────────┐        │
//!                 │  │ bootstrap │────────▶│     hooks     │        │
//!                 │  │ (storage, │ updates │ sealed names, │        │
//!                 │  │  session) │ signin… │ ordered chains│        │
//!                 │  └───────────┘         └───────────────┘        │
//!                 └──────────────────────────────────────────────────┘
//! ```
//!
//! The crate wires four pieces together: a process-wide [`ConfigStore`],
//! a sealed [`HookRegistry`] invoked sequentially with error
//! short-circuiting, a pipeline assembler that turns configuration flags
//! into an ordered axum router, and an idempotent [`Bootstrapper`] that
//! builds the [`Application`] exactly once.

// Core subsystems
pub mod config;
pub mod hooks;
pub mod pipeline;

// Lifecycle
pub mod bootstrap;

// Admin surface
pub mod admin;

// Cross-cutting
pub mod error;

pub use bootstrap::{Application, Bootstrapper};
pub use config::{ConfigStore, ConfigValue, MountFn};
pub use error::{BootstrapError, BoxError, HookError};
pub use hooks::{HookContext, HookRegistry, Phase};
pub use pipeline::{Pipeline, StageId};
