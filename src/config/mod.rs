//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! declared defaults (construction)
//!     → env.rs (environment-derived entries)
//!     → store.rs load_toml (config file merge)
//!     → explicit set() calls by the embedding application
//!     → read by the assembler and bootstrapper via typed accessors
//! ```
//!
//! # Design Decisions
//! - The store is the sole source of conditional behavior for pipeline
//!   assembly and hook gating
//! - Later writes win: defaults < environment < file < explicit set
//! - Function-valued entries (router mounts) ride in the same store so the
//!   assembler consults exactly one map

pub mod env;
pub mod store;

pub use env::apply_env_defaults;
pub use store::{ConfigError, ConfigStore, ConfigValue, MountFn};
