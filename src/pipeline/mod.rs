//! Request pipeline assembly subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigStore flags + mounts
//!     → StageId::ORDER (fixed assembly order)
//!     → per-stage predicate, evaluated once at assembly time
//!     → assemble.rs (route surface, fall-through chain, middleware layers)
//!     → Pipeline { axum Router, included stage list }
//! ```
//!
//! # Design Decisions
//! - The stage order is a static table, not imperative wiring; inclusion is
//!   testable without driving requests
//! - Hook invocation points are ordinary stages; at request time they call
//!   the registry and short-circuit the request on a chain error
//! - Redirects and the `pre:error` chain sit on the route fall-through
//!   path; the terminal error renderer wraps the whole stack

pub mod assemble;
pub mod middleware;

pub use assemble::{assemble, Pipeline};

use crate::config::ConfigStore;

/// Identifier for one pipeline stage, in fixed assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Request id, proxy trust, IP restriction, view locals.
    Setup,
    /// Response body compression.
    Compression,
    /// Direct `pre:static` config function, ahead of the hook chain.
    PreStaticDirect,
    /// `pre:static` hook invocation point.
    PreStaticHook,
    /// Favicon serving.
    Favicon,
    /// Admin static asset router.
    AdminStatic,
    /// Caller-supplied static asset middleware.
    StaticAssets,
    /// Session loading and cookie handling (invokes `pre:session`).
    Session,
    /// Built-in request logging.
    RequestLog,
    /// Caller-supplied logging middleware.
    LogMiddleware,
    /// `pre:logger` hook invocation point.
    PreLoggerHook,
    /// Admin dynamic router.
    AdminRouter,
    /// Direct `pre:bodyparser` config function.
    PreBodyParserDirect,
    /// `pre:bodyparser` hook invocation point.
    PreBodyParserHook,
    /// Request body size limiting ahead of extractor-driven parsing.
    BodyParser,
    /// `X-HTTP-Method-Override` handling.
    MethodOverride,
    /// Language negotiation.
    Language,
    /// `X-Frame-Options` response header.
    FrameGuard,
    /// Direct `pre:routes` config function.
    PreRoutesDirect,
    /// `pre:routes` hook invocation point.
    PreRoutesHook,
    /// Component router mounted at the root.
    ComponentRouter,
    /// Application-defined routes.
    Routes,
    /// Redirect table lookup on fall-through.
    Redirects,
    /// Direct `pre:error` config function.
    PreErrorDirect,
    /// `pre:error` hook invocation point on fall-through.
    PreErrorHook,
    /// Terminal error renderer.
    ErrorHandler,
}

impl StageId {
    /// The fixed relative order every assembled pipeline preserves, even
    /// when intermediate stages are excluded.
    pub const ORDER: [StageId; 26] = [
        StageId::Setup,
        StageId::Compression,
        StageId::PreStaticDirect,
        StageId::PreStaticHook,
        StageId::Favicon,
        StageId::AdminStatic,
        StageId::StaticAssets,
        StageId::Session,
        StageId::RequestLog,
        StageId::LogMiddleware,
        StageId::PreLoggerHook,
        StageId::AdminRouter,
        StageId::PreBodyParserDirect,
        StageId::PreBodyParserHook,
        StageId::BodyParser,
        StageId::MethodOverride,
        StageId::Language,
        StageId::FrameGuard,
        StageId::PreRoutesDirect,
        StageId::PreRoutesHook,
        StageId::ComponentRouter,
        StageId::Routes,
        StageId::Redirects,
        StageId::PreErrorDirect,
        StageId::PreErrorHook,
        StageId::ErrorHandler,
    ];

    /// Whether this stage is part of a pipeline assembled from `config`.
    ///
    /// Hook invocation points and the terminal error renderer are always
    /// wired, even with no handlers registered.
    pub fn included(self, config: &ConfigStore) -> bool {
        match self {
            StageId::Setup
            | StageId::PreStaticHook
            | StageId::PreLoggerHook
            | StageId::PreBodyParserHook
            | StageId::BodyParser
            | StageId::MethodOverride
            | StageId::PreRoutesHook
            | StageId::PreErrorHook
            | StageId::ErrorHandler => true,
            StageId::Compression => config.get_bool("compress"),
            StageId::PreStaticDirect => config.get_mount("pre:static").is_some(),
            StageId::Favicon => config.get_str("favicon").is_some(),
            StageId::AdminStatic | StageId::AdminRouter => !config.get_bool("headless"),
            StageId::StaticAssets => config.get_mount("static middleware").is_some(),
            StageId::Session => config.get_bool("session"),
            StageId::RequestLog => config.get_bool("logger"),
            StageId::LogMiddleware => config.get_mount("logging middleware").is_some(),
            StageId::PreBodyParserDirect => config.get_mount("pre:bodyparser").is_some(),
            StageId::Language => !config
                .get_json("language options")
                .and_then(|opts| opts.get("disable").and_then(|d| d.as_bool()))
                .unwrap_or(false),
            StageId::FrameGuard => config.get_bool("frame guard"),
            StageId::PreRoutesDirect => config.get_mount("pre:routes").is_some(),
            StageId::ComponentRouter => config.get_mount("react routes").is_some(),
            StageId::Routes => config.get_mount("routes").is_some(),
            StageId::Redirects => !config.redirects().is_empty(),
            StageId::PreErrorDirect => config.get_mount("pre:error").is_some(),
        }
    }

    /// Stable name for diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            StageId::Setup => "setup",
            StageId::Compression => "compression",
            StageId::PreStaticDirect => "pre:static direct",
            StageId::PreStaticHook => "pre:static hook",
            StageId::Favicon => "favicon",
            StageId::AdminStatic => "admin static",
            StageId::StaticAssets => "static assets",
            StageId::Session => "session",
            StageId::RequestLog => "request log",
            StageId::LogMiddleware => "logging middleware",
            StageId::PreLoggerHook => "pre:logger hook",
            StageId::AdminRouter => "admin router",
            StageId::PreBodyParserDirect => "pre:bodyparser direct",
            StageId::PreBodyParserHook => "pre:bodyparser hook",
            StageId::BodyParser => "body parser",
            StageId::MethodOverride => "method override",
            StageId::Language => "language",
            StageId::FrameGuard => "frame guard",
            StageId::PreRoutesDirect => "pre:routes direct",
            StageId::PreRoutesHook => "pre:routes hook",
            StageId::ComponentRouter => "component router",
            StageId::Routes => "routes",
            StageId::Redirects => "redirects",
            StageId::PreErrorDirect => "pre:error direct",
            StageId::PreErrorHook => "pre:error hook",
            StageId::ErrorHandler => "error handler",
        }
    }
}
