//! Minimal admin surface.
//!
//! The UI itself is out of scope; these routers exist so the assembler has
//! real admin static/dynamic stages to include or suppress via `headless`.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::bootstrap::session::SessionStore;
use crate::config::ConfigStore;
use crate::hooks::HookRegistry;

/// State injected into the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub config: Arc<ConfigStore>,
    pub hooks: Arc<HookRegistry>,
    pub sessions: Arc<dyn SessionStore>,
}

/// Static asset router, nested under `/{admin path}/static`.
pub fn static_router() -> Router {
    Router::new()
        .route("/keel.css", get(|| async { ([("content-type", "text/css")], ADMIN_CSS) }))
        .route(
            "/keel.js",
            get(|| async { ([("content-type", "application/javascript")], ADMIN_JS) }),
        )
}

/// Dynamic API router, nested under `/{admin path}/api`.
pub fn dynamic_router(
    config: Arc<ConfigStore>,
    hooks: Arc<HookRegistry>,
    sessions: Arc<dyn SessionStore>,
) -> Router {
    let state = AdminState {
        config,
        hooks,
        sessions,
    };
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/session/signin", post(handlers::signin))
        .route("/session/signout", post(handlers::signout))
        .with_state(state)
}

// Placeholder assets; real admin bundles are shipped by the UI package.
const ADMIN_CSS: &str = ":root { --keel-brand: #2d3748; }\n";
const ADMIN_JS: &str = "window.Keel = window.Keel || {};\n";
