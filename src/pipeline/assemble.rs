//! Pipeline assembly.
//!
//! # Responsibilities
//! - Evaluate every stage predicate exactly once
//! - Mount the route surface (admin, component router, user routes)
//! - Install the fall-through chain and the terminal error capture
//! - Layer middleware so requests traverse stages in the fixed order
//!
//! # Design Decisions
//! - Layers are applied in reverse stage order: the last layer applied is
//!   the outermost, so the first stage of the table runs first
//! - The redirect table is snapshotted at assembly time, matching the rule
//!   that predicate evaluation and inclusion happen once, not per request

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::middleware::{from_fn, Next};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::admin;
use crate::bootstrap::session::SessionStore;
use crate::config::{ConfigStore, ConfigValue};
use crate::hooks::HookRegistry;
use crate::pipeline::{middleware, StageId};

/// An assembled request pipeline.
pub struct Pipeline {
    router: Router,
    stages: Vec<StageId>,
}

impl Pipeline {
    /// Included stages, in assembly order.
    pub fn stages(&self) -> &[StageId] {
        &self.stages
    }

    pub fn includes(&self, id: StageId) -> bool {
        self.stages.contains(&id)
    }

    /// The composed request handler.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stages).finish()
    }
}

/// Assemble the pipeline from the current configuration.
///
/// Stage predicates are evaluated here, once; later configuration changes
/// do not alter an already-assembled pipeline.
pub fn assemble(
    config: Arc<ConfigStore>,
    hooks: Arc<HookRegistry>,
    sessions: Arc<dyn SessionStore>,
) -> Pipeline {
    let included: Vec<StageId> = StageId::ORDER
        .iter()
        .copied()
        .filter(|id| id.included(&config))
        .collect();
    tracing::debug!(
        stages = ?included.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        "Assembling pipeline"
    );

    let admin_path = config.get_str("admin path").unwrap_or_else(|| "keel".into());

    // Route surface first; layers applied afterwards wrap all of it.
    let mut router = Router::new();
    for id in &included {
        match id {
            StageId::AdminStatic => {
                router = router.nest(&format!("/{admin_path}/static"), admin::static_router());
            }
            StageId::AdminRouter => {
                router = router.nest(
                    &format!("/{admin_path}/api"),
                    admin::dynamic_router(config.clone(), hooks.clone(), sessions.clone()),
                );
            }
            StageId::ComponentRouter => {
                if let Some(mount) = config.get_mount("react routes") {
                    router = mount(router);
                }
            }
            StageId::Routes => {
                if let Some(mount) = config.get_mount("routes") {
                    router = mount(router);
                }
            }
            _ => {}
        }
    }

    // Fall-through chain: redirects → direct pre:error middleware →
    // pre:error hooks → 404 renderer. Assembled as its own router so the
    // direct mount's layers wrap only unmatched requests, never the routes.
    let mut fall = Router::new();
    {
        let hooks = hooks.clone();
        fall = fall.fallback(move |req: Request| {
            let hooks = hooks.clone();
            async move { middleware::fall_through(hooks, req).await }
        });
    }
    if included.contains(&StageId::PreErrorDirect) {
        if let Some(mount) = config.get_mount("pre:error") {
            fall = mount(fall);
        }
    }
    if included.contains(&StageId::Redirects) {
        let table = Arc::new(config.redirects());
        fall = fall.layer(from_fn(move |req: Request, next: Next| {
            middleware::redirects(table.clone(), req, next)
        }));
    }
    router = router.fallback_service(fall);

    // Middleware layers in reverse order: the first stage ends up outermost.
    for id in included.iter().rev() {
        router = match id {
            StageId::Setup => {
                let config = config.clone();
                router.layer(from_fn(move |req: Request, next: Next| {
                    middleware::setup(config.clone(), req, next)
                }))
            }
            StageId::Compression => router.layer(CompressionLayer::new()),
            StageId::PreStaticDirect => apply_mount(router, &config, "pre:static"),
            StageId::PreStaticHook => hook_layer(router, &hooks, "static"),
            StageId::Favicon => favicon_layer(router, &config),
            StageId::StaticAssets => apply_mount(router, &config, "static middleware"),
            StageId::Session => {
                let hooks = hooks.clone();
                let sessions = sessions.clone();
                let cookie = Arc::new(
                    config
                        .get_str("session cookie")
                        .unwrap_or_else(|| "keel.sid".into()),
                );
                router.layer(from_fn(move |req: Request, next: Next| {
                    middleware::session(hooks.clone(), sessions.clone(), cookie.clone(), req, next)
                }))
            }
            StageId::RequestLog => router.layer(from_fn(middleware::request_log)),
            StageId::LogMiddleware => apply_mount(router, &config, "logging middleware"),
            StageId::PreLoggerHook => hook_layer(router, &hooks, "logger"),
            StageId::PreBodyParserDirect => apply_mount(router, &config, "pre:bodyparser"),
            StageId::PreBodyParserHook => hook_layer(router, &hooks, "bodyparser"),
            StageId::BodyParser => {
                let limit = config.get_int("body limit").unwrap_or(1024 * 1024).max(0) as usize;
                router.layer(RequestBodyLimitLayer::new(limit))
            }
            StageId::MethodOverride => router.layer(from_fn(middleware::method_override)),
            StageId::Language => {
                let options = Arc::new(
                    config
                        .get_json("language options")
                        .unwrap_or(serde_json::Value::Null),
                );
                router.layer(from_fn(move |req: Request, next: Next| {
                    middleware::language(options.clone(), req, next)
                }))
            }
            StageId::FrameGuard => router.layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                frame_guard_value(&config),
            )),
            StageId::PreRoutesDirect => apply_mount(router, &config, "pre:routes"),
            StageId::PreRoutesHook => hook_layer(router, &hooks, "routes"),
            // Route and fall-through stages were handled above.
            _ => router,
        };
    }

    // Terminal error renderer wraps the whole stack.
    router = router.layer(from_fn(middleware::error_capture));

    Pipeline {
        router,
        stages: included,
    }
}

fn hook_layer(router: Router, hooks: &Arc<HookRegistry>, name: &'static str) -> Router {
    let hooks = hooks.clone();
    router.layer(from_fn(move |req: Request, next: Next| {
        middleware::hook_point(hooks.clone(), name, req, next)
    }))
}

fn apply_mount(router: Router, config: &ConfigStore, key: &str) -> Router {
    match config.get_mount(key) {
        Some(mount) => mount(router),
        None => router,
    }
}

fn favicon_layer(router: Router, config: &ConfigStore) -> Router {
    let Some(path) = config.get_str("favicon") else {
        return router;
    };
    match std::fs::read(&path) {
        Ok(bytes) => {
            let bytes = Arc::new(bytes);
            router.layer(from_fn(move |req: Request, next: Next| {
                middleware::favicon(bytes.clone(), req, next)
            }))
        }
        Err(error) => {
            tracing::warn!(path = %path, error = %error, "Favicon unreadable; stage serves nothing");
            router
        }
    }
}

fn frame_guard_value(config: &ConfigStore) -> HeaderValue {
    let policy = match config.get("frame guard") {
        Some(ConfigValue::Str(policy)) => policy,
        _ => "sameorigin".to_string(),
    };
    // Known keywords normalize to the canonical header form; anything else
    // (an `ALLOW-FROM <uri>` value) passes through verbatim.
    let value = match policy.to_ascii_lowercase().as_str() {
        "deny" => "DENY".to_string(),
        "sameorigin" => "SAMEORIGIN".to_string(),
        _ => policy,
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("SAMEORIGIN"))
}
