//! Built-in pipeline middleware.
//!
//! # Responsibilities
//! - Stamp request metadata (request id, remote address, view locals)
//! - Wire hook invocation points into the request path
//! - Provide the small stages the original chain carries inline: favicon,
//!   session, request logging, method override, language negotiation
//! - Render the fall-through chain (redirects, `pre:error`, 404) and the
//!   terminal error capture
//!
//! # Design Decisions
//! - A hook-chain failure never produces a response directly; it is tagged
//!   on an empty response and rendered by the terminal capture layer, so
//!   errors are forwarded downstream rather than swallowed
//! - Chain contexts share one extensions bag per request: each hook point
//!   seeds its context from the bag the previous point left behind

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use uuid::Uuid;

use crate::bootstrap::session::SessionStore;
use crate::config::ConfigStore;
use crate::error::HookError;
use crate::hooks::{HookContext, HookRegistry, Phase};

/// Per-request metadata stamped by the setup stage.
#[derive(Clone, Debug)]
pub struct RequestMeta {
    pub request_id: String,
    /// Client address, honoring `trust proxy` when enabled.
    pub remote_ip: Option<String>,
    pub locals: Arc<Locals>,
}

/// Values the original chain exposed to every view.
#[derive(Clone, Debug)]
pub struct Locals {
    pub name: String,
    pub brand: String,
    pub env: String,
    pub admin_path: String,
}

impl Locals {
    pub(crate) fn from_config(config: &ConfigStore) -> Self {
        Self {
            name: config.get_str("name").unwrap_or_else(|| "Keel".into()),
            brand: config.get_str("brand").unwrap_or_else(|| "Keel".into()),
            env: config.get_str("env").unwrap_or_else(|| "development".into()),
            admin_path: config.get_str("admin path").unwrap_or_else(|| "keel".into()),
        }
    }
}

/// Negotiated request language, attached by the language stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Language(pub String);

/// Extensions bag shared across the hook points of one request.
#[derive(Clone, Default)]
pub struct HookBag(pub axum::http::Extensions);

/// Failure tag the terminal error stage renders.
#[derive(Clone, Debug)]
pub struct StageFailure(pub Arc<HookError>);

/// Empty response carrying a hook-chain failure to the terminal stage.
pub(crate) fn failure_response(error: HookError) -> Response {
    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(StageFailure(Arc::new(error)));
    response
}

pub(crate) fn error_page(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

/// Setup stage: request id, remote address, IP restriction, view locals.
pub(crate) async fn setup(config: Arc<ConfigStore>, mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let remote_ip = remote_address(&config, &req);

    if let Some(serde_json::Value::Array(ranges)) = config.get_json("allowed ip ranges") {
        let allowed = match &remote_ip {
            Some(ip) => ranges
                .iter()
                .filter_map(|r| r.as_str())
                .any(|range| ip == range || ip.starts_with(range)),
            // Without a resolvable address the restriction cannot pass.
            None => false,
        };
        if !allowed {
            tracing::warn!(remote_ip = ?remote_ip, "Rejected by IP restriction");
            return error_page(StatusCode::FORBIDDEN, "Forbidden");
        }
    }

    req.extensions_mut().insert(RequestMeta {
        request_id: request_id.clone(),
        remote_ip,
        locals: Arc::new(Locals::from_config(&config)),
    });

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

fn remote_address(config: &ConfigStore, req: &Request) -> Option<String> {
    if config.get_bool("trust proxy") {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
    }
    req.extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}

/// Hook invocation point: runs the `pre` chain for `name`, forwarding to the
/// next stage only after every handler's continuation fired.
pub(crate) async fn hook_point(
    hooks: Arc<HookRegistry>,
    name: &'static str,
    mut req: Request,
    next: Next,
) -> Response {
    let mut ctx = HookContext::for_request(&req);
    if let Some(bag) = req.extensions_mut().remove::<HookBag>() {
        ctx.extensions = bag.0;
    }
    match hooks.invoke(Phase::Pre, name, ctx).await {
        Ok(ctx) => {
            req.extensions_mut().insert(HookBag(ctx.extensions));
            next.run(req).await
        }
        Err(error) => failure_response(error),
    }
}

/// Favicon stage: answer `/favicon.ico` from bytes read at assembly time.
pub(crate) async fn favicon(bytes: Arc<Vec<u8>>, req: Request, next: Next) -> Response {
    if req.uri().path() == "/favicon.ico"
        && (req.method() == Method::GET || req.method() == Method::HEAD)
    {
        return (
            [
                (header::CONTENT_TYPE, "image/x-icon"),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            bytes.as_ref().clone(),
        )
            .into_response();
    }
    next.run(req).await
}

/// Session stage: run the `pre:session` chain, then load or create the
/// session and stamp the cookie on the way out.
pub(crate) async fn session(
    hooks: Arc<HookRegistry>,
    sessions: Arc<dyn SessionStore>,
    cookie_name: Arc<String>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = HookContext::for_request(&req);
    if let Err(error) = hooks.invoke(Phase::Pre, "session", ctx).await {
        return failure_response(error);
    }

    let existing = cookie_value(&req, &cookie_name);
    let (session, fresh) = match existing {
        Some(id) => match sessions.load(&id).await {
            Some(session) => (session, false),
            None => (sessions.create().await, true),
        },
        None => (sessions.create().await, true),
    };
    let session_id = session.id.clone();
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;
    if fresh {
        let cookie = format!("{cookie_name}={session_id}; Path=/; HttpOnly");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

fn cookie_value(req: &Request, name: &str) -> Option<String> {
    let cookies = req.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Built-in request logging stage.
pub(crate) async fn request_log(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .extensions()
        .get::<RequestMeta>()
        .map(|meta| meta.request_id.clone())
        .unwrap_or_default();

    let response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}

/// Method override stage: `X-HTTP-Method-Override` on POST requests.
pub(crate) async fn method_override(mut req: Request, next: Next) -> Response {
    if req.method() == Method::POST {
        let replacement = req
            .headers()
            .get("x-http-method-override")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Method::from_bytes(v.to_uppercase().as_bytes()).ok());
        if let Some(method) = replacement {
            *req.method_mut() = method;
        }
    }
    next.run(req).await
}

/// Language stage: negotiate from the cookie or `Accept-Language`, attach
/// the result and echo it as `Content-Language`.
pub(crate) async fn language(
    options: Arc<serde_json::Value>,
    mut req: Request,
    next: Next,
) -> Response {
    let default = options
        .get("default language")
        .and_then(|v| v.as_str())
        .unwrap_or("en")
        .to_string();
    let supported: Vec<String> = options
        .get("supported languages")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let cookie_name = options
        .get("language cookie")
        .and_then(|v| v.as_str())
        .unwrap_or("keel.language");

    let negotiated = cookie_value(&req, cookie_name)
        .into_iter()
        .chain(accept_language_tags(&req))
        .find(|tag| supported.is_empty() || supported.iter().any(|s| s == tag))
        .unwrap_or(default);

    req.extensions_mut().insert(Language(negotiated.clone()));
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&negotiated) {
        response
            .headers_mut()
            .insert(header::CONTENT_LANGUAGE, value);
    }
    response
}

fn accept_language_tags(req: &Request) -> Vec<String> {
    req.headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .filter_map(|part| {
                    let tag = part.split(';').next()?.trim();
                    (!tag.is_empty() && tag != "*").then(|| tag.to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Redirect-table stage, first on the fall-through path.
pub(crate) async fn redirects(
    table: Arc<HashMap<String, String>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(target) = table.get(req.uri().path()) {
        return Redirect::to(target).into_response();
    }
    next.run(req).await
}

/// Tail of the fall-through chain: the `pre:error` hooks, then the 404
/// renderer.
pub(crate) async fn fall_through(hooks: Arc<HookRegistry>, req: Request) -> Response {
    let ctx = HookContext::for_request(&req);
    match hooks.invoke(Phase::Pre, "error", ctx).await {
        Ok(_) => error_page(StatusCode::NOT_FOUND, "Not Found"),
        Err(error) => failure_response(error),
    }
}

/// Terminal stage: renders hook-chain failures tagged on the response.
pub(crate) async fn error_capture(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if let Some(failure) = response.extensions().get::<StageFailure>() {
        tracing::error!(
            hook = failure.0.hook_name(),
            error = %failure.0,
            "Request aborted by hook chain"
        );
        return error_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    }
    response
}
