//! Admin API handlers.

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::admin::AdminState;
use crate::bootstrap::session::Session;
use crate::hooks::{HookContext, Phase};
use crate::pipeline::middleware::failure_response;

#[derive(Serialize)]
struct StatusBody {
    name: Option<String>,
    brand: Option<String>,
    env: Option<String>,
    headless: bool,
}

/// Instance status summary.
pub async fn get_status(State(state): State<AdminState>) -> Response {
    let config = &state.config;
    Json(StatusBody {
        name: config.get_str("name"),
        brand: config.get_str("brand"),
        env: config.get_str("env"),
        headless: config.get_bool("headless"),
    })
    .into_response()
}

/// Sign the current session in, inside the `signin` hook chains.
pub async fn signin(State(state): State<AdminState>, req: Request) -> Response {
    let ctx = HookContext::for_request(&req);
    let ctx = match state.hooks.invoke(Phase::Pre, "signin", ctx).await {
        Ok(ctx) => ctx,
        Err(error) => return failure_response(error),
    };

    let session = match req.extensions().get::<Session>() {
        Some(session) => session.clone(),
        None => state.sessions.create().await,
    };
    session.insert("signed in", json!(true));

    if let Err(error) = state.hooks.invoke(Phase::Post, "signin", ctx).await {
        return failure_response(error);
    }
    Json(json!({ "ok": true, "session": session.id })).into_response()
}

/// Sign the current session out, inside the `signout` hook chains.
pub async fn signout(State(state): State<AdminState>, req: Request) -> Response {
    let ctx = HookContext::for_request(&req);
    let ctx = match state.hooks.invoke(Phase::Pre, "signout", ctx).await {
        Ok(ctx) => ctx,
        Err(error) => return failure_response(error),
    };

    if let Some(session) = req.extensions().get::<Session>() {
        session.remove("signed in");
        state.sessions.destroy(&session.id).await;
    }

    if let Err(error) = state.hooks.invoke(Phase::Post, "signout", ctx).await {
        return failure_response(error);
    }
    Json(json!({ "ok": true })).into_response()
}
