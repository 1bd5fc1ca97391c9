//! Context threaded through a hook chain.

use axum::body::Body;
use axum::http::{Extensions, Method, Request};

use crate::pipeline::middleware::RequestMeta;

/// Carried through every handler of an invocation, in order.
///
/// Request-scoped invocations describe the request being processed; lifecycle
/// invocations (`updates`, `signin`, `signout`) start empty. The extensions
/// bag is the channel for handler-to-handler and handler-to-route data.
#[derive(Debug, Default)]
pub struct HookContext {
    /// HTTP method, when invoked from a pipeline stage.
    pub method: Option<Method>,
    /// Request path, when invoked from a pipeline stage.
    pub path: Option<String>,
    /// Request id stamped by the setup stage, when present.
    pub request_id: Option<String>,
    /// Typed bag for anything handlers want to pass along.
    pub extensions: Extensions,
}

impl HookContext {
    /// Empty context for lifecycle hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context describing an in-flight request.
    pub fn for_request(request: &Request<Body>) -> Self {
        Self {
            method: Some(request.method().clone()),
            path: Some(request.uri().path().to_string()),
            request_id: request
                .extensions()
                .get::<RequestMeta>()
                .map(|meta| meta.request_id.clone()),
            extensions: Extensions::new(),
        }
    }
}
