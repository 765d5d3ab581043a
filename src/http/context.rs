//! Per-request span scope.
//!
//! # Responsibilities
//! - Open the server span for an inbound request (`open_span`)
//! - Bind it as the current span while the request's chain runs
//!
//! # Design Decisions
//! - The binding is the tracer's task-local active span, so outbound client
//!   spans started inside the request pick it up as their parent
//! - The same `RequestContext` is also stored in the request extensions for
//!   code that prefers explicit access

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};
use axum::http::header::HOST;

use crate::http::request::request_id;
use crate::tracer::context::with_span;
use crate::tracer::{SpanHandle, Tracer};

pub use crate::tracer::context::{close_span, current_span, SpanGuard};

/// The request-scoped tracing context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    span: SpanHandle,
}

impl RequestContext {
    pub fn new(span: SpanHandle) -> Self {
        Self { span }
    }

    pub fn span(&self) -> &SpanHandle {
        &self.span
    }

    /// Context bound to the running task, if any.
    pub fn current() -> Option<RequestContext> {
        current_span().map(Self::new)
    }

    /// Run `fut` with this context bound as current.
    ///
    /// Use this to carry the context into spawned tasks, which do not
    /// inherit task-locals.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        with_span(self.span, fut).await
    }
}

/// Open the server span for `request`, handled by `handler_name`.
///
/// Continues the caller's trace when the request carries a valid
/// propagation header.
pub fn open_span(tracer: &Tracer, request: &Request, handler_name: &str) -> SpanGuard {
    let propagator = tracer.propagator();
    let headers = request.headers();
    let parent = propagator.extract(headers);

    let operation = format!("{}: {}", request.method(), handler_name);
    let span = tracer.start_span(operation, parent.as_ref());

    span.set_tag("span.kind", "server");
    span.set_tag("http.method", request.method().as_str());
    span.set_tag("http.url", full_url(request));
    if let Some(caller) = propagator.caller_name(headers) {
        span.set_tag("peer.service", caller);
    }
    if let Some(endpoint) = propagator.callee_endpoint(headers) {
        span.set_tag("callee.endpoint", endpoint);
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        let key = if addr.is_ipv4() { "peer.ipv4" } else { "peer.ipv6" };
        span.set_tag(key, addr.ip().to_string());
        span.set_tag("peer.port", addr.port());
    }
    if let Some(id) = request_id(request) {
        span.set_tag("request.id", id);
    }

    SpanGuard::new(span)
}

fn full_url(request: &Request) -> String {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let host = request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("http://{host}{path}")
}
