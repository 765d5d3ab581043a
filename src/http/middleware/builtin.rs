//! Middleware shipped with the crate.

use std::time::Instant;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{HeaderName, StatusCode};
use axum::response::IntoResponse;

use crate::http::context::current_span;
use crate::http::middleware::{HandlerRef, Middleware, MiddlewareResult, Next};

/// Logs every request with its outcome and latency.
///
/// Registered as `request_log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLog;

#[async_trait]
impl Middleware for RequestLog {
    fn name(&self) -> &str {
        "request_log"
    }

    async fn invoke(&self, req: Request, handler: &HandlerRef, next: Next) -> MiddlewareResult {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let trace_id = current_span().map(|s| format!("{:x}", s.context().trace_id));

        tracing::debug!(%method, %path, handler = handler.name(), "Request started");
        let result = next.run(req).await;

        match &result {
            Ok(response) => tracing::info!(
                %method,
                %path,
                status = response.status().as_u16(),
                latency_ms = start.elapsed().as_millis() as u64,
                trace_id = trace_id.as_deref().unwrap_or("-"),
                "Request finished"
            ),
            Err(e) => tracing::warn!(
                %method,
                %path,
                error = %e,
                latency_ms = start.elapsed().as_millis() as u64,
                "Request failed"
            ),
        }
        result
    }
}

/// Rejects requests missing a header, without running the rest of the chain.
#[derive(Debug, Clone)]
pub struct RequireHeader {
    header: HeaderName,
    status: StatusCode,
}

impl RequireHeader {
    pub fn new(header: HeaderName) -> Self {
        Self {
            header,
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// Status returned when the header is missing (400 by default).
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

#[async_trait]
impl Middleware for RequireHeader {
    fn name(&self) -> &str {
        "require_header"
    }

    async fn invoke(&self, req: Request, _handler: &HandlerRef, next: Next) -> MiddlewareResult {
        if req.headers().contains_key(&self.header) {
            return next.run(req).await;
        }

        tracing::warn!(header = %self.header, "Rejecting request without required header");
        if let Some(span) = current_span() {
            span.log_kv([("event", "rejected"), ("missing_header", self.header.as_str())]);
        }
        Ok((self.status, format!("Missing {} header", self.header)).into_response())
    }
}
