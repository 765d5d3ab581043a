//! Per-route dispatcher.
//!
//! # Responsibilities
//! - Make sure the tracer exists (lazy, exactly once)
//! - Open the request span and bind the request context
//! - Run the middleware chain, or the handler directly when the chain is empty
//! - Close the span and record request metrics
//!
//! # Design Decisions
//! - One dispatcher per route; the router resolves the route, the dispatcher
//!   substitutes the chain for the direct handler call
//! - The span guard lives on this future's stack, so a cancelled request
//!   still finishes its span

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::response::Response;
use tracing::Instrument;

use crate::http::context::{self, RequestContext};
use crate::http::middleware::{chain, Chain, HandlerRef};
use crate::http::response;
use crate::observability::metrics;
use crate::tracer::TracerInitializer;

/// Wraps a resolved handler with the middleware chain.
#[derive(Clone)]
pub struct Dispatcher {
    handler: HandlerRef,
    chain: Chain,
    tracer: Arc<TracerInitializer>,
}

impl Dispatcher {
    pub fn new(handler: HandlerRef, chain: Chain, tracer: Arc<TracerInitializer>) -> Self {
        Self { handler, chain, tracer }
    }

    pub async fn dispatch(&self, mut req: Request) -> Response {
        let start = Instant::now();
        let method = req.method().clone();

        let tracer = match self.tracer.ensure_initialized() {
            Ok(tracer) => tracer,
            Err(e) => {
                tracing::error!(handler = self.handler.name(), error = %e, "Cannot dispatch without tracer");
                let response = response::server_error();
                metrics::record_request(method.as_str(), response.status().as_u16(), self.handler.name(), start);
                return response;
            }
        };

        let guard = context::open_span(&tracer, &req, self.handler.name());
        let span = guard.span().clone();
        let ctx = RequestContext::new(span.clone());
        req.extensions_mut().insert(ctx.clone());

        let log_span = tracing::info_span!(
            "request",
            operation = span.operation_name().as_deref().unwrap_or_default(),
            trace_id = %format_args!("{:x}", span.context().trace_id),
        );

        let pipeline = async {
            if self.chain.is_empty() {
                chain::guarded(self.handler.call(req), &self.handler, &span).await
            } else {
                chain::run(&self.chain, req, &self.handler, &span).await
            }
        };
        let response = ctx.scope(pipeline).instrument(log_span).await;

        let status = response.status().as_u16();
        span.set_tag("http.status_code", status);
        guard.close();

        metrics::record_request(method.as_str(), status, self.handler.name(), start);
        response
    }
}
