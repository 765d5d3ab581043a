//! Middleware chain execution.
//!
//! # Design Decisions
//! - `Next` for index `i` runs middleware `i`, handing it a `Next` for `i + 1`;
//!   past the last index it calls the terminal handler
//! - `Next::run` consumes the continuation, so a stage runs at most once
//! - Failures are caught once, at the outermost boundary, and become a 500

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use futures_util::FutureExt;

use crate::http::middleware::{HandlerRef, Middleware, MiddlewareResult};
use crate::http::response;
use crate::observability::metrics;
use crate::tracer::SpanHandle;

/// Ordered, immutable list of middleware.
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Arc<[Arc<dyn Middleware>]>,
}

impl Chain {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares: middlewares.into() }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.middlewares.iter().map(|m| m.name())
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Continuation representing the rest of the pipeline.
pub struct Next {
    chain: Chain,
    index: usize,
    handler: HandlerRef,
}

impl Next {
    pub fn new(chain: Chain, handler: HandlerRef) -> Self {
        Self { chain, index: 0, handler }
    }

    /// Number of middleware still ahead of the handler.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }

    /// Run the rest of the pipeline.
    pub async fn run(self, req: Request) -> MiddlewareResult {
        let Some(middleware) = self.chain.middlewares.get(self.index).cloned() else {
            tracing::trace!(handler = self.handler.name(), "Invoking handler");
            return self.handler.call(req).await;
        };

        tracing::trace!(index = self.index, middleware = middleware.name(), "Entering middleware");
        let next = Next {
            chain: self.chain.clone(),
            index: self.index + 1,
            handler: self.handler.clone(),
        };
        middleware.invoke(req, &self.handler, next).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Run `req` through `chain` and `handler`, converting any failure into a 500.
pub async fn run(chain: &Chain, req: Request, handler: &HandlerRef, span: &SpanHandle) -> Response {
    let next = Next::new(chain.clone(), handler.clone());
    guarded(next.run(req), handler, span).await
}

/// Await `pipeline`, turning errors and panics into the fixed error response.
pub async fn guarded<F>(pipeline: F, handler: &HandlerRef, span: &SpanHandle) -> Response
where
    F: Future<Output = MiddlewareResult>,
{
    match AssertUnwindSafe(pipeline).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => fail(handler, span, "error", &err.to_string()),
        Err(panic) => fail(handler, span, "panic", &panic_message(panic.as_ref())),
    }
}

fn fail(handler: &HandlerRef, span: &SpanHandle, kind: &str, message: &str) -> Response {
    tracing::error!(
        handler = handler.name(),
        error.kind = kind,
        error = %message,
        "Error while executing middlewares"
    );
    span.record_error(kind, message);
    metrics::record_middleware_error(kind);
    response::server_error()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
