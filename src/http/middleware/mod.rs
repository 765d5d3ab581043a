//! Middleware and terminal handler contracts.
//!
//! A middleware is injected into request processing and can run code before
//! and after the rest of the pipeline. It receives the request, a reference
//! to the handler that will eventually serve it, and a [`Next`] continuation:
//!
//! ```ignore
//! #[async_trait]
//! impl Middleware for Audit {
//!     async fn invoke(&self, req: Request, _handler: &HandlerRef, next: Next) -> MiddlewareResult {
//!         tracing::debug!(source = ?req.headers().get("x-source"), "audit");
//!         next.run(req).await
//!     }
//! }
//! ```
//!
//! A middleware must either run `next` or return a response of its own.
//! A future that never resolves stalls the request until the router's
//! request timeout fires. Returning `Err` (or panicking) produces a
//! `500 Internal Server Error` for the client.

pub mod builtin;
pub mod chain;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;

pub use axum::BoxError;
pub use builtin::{RequestLog, RequireHeader};
pub use chain::{Chain, Next};

/// Outcome of a middleware or handler.
pub type MiddlewareResult = Result<Response, BoxError>;

/// An interceptor in the request pipeline.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn invoke(&self, req: Request, handler: &HandlerRef, next: Next) -> MiddlewareResult;
}

/// The business handler at the end of the chain.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Name used in the request span's operation name.
    fn name(&self) -> &str;

    async fn call(&self, req: Request) -> MiddlewareResult;
}

/// Shared reference to a resolved terminal handler.
#[derive(Clone)]
pub struct HandlerRef {
    inner: Arc<dyn Handler>,
}

impl HandlerRef {
    pub fn new(handler: impl Handler) -> Self {
        Self { inner: Arc::new(handler) }
    }

    pub fn from_arc(handler: Arc<dyn Handler>) -> Self {
        Self { inner: handler }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn call(&self, req: Request) -> MiddlewareResult {
        self.inner.call(req).await
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRef").field("name", &self.name()).finish()
    }
}

/// Handler built from an async closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// Build a named [`Handler`] from an async closure.
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    FnHandler { name: name.into(), f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, req: Request) -> MiddlewareResult {
        (self.f)(req).await
    }
}
