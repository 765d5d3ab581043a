//! Request tracing for axum applications through an ordered middleware chain.
//!
//! Every routed request is dispatched through a [`Dispatcher`](http::Dispatcher):
//! it lazily initializes the tracer (exactly once per process), opens a
//! server span continuing the caller's trace, binds it as the current span,
//! runs the configured middleware in order around the terminal handler, and
//! finishes the span exactly once, whether the request succeeds, fails,
//! short-circuits or is cancelled.

pub mod config;
pub mod demo;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod tracer;

pub use config::schema::ServiceConfig;
pub use http::{AppBuilder, HttpServer};
pub use lifecycle::Shutdown;
pub use tracer::{Tracer, TracerInitializer};
