//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, connect info, graceful shutdown)
//!     → request.rs (request id layer)
//!     → axum routing picks the route's dispatcher
//!     → dispatcher.rs (tracer init, span open via context.rs)
//!     → middleware/chain.rs (middleware 0..N-1, then the handler)
//!     → response.rs (fixed 500 on failure)
//!     → Send to client
//! ```

pub mod app;
pub mod context;
pub mod dispatcher;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use app::{AppBuilder, BuildError, MiddlewareEntry, MiddlewareRegistry};
pub use context::{current_span, RequestContext};
pub use dispatcher::Dispatcher;
pub use middleware::{handler_fn, BoxError, Handler, HandlerRef, Middleware, MiddlewareResult, Next};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
