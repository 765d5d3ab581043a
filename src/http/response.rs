//! Responses produced by the dispatch engine itself.
//!
//! # Design Decisions
//! - Failures inside the chain map to one fixed 500 response
//! - Error detail goes to the span and the log, never into the body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Body of every internally generated 500 response.
pub const SERVER_ERROR_BODY: &str = "500: Internal Server Error";

/// The response returned when a middleware, the handler, or tracer setup fails.
pub fn server_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_BODY).into_response()
}
