//! Request identification.
//!
//! # Responsibilities
//! - Assign a UUID v4 request id to requests that arrive without one
//! - Echo the request id on the response
//! - Expose the id to the span manager
//!
//! # Design Decisions
//! - Request ID added as early as possible (outermost layer) so the request
//!   span can carry it

use axum::extract::Request;
use axum::http::HeaderName;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the request id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request id assigned to `request`, if any.
pub fn request_id(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
}

/// Wrap `router` so every request has an id and every response echoes it.
pub fn with_request_id(router: Router) -> Router {
    router
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
}
