//! Request identity.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for requests without one
//! - Expose the header name other layers key on
//!
//! # Design Decisions
//! - Request ID added as early as possible so every log line and the
//!   response carry the same value
//! - IDs supplied by trusted upstreams are kept, not replaced

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the per-request correlation ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Mints UUID v4 request IDs.
#[derive(Clone, Copy, Default)]
pub struct PortalRequestId;

impl MakeRequestId for PortalRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        // A UUID in text form is always a valid header value.
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}
