//! Trace identifiers.
//!
//! # Responsibilities
//! - Generate a trace id for requests that arrive without one
//! - Resolve the trace id of an exchange from its request headers
//!
//! # Design Decisions
//! - The id travels in a single header (default `x-request-id`) and is
//!   echoed on the response by tower-http's propagate layer
//! - A missing or non-ASCII id resolves to an empty string, never an error

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Default header carrying the trace id.
pub const TRACE_ID_HEADER: &str = "x-request-id";

/// Source of the trace identifier for the current exchange.
pub trait TraceContext: Send + Sync + 'static {
    fn trace_id(&self, request: &Request<Body>) -> Option<String>;
}

/// Reads the trace id from a request header.
#[derive(Debug, Clone)]
pub struct HeaderTraceContext {
    header: HeaderName,
}

impl HeaderTraceContext {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for HeaderTraceContext {
    fn default() -> Self {
        Self::new(HeaderName::from_static(TRACE_ID_HEADER))
    }
}

impl TraceContext for HeaderTraceContext {
    fn trace_id(&self, request: &Request<Body>) -> Option<String> {
        request
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }
}

/// Generates UUID v4 trace ids in simple (undashed) form.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTraceId;

impl MakeRequestId for MakeTraceId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().simple().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}
