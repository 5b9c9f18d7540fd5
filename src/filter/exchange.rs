//! Per-request exchange state.
//!
//! An [`Exchange`] is what flows through the filter chain: the inbound
//! request plus an [`ExchangeContext`] owned by this exchange alone. The
//! context replaces an untyped attribute map; filters hand values to each
//! other through its typed fields.

use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request};

/// Typed values shared between the filters of one exchange.
#[derive(Debug, Clone, Default)]
pub struct ExchangeContext {
    started_at: Option<Instant>,
    trace_id: String,
}

impl ExchangeContext {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            started_at: None,
            trace_id: trace_id.into(),
        }
    }

    /// Record when the exchange entered the gateway.
    pub fn stamp_start(&mut self, at: Instant) {
        if self.started_at.is_some() {
            tracing::debug!(trace_id = %self.trace_id, "Start timestamp overwritten");
        }
        self.started_at = Some(at);
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Trace id of the exchange; empty when none was supplied.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }
}

/// One request/response cycle travelling through the chain.
#[derive(Debug)]
pub struct Exchange {
    request: Request<Body>,
    context: ExchangeContext,
}

impl Exchange {
    pub fn new(request: Request<Body>, context: ExchangeContext) -> Self {
        Self { request, context }
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn context(&self) -> &ExchangeContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExchangeContext {
        &mut self.context
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Raw request path, without the query string.
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.request.headers().get(header::CONTENT_TYPE)
    }

    /// Declared `content-length`, if present and well formed.
    pub fn content_length(&self) -> Option<u64> {
        self.request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn into_parts(self) -> (Request<Body>, ExchangeContext) {
        (self.request, self.context)
    }
}
