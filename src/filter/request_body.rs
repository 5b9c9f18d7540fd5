//! Request body capture.
//!
//! Stamps the exchange start time, logs the request path and (when the
//! request carries one) the decoded body, then forwards a request whose body
//! replays the captured bytes.
//!
//! # Branches
//! - No `content-type`: the request is assumed bodiless. Path and trace id
//!   are logged and the request is forwarded untouched.
//! - `content-length` > 0: the body is joined, logged and replaced by a
//!   [`ReplayBody`](crate::body::ReplayBody).
//! - Anything else (zero or missing length): logged like the bodiless case
//!   and forwarded untouched.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;

use crate::body::{join_body, CaptureLimits};
use crate::filter::chain::{Chain, GlobalFilter, HIGHEST_PRECEDENCE};
use crate::filter::exchange::Exchange;
use crate::observability::clock::{Clock, SystemClock};
use crate::observability::metrics::{self, Direction};

/// Captures and logs inbound request bodies.
#[derive(Clone)]
pub struct RequestBodyFilter {
    limits: CaptureLimits,
    capture_body: bool,
    clock: Arc<dyn Clock>,
}

impl RequestBodyFilter {
    pub const NAME: &'static str = "request-body";
    pub const ORDER: i32 = HIGHEST_PRECEDENCE + 3;

    pub fn new(limits: CaptureLimits) -> Self {
        Self {
            limits,
            capture_body: true,
            clock: Arc::new(SystemClock),
        }
    }

    /// Keep stamping the start time but never buffer bodies.
    pub fn capture_body(mut self, enabled: bool) -> Self {
        self.capture_body = enabled;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn should_capture(&self, exchange: &Exchange) -> bool {
        self.capture_body
            && exchange.content_type().is_some()
            && exchange.content_length().is_some_and(|len| len > 0)
    }
}

impl GlobalFilter for RequestBodyFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn filter(&self, mut exchange: Exchange, chain: Chain) -> BoxFuture<'static, Response<Body>> {
        exchange.context_mut().stamp_start(self.clock.now());
        let path = exchange.path().to_owned();
        let trace_id = exchange.context().trace_id().to_owned();

        if !self.should_capture(&exchange) {
            tracing::info!(url = %path, trace_id = %trace_id, "Request started");
            return chain.proceed(exchange);
        }

        let limits = self.limits;
        Box::pin(async move {
            let (request, context) = exchange.into_parts();
            let (parts, body) = request.into_parts();

            let captured = join_body(body, &limits).await;
            let outcome = captured.outcome();
            if outcome.is_complete() {
                tracing::info!(
                    url = %path,
                    body = %captured.text(),
                    trace_id = %trace_id,
                    "Request started"
                );
            } else {
                tracing::warn!(
                    url = %path,
                    body = %captured.text(),
                    bytes = captured.len(),
                    outcome = %outcome,
                    trace_id = %trace_id,
                    "Request started, body capture incomplete"
                );
            }
            metrics::record_capture(Direction::Request, captured.len(), outcome);

            let request = Request::from_parts(parts, Body::new(captured.into_body()));
            chain.proceed(Exchange::new(request, context)).await
        })
    }
}
