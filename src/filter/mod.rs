//! Body-interception filters.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → chain.rs (trace id resolved, ExchangeContext created)
//!     → request_body.rs (stamp start, join + log body, replay body)
//!     → response_body.rs (await the rest of the chain)
//!     → inner service (upstream call)
//!     → response_body.rs (join + log response with latency, fix content-length)
//!     → client
//! ```
//!
//! # Design Decisions
//! - Exchanges never share state; the only channel between the two filters
//!   is the typed `ExchangeContext` of that exchange
//! - Capture problems are logged, never returned: the real request and
//!   response always proceed with the original bytes
//! - Bodies are buffered in memory up to `capture.max_body_bytes`; beyond
//!   that they are logged truncated and streamed through

pub mod chain;
pub mod exchange;
pub mod request_body;
pub mod response_body;

pub use chain::{
    Chain, ChainError, FilterChain, FilterChainBuilder, FilterChainLayer, FilterChainService,
    GlobalFilter, HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE,
};
pub use exchange::{Exchange, ExchangeContext};
pub use request_body::RequestBodyFilter;
pub use response_body::ResponseBodyFilter;

use std::sync::Arc;

use axum::http::HeaderName;

use crate::config::{CaptureConfig, ObservabilityConfig};
use crate::observability::clock::Clock;
use crate::observability::trace::HeaderTraceContext;

/// Build the gateway's filter chain from configuration.
pub fn build_filter_chain(
    capture: &CaptureConfig,
    observability: &ObservabilityConfig,
    clock: Arc<dyn Clock>,
) -> Result<FilterChain, ChainError> {
    let limits = capture.limits();
    let trace_header = HeaderName::try_from(observability.trace_header.as_str())
        .unwrap_or_else(|_| HeaderName::from_static(crate::observability::trace::TRACE_ID_HEADER));

    let mut builder = FilterChain::builder()
        .trace_context(HeaderTraceContext::new(trace_header))
        .with(
            RequestBodyFilter::new(limits)
                .capture_body(capture.request_body)
                .with_clock(clock.clone()),
        );

    if capture.response_body {
        builder = builder.with(
            ResponseBodyFilter::new(limits)
                .streaming_content_types(capture.streaming_content_types.clone())
                .with_clock(clock),
        );
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::clock::SystemClock;

    fn chain_for(capture: CaptureConfig) -> FilterChain {
        build_filter_chain(&capture, &ObservabilityConfig::default(), Arc::new(SystemClock)).unwrap()
    }

    #[test]
    fn test_default_chain_has_both_filters() {
        let chain = chain_for(CaptureConfig::default());
        assert_eq!(chain.names(), vec!["request-body", "response-body"]);
    }

    #[test]
    fn test_response_capture_disabled() {
        let capture = CaptureConfig {
            response_body: false,
            ..CaptureConfig::default()
        };
        assert_eq!(chain_for(capture).names(), vec!["request-body"]);
    }

    #[test]
    fn test_request_capture_disabled_keeps_stamping_filter() {
        let capture = CaptureConfig {
            request_body: false,
            ..CaptureConfig::default()
        };
        assert_eq!(chain_for(capture).names(), vec!["request-body", "response-body"]);
    }
}
