//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_capture_total` (counter): body captures by direction, outcome
//! - `gateway_captured_bytes` (histogram): bytes read per capture
//! - `gateway_exchange_duration_ms` (histogram): request entry to response log
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::body::CaptureOutcome;

/// Direction of a captured body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_capture(direction: Direction, bytes: usize, outcome: CaptureOutcome) {
    metrics::counter!(
        "gateway_capture_total",
        "direction" => direction.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_captured_bytes",
        "direction" => direction.as_str(),
        "outcome" => outcome.as_str()
    )
    .record(bytes as f64);
}

pub fn record_exchange_duration(elapsed_ms: u64) {
    metrics::histogram!("gateway_exchange_duration_ms").record(elapsed_ms as f64);
}
