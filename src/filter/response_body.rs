//! Response body capture.
//!
//! Waits for the rest of the chain to produce a response, joins the response
//! body, logs it with the exchange latency, and re-emits the same bytes as a
//! single chunk with a matching `content-length`.
//!
//! Responses that have no body to speak of (`HEAD`, `1xx`, `204`, `304`) or
//! that are meant to stream indefinitely (configured content types, `text/event-stream`
//! by default) are passed through unmodified.
//!
//! A body that ended with trailers keeps its original framing: `content-length`
//! framing has no place for trailers on HTTP/1.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Response, StatusCode};
use futures_util::future::BoxFuture;

use crate::body::{join_body, CaptureLimits};
use crate::filter::chain::{Chain, GlobalFilter, HIGHEST_PRECEDENCE};
use crate::filter::exchange::Exchange;
use crate::filter::request_body::RequestBodyFilter;
use crate::observability::clock::{elapsed_ms, Clock, SystemClock};
use crate::observability::metrics::{self, Direction};

/// Captures, logs and rewrites outbound response bodies.
#[derive(Clone)]
pub struct ResponseBodyFilter {
    limits: CaptureLimits,
    streaming_content_types: Arc<[String]>,
    clock: Arc<dyn Clock>,
}

impl ResponseBodyFilter {
    pub const NAME: &'static str = "response-body";
    pub const ORDER: i32 = HIGHEST_PRECEDENCE + 4;

    pub fn new(limits: CaptureLimits) -> Self {
        Self {
            limits,
            streaming_content_types: Arc::from(vec!["text/event-stream".to_string()]),
            clock: Arc::new(SystemClock),
        }
    }

    /// Content types streamed through without capture (prefix match, case-insensitive).
    pub fn streaming_content_types(mut self, types: Vec<String>) -> Self {
        self.streaming_content_types = types
            .into_iter()
            .map(|t| t.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl GlobalFilter for ResponseBodyFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn runs_after(&self) -> &'static [&'static str] {
        &[RequestBodyFilter::NAME]
    }

    fn filter(&self, exchange: Exchange, chain: Chain) -> BoxFuture<'static, Response<Body>> {
        let path = exchange.path().to_owned();
        let method = exchange.method().clone();
        let trace_id = exchange.context().trace_id().to_owned();
        let started_at = exchange.context().started_at();
        let limits = self.limits;
        let streaming = self.streaming_content_types.clone();
        let clock = self.clock.clone();

        Box::pin(async move {
            let response = chain.proceed(exchange).await;

            if !is_capturable(&method, &response, &streaming) {
                tracing::debug!(
                    url = %path,
                    status = %response.status(),
                    trace_id = %trace_id,
                    "Response streamed without capture"
                );
                return response;
            }

            let (mut parts, body) = response.into_parts();
            let captured = join_body(body, &limits).await;
            let elapsed = exchange_elapsed(started_at, clock.now(), &path, &trace_id);
            let outcome = captured.outcome();

            if outcome.is_complete() {
                tracing::info!(
                    url = %path,
                    response = %captured.text(),
                    elapsed_ms = elapsed,
                    trace_id = %trace_id,
                    "Response completed"
                );
                if !captured.has_trailers() {
                    parts
                        .headers
                        .insert(header::CONTENT_LENGTH, HeaderValue::from(captured.len()));
                    parts.headers.remove(header::TRANSFER_ENCODING);
                }
            } else {
                tracing::warn!(
                    url = %path,
                    response = %captured.text(),
                    bytes = captured.len(),
                    outcome = %outcome,
                    elapsed_ms = elapsed,
                    trace_id = %trace_id,
                    "Response completed, body capture incomplete"
                );
            }
            metrics::record_capture(Direction::Response, captured.len(), outcome);
            metrics::record_exchange_duration(elapsed);

            Response::from_parts(parts, Body::new(captured.into_body()))
        })
    }
}

/// Latency since the request entered; zero when no start was recorded.
fn exchange_elapsed(started_at: Option<Instant>, now: Instant, path: &str, trace_id: &str) -> u64 {
    match started_at {
        Some(start) => elapsed_ms(start, now),
        None => {
            tracing::warn!(
                url = %path,
                trace_id = %trace_id,
                "No request start timestamp, reporting zero latency; is `{}` registered?",
                RequestBodyFilter::NAME
            );
            0
        }
    }
}

fn is_capturable(method: &Method, response: &Response<Body>, streaming: &[String]) -> bool {
    let status = response.status();
    if method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return false;
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);
    match content_type {
        Some(ct) => !streaming.iter().any(|s| ct.starts_with(s.as_str())),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;

    use bytes::Bytes;
    use futures_util::stream;
    use http_body::Frame;
    use http_body_util::{BodyExt, StreamBody};
    use tower::util::BoxCloneSyncService;
    use tower::service_fn;

    use crate::filter::exchange::ExchangeContext;
    use crate::observability::clock::ManualClock;

    fn response_chain(filter: ResponseBodyFilter, clock: Arc<ManualClock>) -> Chain {
        let inner = service_fn(move |_req: axum::http::Request<Body>| {
            let clock = clock.clone();
            async move {
                clock.advance(Duration::from_millis(40));
                Ok::<_, Infallible>(Response::new(Body::from("late")))
            }
        });
        let filters: Vec<Arc<dyn GlobalFilter>> = vec![Arc::new(filter)];
        Chain::new(filters.into(), BoxCloneSyncService::new(inner))
    }

    #[tokio::test]
    async fn test_missing_start_timestamp_is_not_fatal() {
        let clock = Arc::new(ManualClock::new());
        let filter = ResponseBodyFilter::new(CaptureLimits::default()).with_clock(clock.clone());
        let chain = response_chain(filter, clock);

        let request = axum::http::Request::builder()
            .uri("/no-start")
            .body(Body::empty())
            .unwrap();
        let exchange = Exchange::new(request, ExchangeContext::default());

        let response = chain.proceed(exchange).await;
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"late");
    }

    #[tokio::test]
    async fn test_trailers_keep_chunked_framing() {
        let inner = service_fn(|_req: axum::http::Request<Body>| async {
            let mut trailers = axum::http::HeaderMap::new();
            trailers.insert("grpc-status", HeaderValue::from_static("0"));
            let frames: Vec<Result<Frame<Bytes>, Infallible>> = vec![
                Ok(Frame::data(Bytes::from_static(b"ok"))),
                Ok(Frame::trailers(trailers)),
            ];
            let body = Body::new(StreamBody::new(stream::iter(frames)));
            Ok::<_, Infallible>(Response::new(body))
        });
        let filters: Vec<Arc<dyn GlobalFilter>> =
            vec![Arc::new(ResponseBodyFilter::new(CaptureLimits::default()))];
        let chain = Chain::new(filters.into(), BoxCloneSyncService::new(inner));

        let request = axum::http::Request::builder()
            .uri("/rpc")
            .body(Body::empty())
            .unwrap();
        let response = chain.proceed(Exchange::new(request, ExchangeContext::default())).await;

        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        let collected = response.into_body().collect().await.unwrap();
        assert_eq!(collected.trailers().unwrap()["grpc-status"], "0");
        assert_eq!(collected.to_bytes(), Bytes::from_static(b"ok"));
    }

    #[test]
    fn test_elapsed_defaults_to_zero_without_start() {
        assert_eq!(exchange_elapsed(None, Instant::now(), "/x", ""), 0);
    }

    #[test]
    fn test_streaming_responses_are_not_capturable() {
        let streaming = vec!["text/event-stream".to_string()];
        let sse = Response::builder()
            .header("content-type", "text/event-stream; charset=utf-8")
            .body(Body::empty())
            .unwrap();
        assert!(!is_capturable(&Method::GET, &sse, &streaming));

        let json = Response::builder()
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap();
        assert!(is_capturable(&Method::GET, &json, &streaming));
        assert!(!is_capturable(&Method::HEAD, &json, &streaming));

        let not_modified = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .unwrap();
        assert!(!is_capturable(&Method::GET, &not_modified, &streaming));
    }
}
