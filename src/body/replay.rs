//! Single-pass replay of a captured body.
//!
//! Once a body has been joined for logging, the bytes are handed back to the
//! downstream consumer through [`ReplayBody`]. It yields the materialized
//! chunk exactly once and then ends; it is not restartable.
//!
//! When the join stopped early (size limit, deadline, stream error) the replay
//! continues with whatever is left of the original stream, so the consumer
//! still observes every byte the client or backend produced.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::HeaderMap;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};

/// A body that replays previously captured bytes for one consumer pass.
#[derive(Debug)]
pub struct ReplayBody {
    /// Joined bytes, yielded as a single data frame.
    captured: Option<Bytes>,
    /// Untouched remainder of the original stream, if the join stopped early.
    rest: Option<Body>,
    /// Error the original stream produced while it was being joined.
    error: Option<axum::Error>,
    /// Trailers seen while joining a complete stream.
    trailers: Option<HeaderMap>,
}

impl ReplayBody {
    /// Replay a fully joined body.
    pub fn captured(bytes: Bytes, trailers: Option<HeaderMap>) -> Self {
        Self {
            captured: Some(bytes),
            rest: None,
            error: None,
            trailers,
        }
    }

    /// Replay a joined prefix, then resume streaming the original body.
    pub fn resume(prefix: Bytes, rest: Body) -> Self {
        Self {
            captured: Some(prefix),
            rest: Some(rest),
            error: None,
            trailers: None,
        }
    }

    /// Replay a joined prefix, then surface the error the original stream hit.
    pub fn failed(prefix: Bytes, error: axum::Error) -> Self {
        Self {
            captured: Some(prefix),
            rest: None,
            error: Some(error),
            trailers: None,
        }
    }

    /// Whether trailers will follow the data.
    pub fn has_trailers(&self) -> bool {
        self.trailers.is_some()
    }

    fn captured_len(&self) -> u64 {
        self.captured.as_ref().map_or(0, |b| b.len() as u64)
    }
}

impl HttpBody for ReplayBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if let Some(data) = this.captured.take() {
            if !data.is_empty() {
                return Poll::Ready(Some(Ok(Frame::data(data))));
            }
        }

        if let Some(rest) = this.rest.as_mut() {
            match Pin::new(rest).poll_frame(cx) {
                Poll::Ready(None) => this.rest = None,
                other => return other,
            }
        }

        if let Some(error) = this.error.take() {
            return Poll::Ready(Some(Err(error)));
        }

        Poll::Ready(this.trailers.take().map(|t| Ok(Frame::trailers(t))))
    }

    fn is_end_stream(&self) -> bool {
        self.captured_len() == 0
            && self.rest.is_none()
            && self.error.is_none()
            && self.trailers.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        let captured = self.captured_len();
        match &self.rest {
            Some(rest) => {
                let inner = rest.size_hint();
                let mut hint = SizeHint::new();
                hint.set_lower(inner.lower() + captured);
                if let Some(upper) = inner.upper() {
                    hint.set_upper(upper + captured);
                }
                hint
            }
            None => SizeHint::with_exact(captured),
        }
    }
}
