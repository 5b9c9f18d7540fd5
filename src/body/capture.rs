//! Joining a streamed body into one buffer.
//!
//! # Responsibilities
//! - Collect every frame of a body without blocking the runtime
//! - Bound the join by size and by deadline
//! - Hand back a [`ReplayBody`] carrying exactly the bytes that were consumed
//!
//! # Design Decisions
//! - Capture never fails: stream errors and limits become a [`CaptureOutcome`]
//! - The joined `BytesMut` is frozen into the replay buffer, no second copy
//! - Dropping the join future (client gone, request timeout) drops the buffer

use std::fmt;
use std::time::Duration;

use axum::body::Body;
use axum::http::HeaderMap;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;

use crate::body::{decode_text, ReplayBody};

/// Bounds applied while joining a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Maximum number of bytes buffered before capture gives up.
    pub max_bytes: usize,
    /// Maximum time spent waiting for the stream to finish.
    pub join_timeout: Option<Duration>,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            join_timeout: None,
        }
    }
}

/// How a join ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The entire stream was joined.
    Complete,
    /// The stream exceeded `max_bytes`.
    Truncated,
    /// The join deadline expired before the stream ended.
    TimedOut,
    /// The stream yielded an error.
    Failed,
}

impl CaptureOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Truncated => "truncated",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }

    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

impl fmt::Display for CaptureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`join_body`].
#[derive(Debug)]
pub struct Captured {
    /// Bytes shown in logs (at most `max_bytes`).
    logged: Bytes,
    /// Number of bytes read from the original stream.
    len: usize,
    outcome: CaptureOutcome,
    body: ReplayBody,
}

impl Captured {
    fn new(joined: Bytes, limits: &CaptureLimits, outcome: CaptureOutcome, body: ReplayBody) -> Self {
        let logged = joined.slice(..joined.len().min(limits.max_bytes));
        Self {
            logged,
            len: joined.len(),
            outcome,
            body,
        }
    }

    pub fn outcome(&self) -> CaptureOutcome {
        self.outcome
    }

    /// Number of bytes consumed from the original stream.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Logged bytes decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        decode_text(&self.logged).into_owned()
    }

    /// Whether the joined stream ended with trailers.
    pub fn has_trailers(&self) -> bool {
        self.body.has_trailers()
    }

    /// The replay stream handed to the downstream consumer.
    pub fn into_body(self) -> ReplayBody {
        self.body
    }
}

/// Join all frames of `body`, within `limits`.
pub async fn join_body(mut body: Body, limits: &CaptureLimits) -> Captured {
    let deadline = limits
        .join_timeout
        .map(|timeout| tokio::time::Instant::now() + timeout);
    let mut joined = BytesMut::new();
    let mut trailers: Option<HeaderMap> = None;

    loop {
        let polled = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, body.frame()).await,
            None => Ok(body.frame().await),
        };
        let Ok(next) = polled else {
            let joined = joined.freeze();
            let replay = ReplayBody::resume(joined.clone(), body);
            return Captured::new(joined, limits, CaptureOutcome::TimedOut, replay);
        };

        match next {
            None => break,
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) => {
                    joined.extend_from_slice(&data);
                    if joined.len() > limits.max_bytes {
                        let joined = joined.freeze();
                        let replay = ReplayBody::resume(joined.clone(), body);
                        return Captured::new(joined, limits, CaptureOutcome::Truncated, replay);
                    }
                }
                Err(frame) => {
                    if let Ok(frame_trailers) = frame.into_trailers() {
                        trailers
                            .get_or_insert_with(HeaderMap::new)
                            .extend(frame_trailers);
                    }
                }
            },
            Some(Err(error)) => {
                let joined = joined.freeze();
                let replay = ReplayBody::failed(joined.clone(), error);
                return Captured::new(joined, limits, CaptureOutcome::Failed, replay);
            }
        }
    }

    let joined = joined.freeze();
    let replay = ReplayBody::captured(joined.clone(), trailers);
    Captured::new(joined, limits, CaptureOutcome::Complete, replay)
}
