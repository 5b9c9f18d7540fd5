//! Body capture subsystem.
//!
//! # Data Flow
//! ```text
//! streamed body (request from client, response from backend)
//!     → capture.rs (join frames, bounded by size and deadline)
//!     → decoded text for logging
//!     → replay.rs (single-pass body carrying the same bytes)
//!     → downstream consumer
//! ```

pub mod capture;
pub mod replay;

use std::borrow::Cow;

pub use capture::{join_body, CaptureLimits, CaptureOutcome, Captured};
pub use replay::ReplayBody;

/// Decode body bytes for logging. Invalid UTF-8 becomes U+FFFD.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
