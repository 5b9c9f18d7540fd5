//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Filters produce:
//!     → logging.rs (structured log events: url, body/response, elapsed_ms, trace_id)
//!     → metrics.rs (capture counters, size and latency histograms)
//!
//! Filters consume:
//!     → trace.rs (trace id of the exchange)
//!     → clock.rs (monotonic timestamps)
//! ```

pub mod clock;
pub mod logging;
pub mod metrics;
pub mod trace;

pub use clock::{Clock, ManualClock, SystemClock};
pub use trace::{HeaderTraceContext, MakeTraceId, TraceContext};
