//! HTTP host for the filter chain.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, TraceLayer, request id, timeout)
//!     → filter chain (request/response body capture)
//!     → upstream.rs (forward to backend, stream response back)
//!     → client
//! ```

pub mod server;
pub mod upstream;

pub use server::{GatewayServer, ServerError};
pub use upstream::Upstream;
