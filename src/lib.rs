//! Body-capturing HTTP gateway.
//!
//! Two filters sit in front of a reverse-proxied backend and log the full
//! request and response bodies of every exchange, without changing the bytes
//! the backend and the client see.

// Core subsystems
pub mod body;
pub mod config;
pub mod filter;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use filter::{FilterChain, RequestBodyFilter, ResponseBodyFilter};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
