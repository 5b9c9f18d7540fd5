//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the upstream proxy handler
//! - Wire up middleware (tracing, request id, timeout, filter chain)
//! - Bind server to listener and serve until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::uri::InvalidUri;
use axum::http::{HeaderName, Request, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::filter::{build_filter_chain, ChainError, FilterChain};
use crate::http::upstream::Upstream;
use crate::observability::clock::SystemClock;
use crate::observability::trace::{MakeTraceId, TRACE_ID_HEADER};

/// Error building the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid filter chain: {0}")]
    Chain(#[from] ChainError),
    #[error("invalid upstream address: {0}")]
    Upstream(#[from] InvalidUri),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<Upstream>,
}

/// HTTP server for the capture gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server with the filter chain described by `config`.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let chain = build_filter_chain(
            &config.capture,
            &config.observability,
            Arc::new(SystemClock),
        )?;
        Self::with_filter_chain(config, chain)
    }

    /// Create a server around an already built filter chain.
    pub fn with_filter_chain(config: GatewayConfig, chain: FilterChain) -> Result<Self, ServerError> {
        let upstream = Upstream::new(&config.upstream, &config.timeouts)?;
        let state = AppState {
            upstream: Arc::new(upstream),
        };

        tracing::debug!(filters = ?chain.names(), "Filter chain built");
        let router = Self::build_router(&config, state, &chain);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, chain: &FilterChain) -> Router {
        let trace_header = HeaderName::try_from(config.observability.trace_header.as_str())
            .unwrap_or_else(|_| HeaderName::from_static(TRACE_ID_HEADER));

        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(chain.layer())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(trace_header.clone()))
            .layer(SetRequestIdLayer::new(trace_header, MakeTraceId))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving in-process.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Forwards every request to the configured upstream.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    state.upstream.forward(request).await
}
