//! Ordered filter chain.
//!
//! # Responsibilities
//! - Hold the registered filters sorted by ascending order value
//! - Validate ordering constraints once, when the chain is built
//! - Run an exchange through every filter, then through the wrapped service
//!
//! # Design Decisions
//! - Lower order runs earlier on the way in, and finishes later on the way out
//! - Filters are trait objects behind `Arc`; the chain itself is cheap to clone
//! - The wrapped service is boxed so `Chain` has no type parameters
//!
//! ```text
//! Request ─▶ FilterChainService ─▶ filter[0] ─▶ filter[1] ─▶ … ─▶ inner service
//!                                     │            │                  │
//! Response ◀──────────────────────────┴────────────┴──────────────────┘
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};

use crate::filter::exchange::{Exchange, ExchangeContext};
use crate::observability::trace::{HeaderTraceContext, TraceContext};

/// Order value that runs before everything else.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// Order value that runs after everything else.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

type InnerService = BoxCloneSyncService<Request<Body>, Response<Body>, Infallible>;

/// A stage of the filter chain.
pub trait GlobalFilter: Send + Sync + 'static {
    /// Name used in logs and in ordering constraints.
    fn name(&self) -> &'static str;

    /// Position in the chain; lower runs first.
    fn order(&self) -> i32;

    /// Names of filters that must be registered with a lower order.
    fn runs_after(&self) -> &'static [&'static str] {
        &[]
    }

    /// Inspect or transform the exchange, then delegate to `chain`.
    fn filter(&self, exchange: Exchange, chain: Chain) -> BoxFuture<'static, Response<Body>>;
}

/// Error raised when a chain's ordering constraints do not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("filters `{first}` and `{second}` share order {order}")]
    DuplicateOrder {
        order: i32,
        first: &'static str,
        second: &'static str,
    },
    #[error("filter `{filter}` requires `{required}`, which is not registered")]
    MissingDependency {
        filter: &'static str,
        required: &'static str,
    },
    #[error("filter `{filter}` (order {order}) must run after `{required}` (order {required_order})")]
    OutOfOrder {
        filter: &'static str,
        order: i32,
        required: &'static str,
        required_order: i32,
    },
}

/// The remainder of the chain after the current filter.
#[derive(Clone)]
pub struct Chain {
    filters: Arc<[Arc<dyn GlobalFilter>]>,
    position: usize,
    inner: InnerService,
}

impl Chain {
    pub(crate) fn new(filters: Arc<[Arc<dyn GlobalFilter>]>, inner: InnerService) -> Self {
        Self {
            filters,
            position: 0,
            inner,
        }
    }

    /// Hand the exchange to the next filter, or to the wrapped service when
    /// no filters remain.
    pub fn proceed(self, exchange: Exchange) -> BoxFuture<'static, Response<Body>> {
        match self.filters.get(self.position).cloned() {
            Some(filter) => {
                let next = Self {
                    position: self.position + 1,
                    ..self
                };
                filter.filter(exchange, next)
            }
            None => {
                let (mut request, context) = exchange.into_parts();
                request.extensions_mut().insert(context);
                let inner = self.inner;
                Box::pin(async move {
                    match inner.oneshot(request).await {
                        Ok(response) => response,
                        Err(never) => match never {},
                    }
                })
            }
        }
    }
}

/// A validated, ordered set of filters.
#[derive(Clone)]
pub struct FilterChain {
    filters: Arc<[Arc<dyn GlobalFilter>]>,
    tracer: Arc<dyn TraceContext>,
}

impl FilterChain {
    pub fn builder() -> FilterChainBuilder {
        FilterChainBuilder::new()
    }

    /// Filter names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Tower layer running this chain in front of a service.
    pub fn layer(&self) -> FilterChainLayer {
        FilterChainLayer { chain: self.clone() }
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.names())
            .finish()
    }
}

/// Collects filters and validates them into a [`FilterChain`].
pub struct FilterChainBuilder {
    filters: Vec<Arc<dyn GlobalFilter>>,
    tracer: Arc<dyn TraceContext>,
}

impl FilterChainBuilder {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            tracer: Arc::new(HeaderTraceContext::default()),
        }
    }

    /// Register a filter. Registration order does not matter.
    pub fn with(mut self, filter: impl GlobalFilter) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Source of trace ids for exchanges entering the chain.
    pub fn trace_context(mut self, tracer: impl TraceContext) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Sort by order and check ordering constraints.
    pub fn build(mut self) -> Result<FilterChain, ChainError> {
        self.filters.sort_by_key(|f| f.order());

        for pair in self.filters.windows(2) {
            if pair[0].order() == pair[1].order() {
                return Err(ChainError::DuplicateOrder {
                    order: pair[0].order(),
                    first: pair[0].name(),
                    second: pair[1].name(),
                });
            }
        }

        for filter in &self.filters {
            for &required in filter.runs_after() {
                let Some(dependency) = self.filters.iter().find(|f| f.name() == required) else {
                    return Err(ChainError::MissingDependency {
                        filter: filter.name(),
                        required,
                    });
                };
                if dependency.order() >= filter.order() {
                    return Err(ChainError::OutOfOrder {
                        filter: filter.name(),
                        order: filter.order(),
                        required,
                        required_order: dependency.order(),
                    });
                }
            }
        }

        Ok(FilterChain {
            filters: self.filters.into(),
            tracer: self.tracer,
        })
    }
}

impl Default for FilterChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Layer produced by [`FilterChain::layer`].
#[derive(Clone)]
pub struct FilterChainLayer {
    chain: FilterChain,
}

impl<S> Layer<S> for FilterChainLayer
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    type Service = FilterChainService;

    fn layer(&self, inner: S) -> Self::Service {
        FilterChainService {
            chain: self.chain.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service running every request through the filter chain.
#[derive(Clone)]
pub struct FilterChainService {
    chain: FilterChain,
    inner: InnerService,
}

impl Service<Request<Body>> for FilterChainService {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The inner service is driven with `oneshot`, which polls readiness itself.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let trace_id = self.chain.tracer.trace_id(&request).unwrap_or_default();
        let exchange = Exchange::new(request, ExchangeContext::new(trace_id));
        let chain = Chain::new(self.chain.filters.clone(), self.inner.clone());
        let response = chain.proceed(exchange);
        Box::pin(async move { Ok(response.await) })
    }
}
