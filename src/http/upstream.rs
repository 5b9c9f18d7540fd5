//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI to the configured backend authority
//! - Forward the request, streaming the body in both directions
//! - Map transport failures to `502 Bad Gateway`

use std::str::FromStr;

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUri, PathAndQuery, Scheme};
use axum::http::{Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::filter::ExchangeContext;

/// The backend every request is forwarded to.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    authority: Authority,
}

impl Upstream {
    pub fn new(config: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, InvalidUri> {
        let authority = Authority::from_str(&config.address)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(timeouts.connect_timeout());
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self { client, authority })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Forward `request` and return the backend's response.
    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        let trace_id = request
            .extensions()
            .get::<ExchangeContext>()
            .map(|ctx| ctx.trace_id().to_owned())
            .unwrap_or_default();

        let (mut parts, body) = request.into_parts();
        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(Scheme::HTTP);
        uri_parts.authority = Some(self.authority.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        parts.uri = match Uri::from_parts(uri_parts) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(trace_id = %trace_id, error = %e, "Failed to rewrite request URI");
                return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
            }
        };

        tracing::debug!(
            trace_id = %trace_id,
            method = %parts.method,
            uri = %parts.uri,
            "Forwarding request upstream"
        );

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => into_gateway_response(response),
            Err(e) => {
                tracing::error!(
                    trace_id = %trace_id,
                    upstream = %self.authority,
                    error = %e,
                    "Upstream error"
                );
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}

fn into_gateway_response(response: Response<Incoming>) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}
