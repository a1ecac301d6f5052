//! HTTP host adapter.
//!
//! Translates every inbound request into a `RequestDescriptor`, asks the
//! dispatcher what to do with it, and either writes the strategy's
//! response or forwards the request upstream untouched.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{self, Uri},
    response::Response,
};
use offline_client::{FetchClient, Forwarded};
use offline_core::request::is_hop_by_hop;
use offline_core::{Dispatch, FetchDispatcher, Headers, RequestDescriptor};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::error::ProxyError;

/// Shared state for the proxy handler.
#[derive(Clone)]
pub struct ProxyState {
    dispatcher: FetchDispatcher,
    client: Arc<FetchClient>,
    origin: Arc<Url>,
}

impl ProxyState {
    pub fn new(dispatcher: FetchDispatcher, client: Arc<FetchClient>, origin: Url) -> Self {
        Self { dispatcher, client, origin: Arc::new(origin) }
    }
}

/// Every path goes through the offline layer.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .fallback(proxy)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn proxy(State(state): State<ProxyState>, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let url = target_url(&state.origin, &parts.uri)?;
    let headers: Headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();
    let navigation = headers.get("sec-fetch-mode") == Some("navigate");
    let descriptor = RequestDescriptor::new(parts.method.as_str(), url)
        .with_headers(headers)
        .with_navigation(navigation);

    match state.dispatcher.handle(&descriptor).await? {
        Dispatch::Respond(response) => into_http(response),
        Dispatch::PassThrough(category) => {
            tracing::trace!(url = %descriptor.url(), %category, "forwarding");
            let body = (!body.is_end_stream()).then(|| body.into_data_stream());
            let forwarded = state.client.forward(&descriptor, body).await?;
            forwarded_into_http(forwarded)
        }
    }
}

/// Absolute-form targets (forward proxy) are used as-is; origin-form
/// targets are resolved against the application origin.
fn target_url(origin: &Url, uri: &Uri) -> Result<Url, ProxyError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return offline_core::canonical::canonicalize(&uri.to_string(), None)
            .map_err(|e| ProxyError::InvalidTarget(e.to_string()));
    }

    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    origin
        .join(path_and_query)
        .map_err(|e| ProxyError::InvalidTarget(e.to_string()))
}

/// Strategy responses carry their full body, so the length is recomputed.
fn into_http(response: offline_core::Response) -> Result<Response, ProxyError> {
    let mut builder = http::Response::builder().status(response.status);
    for (name, value) in response.headers.iter() {
        if is_hop_by_hop(name) || name == "content-length" {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(response.body))
        .map_err(|e| ProxyError::InvalidResponse(e.to_string()))
}

/// Pass-through responses keep the upstream `Content-Length`; the body
/// streams as it arrives.
fn forwarded_into_http(forwarded: Forwarded) -> Result<Response, ProxyError> {
    let mut builder = http::Response::builder().status(forwarded.status);
    for (name, value) in forwarded.headers.iter() {
        if is_hop_by_hop(name) {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from_stream(forwarded.into_body_stream()))
        .map_err(|e| ProxyError::InvalidResponse(e.to_string()))
}
