//! Structured errors for the offline proxy.
//!
//! Every error becomes a plain-text response that downstream caches must
//! not keep.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// Errors surfaced to proxy clients.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The request target could not be turned into an upstream URL.
    #[error("INVALID_TARGET: {0}")]
    InvalidTarget(String),

    /// A response could not be converted for the client.
    #[error("INVALID_RESPONSE: {0}")]
    InvalidResponse(String),

    /// Error from the offline layer or the upstream fetch.
    #[error(transparent)]
    Offline(#[from] offline_core::Error),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Offline(e) => StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        (status, [(header::CACHE_CONTROL, "no-store")], self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_maps_to_bad_gateway() {
        let err = ProxyError::from(offline_core::Error::NetworkUnavailable("offline".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_target_maps_to_bad_request() {
        let err = ProxyError::InvalidTarget("ftp://x".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    }
}
