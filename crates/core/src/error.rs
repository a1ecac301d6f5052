//! Unified error types for the offline layer.
//!
//! Store misses are not errors; lookups return `Option` and the strategies
//! treat `None` as the next step of their fallback chain.

use tokio_rusqlite::rusqlite;

use crate::config::ConfigError;

/// Unified error type for the offline layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A live fetch failed at the transport level (DNS, connect, timeout, body read).
    #[error("NETWORK_UNAVAILABLE: {0}")]
    NetworkUnavailable(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// The response may not be stored (partial content).
    #[error("UNCACHEABLE: status {0}")]
    Uncacheable(u16),

    /// A single manifest URL could not be fetched or stored.
    #[error("PRECACHE_FAILED: {url}: {reason}")]
    PrecacheFailed { url: String, reason: String },

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Invalid request that cannot be sent upstream.
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// HTTP status a host adapter should report when this error reaches the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NetworkUnavailable(_) => 502,
            Error::FetchTooLarge(_) => 502,
            Error::InvalidUrl(_) | Error::InvalidRequest(_) => 400,
            Error::Database(_)
            | Error::MigrationFailed(_)
            | Error::CorruptEntry(_)
            | Error::Uncacheable(_)
            | Error::PrecacheFailed { .. }
            | Error::Config(_) => 500,
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
