//! The live-network collaborator.

use async_trait::async_trait;

use crate::Error;
use crate::request::{RequestDescriptor, Response};

/// Per-fetch transport options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Disable caching at every layer between this process and the origin.
    pub no_store: bool,
}

impl FetchOptions {
    pub const NO_STORE: Self = Self { no_store: true };
}

/// Issues live requests on behalf of the strategies.
///
/// An `Err` means the request never produced a response (DNS, connect,
/// timeout, body read) and must be `Error::NetworkUnavailable` or
/// `Error::FetchTooLarge`. HTTP error statuses are successful fetches.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &RequestDescriptor, options: FetchOptions) -> Result<Response, Error>;
}
