//! Network client for the offline layer.
//!
//! This crate provides the reqwest-backed [`offline_core::Network`]
//! implementation shared by the proxy server and the CLI.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Forwarded};
