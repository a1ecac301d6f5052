//! Core engine for the offline-resilience layer.
//!
//! This crate provides:
//! - Versioned cache stores with a SQLite backend
//! - Store lifecycle (precache, pruning of stale versions)
//! - Request classification into route categories
//! - Caching strategies and the fetch dispatcher that ties them together
//! - Unified error types and layered configuration

pub mod cache;
pub mod canonical;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod network;
pub mod request;
pub mod router;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, MatchOptions, StoreHandle};
pub use config::{AppConfig, ConfigError};
pub use dispatch::{Dispatch, FetchDispatcher};
pub use error::Error;
pub use lifecycle::{CacheVersion, PrecacheManifest, PrecacheReport, StoreLifecycle};
pub use network::{FetchOptions, Network};
pub use request::{Headers, RequestDescriptor, Response};
pub use router::{Classifier, RouteCategory, RouteConfig};
pub use strategy::{FallbackLookup, NavigationFallback, Strategy, StrategyExecutor};
