//! SQLite-backed versioned cache stores.
//!
//! A single database holds any number of named stores. Each store maps a
//! request URL to a full response snapshot. It supports:
//!
//! - Open-by-name, get, put, delete, list-keys, delete-store
//! - Query-insensitive matching
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{MatchOptions, StoreHandle};
