//! Store lifecycle: install-time precache and activation-time pruning.
//!
//! Exactly one store is current, the one named for the configured
//! [`CacheVersion`]. `initialize` fills it from the precache manifest and
//! `activate_current` deletes every other store, so content from a previous
//! deploy is never served after the new version activates.

use std::fmt;

use url::Url;

use crate::Error;
use crate::cache::{CacheDb, StoreHandle};
use crate::canonical::{UrlError, canonicalize};
use crate::network::{FetchOptions, Network};
use crate::request::RequestDescriptor;

/// Opaque identifier of a deploy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheVersion(String);

impl CacheVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the store holding this version's entries.
    pub fn store_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URLs fetched into the store at install time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheManifest {
    urls: Vec<Url>,
}

impl PrecacheManifest {
    pub fn new(urls: Vec<Url>) -> Self {
        Self { urls }
    }

    /// Resolve manifest entries; paths are joined onto `origin`.
    pub fn resolve(origin: &Url, entries: &[String]) -> Result<Self, UrlError> {
        let urls = entries
            .iter()
            .map(|entry| canonicalize(entry, Some(origin)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { urls })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Outcome of one precache pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// Owns the current version and manages stores across deploys.
#[derive(Clone, Debug)]
pub struct StoreLifecycle {
    db: CacheDb,
    version: CacheVersion,
    prefix: String,
}

impl StoreLifecycle {
    pub fn new(db: CacheDb, version: CacheVersion, prefix: impl Into<String>) -> Self {
        Self { db, version, prefix: prefix.into() }
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    /// Name of the current store.
    pub fn current_store_name(&self) -> String {
        self.version.store_name(&self.prefix)
    }

    /// Handle to the current store, without creating it.
    pub fn current_store(&self) -> StoreHandle {
        self.db.store(&self.current_store_name())
    }

    /// Open the current store and populate it from `manifest`.
    ///
    /// Each URL is fetched and stored independently. A failure is logged and
    /// skipped; it never aborts the remaining entries. Only failing to open
    /// the store itself is an error.
    pub async fn initialize(&self, manifest: &PrecacheManifest, network: &dyn Network) -> Result<PrecacheReport, Error> {
        let store = self.db.open_store(&self.current_store_name()).await?;
        tracing::info!(store = store.name(), entries = manifest.len(), "precaching");

        let mut report = PrecacheReport::default();
        for url in manifest.urls() {
            match precache_one(&store, url, network).await {
                Ok(()) => report.cached.push(url.to_string()),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "failed to precache");
                    report.failed.push(url.to_string());
                }
            }
        }

        tracing::info!(
            store = store.name(),
            cached = report.cached.len(),
            failed = report.failed.len(),
            "precache complete"
        );
        Ok(report)
    }

    /// Delete every store except the current one.
    ///
    /// Returns the names of deleted stores. The current store is left
    /// untouched and is not created if absent.
    pub async fn activate_current(&self) -> Result<Vec<String>, Error> {
        let current = self.current_store_name();
        let mut deleted = Vec::new();

        for name in self.db.store_names().await? {
            if name == current {
                continue;
            }
            if self.db.delete_store(&name).await? {
                tracing::info!(store = %name, current = %current, "deleted stale store");
                deleted.push(name);
            }
        }

        Ok(deleted)
    }
}

async fn precache_one(store: &StoreHandle, url: &Url, network: &dyn Network) -> Result<(), Error> {
    let request = RequestDescriptor::get(url.clone());
    let response = network.fetch(&request, FetchOptions::default()).await?;

    if !response.is_success() {
        return Err(Error::PrecacheFailed { url: url.to_string(), reason: format!("status {}", response.status) });
    }

    store.put(&request, &response).await
}
