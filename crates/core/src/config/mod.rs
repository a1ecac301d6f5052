//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFLINE_*)
//! 2. TOML config file (if OFFLINE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! List-valued settings take array syntax in the environment too, e.g.
//! `OFFLINE_OFFLINE_FIRST_ROUTES='["/scan", "/checkout"]'`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::canonical::canonicalize;
use crate::lifecycle::{CacheVersion, PrecacheManifest};
use crate::router::RouteConfig;
use crate::strategy::NavigationFallback;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFLINE_*)
/// 2. TOML config file (if OFFLINE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identifier of the current deploy. Changing it retires every other store.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Prefix joined with `cache_version` to name the current store.
    #[serde(default = "default_store_prefix")]
    pub store_prefix: String,

    /// Origin of the application being made offline-capable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// URLs populated into the store at install time. Paths resolve against `origin`.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Path prefixes that are never intercepted (admin, authentication).
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,

    /// Health-check path answered with 204/503 and never cached.
    #[serde(default = "default_ping_path")]
    pub ping_path: String,

    /// Bulk-sync resource served network-then-cache.
    #[serde(default = "default_sync_path")]
    pub sync_path: String,

    /// Exact paths served cache-first even though they are documents.
    #[serde(default = "default_offline_first_routes")]
    pub offline_first_routes: Vec<String>,

    /// Same-origin path prefix holding static assets.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// File extensions (without dot) treated as static assets on the app origin.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Host suffixes of external asset CDNs.
    #[serde(default = "default_external_asset_hosts")]
    pub external_asset_hosts: Vec<String>,

    /// Store key of the generic offline document.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Suffix tried last by the navigation fallback chain.
    #[serde(default = "default_document_suffix")]
    pub document_suffix: String,

    /// Path to SQLite store database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the proxy listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// User-Agent string for requests the layer issues itself (precache).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest response body, in bytes, a strategy buffers and stores.
    /// Pass-through traffic is streamed and never limited.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects followed by live fetches. Zero hands redirects back
    /// to the caller, which a proxy needs for login flows.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_cache_version() -> String {
    "v15".into()
}

fn default_store_prefix() -> String {
    "scandroid-cache-".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/fsp-login",
        "/scan",
        "/beneficiary-offline",
        "/success-offline",
        "/static/scandroid.png",
        "/static/scandroid_banner.png",
        "/static/ns1.png",
        "/static/ns2.png",
        "https://cdn.jsdelivr.net/npm/jsqr@1.4.0/dist/jsQR.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excluded_prefixes() -> Vec<String> {
    vec!["/fsp-admin".into(), "/fsp-login".into()]
}

fn default_ping_path() -> String {
    "/ping".into()
}

fn default_sync_path() -> String {
    "/api/offline/latest.zip".into()
}

fn default_offline_first_routes() -> Vec<String> {
    vec!["/scan".into(), "/beneficiary-offline".into(), "/success-offline".into()]
}

fn default_static_prefix() -> String {
    "/static/".into()
}

fn default_static_extensions() -> Vec<String> {
    ["js", "css", "png", "jpg", "jpeg", "webp", "svg", "ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_external_asset_hosts() -> Vec<String> {
    vec!["cdn.jsdelivr.net".into()]
}

fn default_offline_document() -> String {
    "/offline".into()
}

fn default_document_suffix() -> String {
    ".html".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offline-cache.sqlite")
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_user_agent() -> String {
    "offline-proxy/0.1".into()
}

fn default_max_bytes() -> usize {
    512 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            store_prefix: default_store_prefix(),
            origin: default_origin(),
            precache: default_precache(),
            excluded_prefixes: default_excluded_prefixes(),
            ping_path: default_ping_path(),
            sync_path: default_sync_path(),
            offline_first_routes: default_offline_first_routes(),
            static_prefix: default_static_prefix(),
            static_extensions: default_static_extensions(),
            external_asset_hosts: default_external_asset_hosts(),
            offline_document: default_offline_document(),
            document_suffix: default_document_suffix(),
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFLINE_`
    /// 2. TOML file from `OFFLINE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFLINE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFLINE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The application origin as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL with a host".into() }),
        }
    }

    /// The current cache version.
    pub fn cache_version(&self) -> CacheVersion {
        CacheVersion::new(&self.cache_version)
    }

    /// Classifier inputs.
    pub fn route_config(&self) -> Result<RouteConfig, ConfigError> {
        Ok(RouteConfig {
            origin: self.origin_url()?,
            excluded_prefixes: self.excluded_prefixes.clone(),
            ping_path: self.ping_path.clone(),
            sync_path: self.sync_path.clone(),
            offline_first_routes: self.offline_first_routes.iter().cloned().collect(),
            static_prefix: self.static_prefix.clone(),
            static_extensions: self.static_extensions.clone(),
            external_asset_hosts: self.external_asset_hosts.clone(),
        })
    }

    /// The precache list resolved against `origin`.
    pub fn precache_manifest(&self) -> Result<PrecacheManifest, ConfigError> {
        let origin = self.origin_url()?;
        PrecacheManifest::resolve(&origin, &self.precache)
            .map_err(|e| ConfigError::Invalid { field: "precache".into(), reason: e.to_string() })
    }

    /// The navigation fallback chain ending in the offline document, which
    /// always lives on `origin`.
    pub fn navigation_fallback(&self) -> Result<NavigationFallback, ConfigError> {
        let origin = self.origin_url()?;
        let document = canonicalize(&self.offline_document, Some(&origin))
            .map_err(|e| ConfigError::Invalid { field: "offline_document".into(), reason: e.to_string() })?;
        Ok(NavigationFallback::standard(&self.document_suffix, document))
    }
}
