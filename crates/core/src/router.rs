//! Request classification.
//!
//! [`Classifier::classify`] is a pure function of the request and the
//! configured route tables. Rules are evaluated in a fixed order and the
//! first match wins; the categories overlap (an offline-first route may
//! also look like a document or an asset), so the order is part of the
//! routing policy.

use std::collections::HashSet;
use std::fmt;

use url::Url;

use crate::request::RequestDescriptor;
use crate::strategy::Strategy;

/// Outcome of classifying one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteCategory {
    /// Not GET, or an admin/auth path. Never intercepted.
    Excluded,
    /// Health check.
    NoCachePing,
    /// Bulk-sync resource.
    SpecialSyncResource,
    /// App route that must open without connectivity.
    OfflineFirstApp,
    /// Full-document load.
    Navigation,
    /// Script, stylesheet, image or CDN asset.
    StaticAsset,
    /// Nothing matched. Never intercepted.
    Unmatched,
}

impl RouteCategory {
    /// The strategy that serves this category, or `None` for pass-through.
    pub fn strategy(self) -> Option<Strategy> {
        match self {
            RouteCategory::Excluded | RouteCategory::Unmatched => None,
            RouteCategory::NoCachePing => Some(Strategy::NoCachePing),
            RouteCategory::SpecialSyncResource => Some(Strategy::NetworkThenCache),
            RouteCategory::OfflineFirstApp | RouteCategory::StaticAsset => Some(Strategy::CacheFirst),
            RouteCategory::Navigation => Some(Strategy::NetworkFirstNavigation),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteCategory::Excluded => "excluded",
            RouteCategory::NoCachePing => "no_cache_ping",
            RouteCategory::SpecialSyncResource => "special_sync_resource",
            RouteCategory::OfflineFirstApp => "offline_first_app",
            RouteCategory::Navigation => "navigation",
            RouteCategory::StaticAsset => "static_asset",
            RouteCategory::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for RouteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route tables consulted by the classifier.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Application origin; static prefix and extension rules only apply here.
    pub origin: Url,
    pub excluded_prefixes: Vec<String>,
    pub ping_path: String,
    pub sync_path: String,
    pub offline_first_routes: HashSet<String>,
    pub static_prefix: String,
    pub static_extensions: Vec<String>,
    /// Host suffixes of allow-listed CDNs.
    pub external_asset_hosts: Vec<String>,
}

/// Maps requests to route categories.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: RouteConfig,
}

impl Classifier {
    pub fn new(config: RouteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Assign exactly one category to `req`.
    pub fn classify(&self, req: &RequestDescriptor) -> RouteCategory {
        let path = req.url().path();

        if req.method() != "GET" {
            return RouteCategory::Excluded;
        }
        if self.config.excluded_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return RouteCategory::Excluded;
        }
        if path == self.config.ping_path {
            return RouteCategory::NoCachePing;
        }
        if path == self.config.sync_path {
            return RouteCategory::SpecialSyncResource;
        }
        if self.config.offline_first_routes.contains(path) {
            return RouteCategory::OfflineFirstApp;
        }
        if req.is_navigation() || accepts_html(req) {
            return RouteCategory::Navigation;
        }
        if self.is_static_asset(req.url()) {
            return RouteCategory::StaticAsset;
        }

        RouteCategory::Unmatched
    }

    fn is_static_asset(&self, url: &Url) -> bool {
        let same_origin = url.origin() == self.config.origin.origin();
        if same_origin && (url.path().starts_with(&self.config.static_prefix) || self.has_asset_extension(url.path())) {
            return true;
        }

        match url.host_str() {
            Some(host) => self
                .config
                .external_asset_hosts
                .iter()
                .any(|suffix| host.ends_with(suffix.as_str())),
            None => false,
        }
    }

    fn has_asset_extension(&self, path: &str) -> bool {
        let file = path.rsplit('/').next().unwrap_or(path);
        match file.rsplit_once('.') {
            Some((_, ext)) => self.config.static_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

fn accepts_html(req: &RequestDescriptor) -> bool {
    req.headers().get_all("accept").any(|accept| accept.contains("text/html"))
}
