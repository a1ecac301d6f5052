//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `cache_version` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL or a precache entry does not resolve
    /// - a designated path does not start with `/`
    /// - `max_bytes` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - a static extension is empty or starts with a dot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set OFFLINE_CACHE_VERSION to the current deploy identifier".into(),
            });
        }

        self.origin_url()?;
        self.precache_manifest()?;

        for (field, path) in [
            ("ping_path", &self.ping_path),
            ("sync_path", &self.sync_path),
            ("static_prefix", &self.static_prefix),
            ("offline_document", &self.offline_document),
        ] {
            if !path.starts_with('/') {
                return Err(invalid(field, "must start with '/'"));
            }
        }

        if self.excluded_prefixes.iter().any(|p| !p.starts_with('/')) {
            return Err(invalid("excluded_prefixes", "every prefix must start with '/'"));
        }
        if self.offline_first_routes.iter().any(|p| !p.starts_with('/')) {
            return Err(invalid("offline_first_routes", "every route must start with '/'"));
        }
        if self.static_extensions.iter().any(|e| e.is_empty() || e.starts_with('.')) {
            return Err(invalid("static_extensions", "extensions must be non-empty and have no leading dot"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.offline_first_routes.contains(&self.ping_path) || self.offline_first_routes.contains(&self.sync_path) {
            tracing::warn!(
                ping_path = %self.ping_path,
                sync_path = %self.sync_path,
                "offline_first_routes overlaps a designated path; the designated route takes precedence"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_version() {
        let config = AppConfig { cache_version: "  ".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Missing { field, .. }) if field == "cache_version"));
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_relative_ping_path() {
        let config = AppConfig { ping_path: "ping".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "ping_path"));
    }

    #[test]
    fn test_validate_dotted_extension() {
        let config = AppConfig { static_extensions: vec![".css".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "static_extensions"));
    }

    #[test]
    fn test_validate_unsupported_precache_scheme() {
        let config = AppConfig { precache: vec!["ftp://files.test/a.zip".into()], ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "precache"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_large_max_bytes() {
        let config = AppConfig { max_bytes: 1 << 31, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let low = AppConfig { timeout_ms: 50, ..Default::default() };
        assert!(matches!(low.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let high = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert!(matches!(high.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let edge = AppConfig { max_bytes: 1, timeout_ms: 100, ..Default::default() };
        assert!(edge.validate().is_ok());
    }
}
