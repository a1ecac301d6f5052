//! URL canonicalization for store keys and manifest resolution.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("relative URL without a base: {0}")]
    MissingBase(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for crate::Error {
    fn from(err: UrlError) -> Self {
        crate::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a URL string, resolving relative references against `base`.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve paths such as `/scan` against the base origin
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.contains("://") {
        Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else {
        let base = base.ok_or_else(|| UrlError::MissingBase(trimmed.to_string()))?;
        base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// The URL with query string and fragment removed.
///
/// Two requests that differ only in their query string share this form.
pub fn without_query(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped
}

/// A same-origin URL pointing at `path`, with no query string.
pub fn with_path(origin: &Url, path: &str) -> Url {
    let mut target = without_query(origin);
    target.set_path(path);
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://app.test/").unwrap()
    }

    #[test]
    fn test_canonicalize_absolute() {
        let url = canonicalize("https://cdn.jsdelivr.net/npm/jsqr@1.4.0/dist/jsQR.js", None).unwrap();
        assert_eq!(url.host_str(), Some("cdn.jsdelivr.net"));
        assert_eq!(url.path(), "/npm/jsqr@1.4.0/dist/jsQR.js");
    }

    #[test]
    fn test_canonicalize_relative_against_base() {
        let url = canonicalize("/static/ns1.png", Some(&base())).unwrap();
        assert_eq!(url.as_str(), "https://app.test/static/ns1.png");
    }

    #[test]
    fn test_canonicalize_relative_without_base() {
        let result = canonicalize("/scan", None);
        assert!(matches!(result, Err(UrlError::MissingBase(_))));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://APP.TEST/Scan", None).unwrap();
        assert_eq!(url.host_str(), Some("app.test"));
        assert_eq!(url.path(), "/Scan");
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://app.test/scan?lang=fr#top", None).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("lang=fr"));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd", None);
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_whitespace_only() {
        assert!(matches!(canonicalize("   ", Some(&base())), Err(UrlError::Empty)));
    }

    #[test]
    fn test_without_query() {
        let url = Url::parse("https://app.test/scan?lang=en#x").unwrap();
        assert_eq!(without_query(&url).as_str(), "https://app.test/scan");
    }

    #[test]
    fn test_with_path_drops_query() {
        let url = Url::parse("https://app.test/foo?lang=en").unwrap();
        assert_eq!(with_path(&url, "/foo.html").as_str(), "https://app.test/foo.html");
    }
}
