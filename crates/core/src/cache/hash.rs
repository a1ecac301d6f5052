//! Store entry key generation.

use sha2::{Digest, Sha256};

/// Compute the key of a stored entry from the request method and canonical URL.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_entry_key("GET", "https://app.test/scan");
        let key2 = compute_entry_key("GET", "https://app.test/scan");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_includes_query() {
        let plain = compute_entry_key("GET", "https://app.test/scan");
        let query = compute_entry_key("GET", "https://app.test/scan?lang=fr");
        assert_ne!(plain, query);
    }

    #[test]
    fn test_key_format() {
        let key = compute_entry_key("GET", "https://app.test/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
