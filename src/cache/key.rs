//! Stable cache key derivation

use sha2::{Digest, Sha256};
use url::Url;

/// Deterministic cache key: SHA-256 over the normalized URL and the
/// sorted serialization of its query parameters. Two logically identical
/// requests always hash to the same key regardless of parameter order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives a key from a URL, folding its query string into the
    /// sorted parameter set.
    pub fn from_url(url: &str) -> Self {
        Self::from_parts(url, &[])
    }

    /// Derives a key from a URL plus additional request parameters.
    pub fn from_parts(url: &str, extra_params: &[(String, String)]) -> Self {
        let mut params: Vec<(String, String)> = extra_params.to_vec();

        let base = match Url::parse(url) {
            Ok(parsed) => {
                params.extend(
                    parsed
                        .query_pairs()
                        .map(|(k, v)| (k.into_owned(), v.into_owned())),
                );
                canonical_base(&parsed)
            }
            Err(_) => url.trim().to_string(),
        };

        params.sort();

        let mut hasher = Sha256::new();
        hasher.update(base.as_bytes());
        for (name, value) in &params {
            hasher.update(b"|");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical URL form: scheme, host, port and path with the fragment and
/// query stripped and any trailing slash trimmed.
fn canonical_base(url: &Url) -> String {
    let mut path = url.path().to_string();
    if path.ends_with('/') && path.len() > 1 {
        path.pop();
    }
    let port = url
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();
    format!(
        "{}://{}{}{}",
        url.scheme(),
        url.host_str().unwrap_or(""),
        port,
        path
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_param_order_independence() {
        let a = CacheKey::from_url("https://example.com/search?a=1&b=2");
        let b = CacheKey::from_url("https://example.com/search?b=2&a=1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_distinct_urls() {
        let a = CacheKey::from_url("https://example.com/a?x=1");
        let b = CacheKey::from_url("https://example.com/b?x=1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_ignores_fragment_and_trailing_slash() {
        let a = CacheKey::from_url("https://example.com/page/");
        let b = CacheKey::from_url("https://example.com/page#section");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_extra_params_merge_with_query() {
        let a = CacheKey::from_parts(
            "https://example.com/api?b=2",
            &[("a".to_string(), "1".to_string())],
        );
        let b = CacheKey::from_url("https://example.com/api?a=1&b=2");
        assert_eq!(a, b);
    }
}
