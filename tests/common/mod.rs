//! Common test utilities

use vigil::models::{CacheConfig, ScanConfig};
use wiremock::ResponseTemplate;

/// Creates a test ScanConfig pointing to a wiremock server, with the
/// cache disabled so tests opt in to caching explicitly.
#[allow(dead_code)]
pub fn test_config(target: &str) -> ScanConfig {
    ScanConfig {
        target: target.to_string(),
        user_agent: "Vigil-Test/0.1.0".to_string(),
        timeout_secs: 10,
        max_depth: 2,
        max_pages: 50,
        concurrency: 4,
        cache: CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        },
        ..ScanConfig::default()
    }
}

/// HTML response with the correct Content-Type. wiremock's
/// `set_body_string` forces text/plain, so bodies go through
/// `set_body_raw`.
#[allow(dead_code)]
pub fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}
