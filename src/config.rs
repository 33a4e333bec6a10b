//! Configuration loading and CLI merging

use crate::error::Result;
use crate::models::{CacheConfig, ModuleSettings, ScanConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File-based configuration structure matching vigil.toml
#[derive(Debug, Deserialize)]
struct FileConfig {
    scan: Option<ScanSection>,
    crawler: Option<CrawlerSection>,
    modules: Option<HashMap<String, ModuleSettings>>,
    cache: Option<CacheConfig>,
}

#[derive(Debug, Deserialize)]
struct ScanSection {
    target: Option<String>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
    follow_redirects: Option<bool>,
    proxy: Option<String>,
    parallel_modules: Option<bool>,
    headers: Option<HashMap<String, String>>,
    cookies: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CrawlerSection {
    max_depth: Option<u32>,
    max_pages: Option<usize>,
    concurrency: Option<usize>,
    crawl_delay_ms: Option<u64>,
    follow_external: Option<bool>,
    include_patterns: Option<Vec<String>>,
    exclude_patterns: Option<Vec<String>>,
}

/// Loads configuration from a TOML file and merges it over defaults
pub fn load_config(path: &Path) -> Result<ScanConfig> {
    let content = std::fs::read_to_string(path)?;
    let file_config: FileConfig = toml::from_str(&content)?;

    let mut config = ScanConfig::default();

    if let Some(scan) = file_config.scan {
        if let Some(target) = scan.target {
            config.target = target;
        }
        if let Some(ua) = scan.user_agent {
            config.user_agent = ua;
        }
        if let Some(timeout) = scan.timeout_secs {
            config.timeout_secs = timeout;
        }
        if let Some(follow) = scan.follow_redirects {
            config.follow_redirects = follow;
        }
        if let Some(proxy) = scan.proxy {
            config.proxy = Some(proxy);
        }
        if let Some(parallel) = scan.parallel_modules {
            config.parallel_modules = parallel;
        }
        if let Some(headers) = scan.headers {
            config.headers = headers;
        }
        if let Some(cookies) = scan.cookies {
            config.cookies = cookies;
        }
    }

    if let Some(crawler) = file_config.crawler {
        if let Some(depth) = crawler.max_depth {
            config.max_depth = depth;
        }
        if let Some(pages) = crawler.max_pages {
            config.max_pages = pages;
        }
        if let Some(concurrency) = crawler.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(delay) = crawler.crawl_delay_ms {
            config.crawl_delay_ms = delay;
        }
        if let Some(external) = crawler.follow_external {
            config.follow_external = external;
        }
        if let Some(include) = crawler.include_patterns {
            config.include_patterns = include;
        }
        if let Some(exclude) = crawler.exclude_patterns {
            config.exclude_patterns = exclude;
        }
    }

    if let Some(modules) = file_config.modules {
        config.modules = modules;
    }

    if let Some(cache) = file_config.cache {
        config.cache = cache;
    }

    Ok(config)
}

/// CLI overrides applied after any file configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub target: Option<String>,
    pub timeout: Option<u64>,
    pub max_depth: Option<u32>,
    pub max_pages: Option<usize>,
    pub concurrency: Option<usize>,
    pub crawl_delay_ms: Option<u64>,
    pub follow_external: bool,
    pub parallel_modules: bool,
    pub proxy: Option<String>,
    pub headers: Option<Vec<String>>,
    pub disable_modules: Option<Vec<String>>,
    pub no_cache: bool,
    pub redis_url: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

/// Merges CLI arguments into an existing ScanConfig
pub fn merge_cli_args(config: &mut ScanConfig, overrides: CliOverrides) {
    if let Some(target) = overrides.target {
        config.target = target;
    }
    if let Some(timeout) = overrides.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(depth) = overrides.max_depth {
        config.max_depth = depth;
    }
    if let Some(pages) = overrides.max_pages {
        config.max_pages = pages;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(delay) = overrides.crawl_delay_ms {
        config.crawl_delay_ms = delay;
    }
    if overrides.follow_external {
        config.follow_external = true;
    }
    if overrides.parallel_modules {
        config.parallel_modules = true;
    }
    if let Some(proxy) = overrides.proxy {
        config.proxy = Some(proxy);
    }
    if let Some(headers) = overrides.headers {
        for header in headers {
            if let Some((key, value)) = header.split_once(':') {
                config
                    .headers
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }
    if let Some(disabled) = overrides.disable_modules {
        for name in disabled {
            config
                .modules
                .insert(name, ModuleSettings { enabled: false });
        }
    }
    if overrides.no_cache {
        config.cache.enabled = false;
    }
    if let Some(url) = overrides.redis_url {
        config.cache.redis_url = Some(url);
    }
    if let Some(dir) = overrides.cache_dir {
        config.cache.disk_dir = Some(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_sections() {
        let toml = r#"
            [scan]
            target = "https://example.com"
            timeout_secs = 15
            parallel_modules = true

            [crawler]
            max_depth = 5
            max_pages = 50
            exclude_patterns = ["logout"]

            [modules.seo]
            enabled = false

            [cache]
            ttl_secs = 120
            memory_capacity = 64
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vigil.toml");
        std::fs::write(&path, toml).expect("write config");

        let config = load_config(&path).expect("load config");
        assert_eq!(config.target, "https://example.com");
        assert_eq!(config.timeout_secs, 15);
        assert!(config.parallel_modules);
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.exclude_patterns, vec!["logout".to_string()]);
        assert!(!config.module_enabled("seo"));
        assert!(config.module_enabled("headers"));
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.cache.memory_capacity, 64);
        // Unset cache fields keep their defaults
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = ScanConfig::default();
        merge_cli_args(
            &mut config,
            CliOverrides {
                target: Some("https://target.test".to_string()),
                max_depth: Some(1),
                headers: Some(vec!["X-Scan: vigil".to_string()]),
                disable_modules: Some(vec!["perf".to_string()]),
                no_cache: true,
                ..CliOverrides::default()
            },
        );

        assert_eq!(config.target, "https://target.test");
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.headers.get("X-Scan").map(String::as_str), Some("vigil"));
        assert!(!config.module_enabled("perf"));
        assert!(!config.cache.enabled);
    }
}
