//! The frozen scan context handed to every test module

use crate::crawler::CrawlOutcome;
use crate::error::{Result, VigilError};
use crate::models::{ApiEndpoint, CrawledPage, ScanConfig};
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

/// Immutable snapshot of everything the crawl discovered. Built once
/// per scan after crawling completes and shared read-only (behind an
/// `Arc`) across all concurrently running modules.
#[derive(Debug, Serialize)]
pub struct TestContext {
    pub target_url: String,
    pub base_url: Url,
    pub pages: Vec<CrawledPage>,
    pub api_endpoints: Vec<ApiEndpoint>,
    pub default_headers: HashMap<String, String>,
    pub default_cookies: HashMap<String, String>,
}

impl TestContext {
    /// Freezes a crawl outcome into a context. Fails only when the
    /// target URL cannot be turned into a base URL.
    pub fn from_crawl(config: &ScanConfig, outcome: CrawlOutcome) -> Result<Self> {
        let mut base_url = Url::parse(&config.target)?;
        base_url.set_path("/");
        base_url.set_query(None);
        base_url.set_fragment(None);
        if base_url.host_str().is_none() {
            return Err(VigilError::ConfigError(format!(
                "target '{}' has no host",
                config.target
            )));
        }
        Ok(Self {
            target_url: config.target.clone(),
            base_url,
            pages: outcome.pages,
            api_endpoints: outcome.api_endpoints,
            default_headers: config.headers.clone(),
            default_cookies: config.cookies.clone(),
        })
    }

    /// All crawled URLs
    pub fn urls(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.url.as_str()).collect()
    }

    /// Pages that returned HTML
    pub fn html_pages(&self) -> impl Iterator<Item = &CrawledPage> {
        self.pages.iter().filter(|p| p.is_html())
    }

    pub fn find_page(&self, url: &str) -> Option<&CrawledPage> {
        self.pages.iter().find(|p| p.url == url)
    }
}
