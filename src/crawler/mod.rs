//! Cache-aware concurrent site crawler
//!
//! Traversal is breadth-first in effect but executed as a recursive
//! fan-out: every page spawns fetch tasks for its links at depth+1, all
//! bounded by one global semaphore so in-flight requests never exceed
//! the configured cap regardless of branching factor. Every fetch is
//! cache-aside. Single-fetch failures are logged and contribute nothing;
//! they never abort the crawl or sibling tasks.

pub mod extractor;

use crate::cache::{CacheKey, ScanCache};
use crate::error::{Result, VigilError};
use crate::http::HttpClient;
use crate::models::{ApiEndpoint, CrawledPage, DiscoverySource, ScanConfig};
use crate::progress::ScanStats;
use chrono::Local;
use futures::future::BoxFuture;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Everything a crawl produced
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub pages: Vec<CrawledPage>,
    pub api_endpoints: Vec<ApiEndpoint>,
}

/// What gets written back to the cache for one fetched URL
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedFetch {
    page: CrawledPage,
    endpoints: Vec<ApiEndpoint>,
}

/// Mutable crawl state, all behind one mutex so the visited
/// check-then-insert is atomic.
#[derive(Default)]
struct CrawlState {
    visited: HashSet<String>,
    pages: Vec<CrawledPage>,
    endpoint_urls: HashSet<String>,
    endpoints: Vec<ApiEndpoint>,
}

pub struct Crawler {
    client: HttpClient,
    cache: Option<Arc<ScanCache>>,
    stats: Arc<ScanStats>,
    cancel: Arc<AtomicBool>,
    max_depth: u32,
    max_pages: usize,
    concurrency: usize,
    follow_external: bool,
    crawl_delay: Option<Duration>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl Crawler {
    /// Builds a crawler from configuration. Invalid filter patterns are
    /// a fatal configuration error.
    pub fn new(
        client: HttpClient,
        cache: Option<Arc<ScanCache>>,
        config: &ScanConfig,
        stats: Arc<ScanStats>,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self> {
        let include = compile_patterns(&config.include_patterns)?;
        let exclude = compile_patterns(&config.exclude_patterns)?;
        Ok(Self {
            client,
            cache,
            stats,
            cancel,
            max_depth: config.max_depth,
            max_pages: config.max_pages.max(1),
            concurrency: config.concurrency.max(1),
            follow_external: config.follow_external,
            crawl_delay: (config.crawl_delay_ms > 0)
                .then(|| Duration::from_millis(config.crawl_delay_ms)),
            include,
            exclude,
        })
    }

    /// Crawls from the root URL and returns the discovered pages and
    /// API endpoints. Fails only when the root URL itself is unusable.
    pub async fn crawl(&self, root_url: &str) -> Result<CrawlOutcome> {
        let root = Url::parse(root_url)
            .map_err(|e| VigilError::CrawlError(format!("invalid root URL '{root_url}': {e}")))?;
        let base_host = root
            .host_str()
            .ok_or_else(|| {
                VigilError::CrawlError(format!("root URL '{root_url}' has no host"))
            })?
            .to_string();

        let job = Arc::new(CrawlJob {
            client: self.client.clone(),
            cache: self.cache.clone(),
            stats: Arc::clone(&self.stats),
            cancel: Arc::clone(&self.cancel),
            base_host,
            max_depth: self.max_depth,
            max_pages: self.max_pages,
            follow_external: self.follow_external,
            crawl_delay: self.crawl_delay,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            limiter: Semaphore::new(self.concurrency),
            state: Mutex::new(CrawlState::default()),
        });

        Arc::clone(&job).visit(root_url.to_string(), 0, None).await;

        let state = {
            let mut guard = job.state.lock().await;
            std::mem::take(&mut *guard)
        };
        info!(
            "Crawl finished: {} pages, {} API endpoints",
            state.pages.len(),
            state.endpoints.len()
        );
        Ok(CrawlOutcome {
            pages: state.pages,
            api_endpoints: state.endpoints,
        })
    }
}

struct CrawlJob {
    client: HttpClient,
    cache: Option<Arc<ScanCache>>,
    stats: Arc<ScanStats>,
    cancel: Arc<AtomicBool>,
    base_host: String,
    max_depth: u32,
    max_pages: usize,
    follow_external: bool,
    crawl_delay: Option<Duration>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    /// Global in-flight bound, acquired once per fetch
    limiter: Semaphore,
    state: Mutex<CrawlState>,
}

impl CrawlJob {
    fn visit(
        self: Arc<Self>,
        url: String,
        depth: u32,
        parent: Option<String>,
    ) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if self.cancel.load(Ordering::Relaxed) || depth > self.max_depth {
                return;
            }
            let Ok(parsed) = Url::parse(&url) else {
                debug!("Skipping unparseable URL {url}");
                return;
            };
            if !self.should_crawl(&url, &parsed) {
                return;
            }

            let canonical = normalize_url(&url);
            {
                // Atomic check-then-insert: exactly one task wins a URL
                let mut state = self.state.lock().await;
                if state.visited.contains(&canonical) || state.visited.len() >= self.max_pages {
                    return;
                }
                state.visited.insert(canonical.clone());
            }

            let permit = match self.limiter.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            if self.cancel.load(Ordering::Relaxed) {
                return;
            }
            if let Some(delay) = self.crawl_delay {
                sleep(delay).await;
            }

            let fetched = self.fetch_page(&canonical, &url, depth, parent).await;
            drop(permit);

            let Some((page, endpoints)) = fetched else {
                return;
            };
            let links = page.links.clone();

            {
                let mut state = self.state.lock().await;
                state.pages.push(page);
                for endpoint in endpoints {
                    if state.endpoint_urls.insert(endpoint.url.clone()) {
                        state.endpoints.push(endpoint);
                        self.stats.record_api_endpoint();
                    }
                }
            }
            self.stats.record_page();

            if depth >= self.max_depth {
                return;
            }
            let mut handles = Vec::new();
            for link in links {
                if self.cancel.load(Ordering::Relaxed) {
                    break;
                }
                let child = Arc::clone(&self).visit(link, depth + 1, Some(canonical.clone()));
                handles.push(tokio::spawn(child));
            }
            for handle in handles {
                let _ = handle.await;
            }
        })
    }

    /// Fetches one URL, cache-aside: a hit is rehydrated with the
    /// current depth and parent and a zero response time; a miss is
    /// fetched, parsed and written back.
    async fn fetch_page(
        &self,
        canonical: &str,
        url: &str,
        depth: u32,
        parent: Option<String>,
    ) -> Option<(CrawledPage, Vec<ApiEndpoint>)> {
        let key = CacheKey::from_url(url);

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&key).await {
                match serde_json::from_value::<CachedFetch>(value) {
                    Ok(mut cached) => {
                        debug!("Cache hit for {canonical}");
                        cached.page.depth = depth;
                        cached.page.parent_url = parent;
                        cached.page.response_time_ms = 0;
                        return Some((cached.page, cached.endpoints));
                    }
                    Err(e) => debug!("Ignoring malformed cache entry for {canonical}: {e}"),
                }
            }
        }

        let started = Instant::now();
        let response = match self.client.get(url).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Fetch failed for {url}: {e}");
                return None;
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let cookies: HashMap<String, String> = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_cookie_pair)
            .collect();
        let content_type = headers.get("content-type").cloned().unwrap_or_default();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed reading body of {url}: {e}");
                return None;
            }
        };

        let mut page = CrawledPage {
            url: canonical.to_string(),
            status,
            content_type: content_type.clone(),
            title: None,
            depth,
            parent_url: parent,
            links: Vec::new(),
            forms: Vec::new(),
            scripts: Vec::new(),
            stylesheets: Vec::new(),
            meta: HashMap::new(),
            headers,
            cookies,
            response_time_ms: started.elapsed().as_millis() as u64,
            size_bytes: body.len() as u64,
            fetched_at: Local::now(),
        };

        let mut endpoints = Vec::new();
        if content_type.contains("text/html") || content_type.is_empty() {
            let content = extractor::parse_html(&final_url, &body);
            page.title = content.title;
            page.meta = content.meta;
            page.links = content.links;
            page.forms = content.forms;
            page.scripts = content.scripts;
            page.stylesheets = content.stylesheets;
            // Secondary discovery source; never fails the page
            endpoints = extractor::extract_api_endpoints(&final_url, &body);
        } else if is_api_content_type(&content_type) {
            endpoints.push(ApiEndpoint {
                url: canonical.to_string(),
                method: Some("GET".to_string()),
                parameters: final_url
                    .query_pairs()
                    .map(|(name, _)| name.into_owned())
                    .collect(),
                content_type: Some(content_type.clone()),
                source: DiscoverySource::Crawler,
            });
        }

        if let Some(cache) = &self.cache {
            let record = CachedFetch {
                page: page.clone(),
                endpoints: endpoints.clone(),
            };
            if let Ok(value) = serde_json::to_value(&record) {
                cache.set(&key, value, None).await;
            }
        }

        Some((page, endpoints))
    }

    /// Scheme, host and pattern filters, applied before the visited claim
    fn should_crawl(&self, url: &str, parsed: &Url) -> bool {
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        if !self.follow_external && parsed.host_str() != Some(self.base_host.as_str()) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(url)) {
            return false;
        }
        if self.exclude.iter().any(|re| re.is_match(url)) {
            debug!("Excluded by pattern: {url}");
            return false;
        }
        true
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| VigilError::ConfigError(format!("invalid URL pattern '{p}': {e}")))
        })
        .collect()
}

/// Normalizes a URL for deduplication (strips fragment and trailing slash)
pub fn normalize_url(url: &str) -> String {
    if let Ok(mut parsed) = Url::parse(url) {
        parsed.set_fragment(None);
        let mut result = parsed.to_string();
        if result.ends_with('/') && result.len() > 1 {
            result.pop();
        }
        result
    } else {
        url.to_string()
    }
}

fn is_api_content_type(content_type: &str) -> bool {
    let lower = content_type.to_lowercase();
    !lower.contains("xhtml") && (lower.contains("json") || lower.contains("xml"))
}

fn parse_cookie_pair(set_cookie: &str) -> Option<(String, String)> {
    let pair = set_cookie.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}
