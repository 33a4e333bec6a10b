//! HTTP client wrapper with retries, default headers and request tracking

use crate::error::{Result, VigilError};
use crate::models::ScanConfig;
use reqwest::{Client, Method, Response, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Thin wrapper over reqwest carrying the scan's default headers and
/// cookies and an atomic request counter. This is the `make_request`
/// surface handed to test modules.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_count: Arc<AtomicU64>,
    default_headers: HashMap<String, String>,
}

impl HttpClient {
    /// Creates a new HttpClient from scan configuration
    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .cookie_store(true);

        if let Some(ref proxy_url) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| VigilError::ConfigError(format!("Invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let mut default_headers = config.headers.clone();
        if !config.cookies.is_empty() {
            let cookie_line = config
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            default_headers.insert("Cookie".to_string(), cookie_line);
        }

        Ok(Self {
            client: builder.build()?,
            request_count: Arc::new(AtomicU64::new(0)),
            default_headers,
        })
    }

    /// Sends a GET request
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, &[], None).await
    }

    /// Sends a GET request with extra headers
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Response> {
        self.request(Method::GET, url, headers, None).await
    }

    /// Sends a form-encoded POST request
    pub async fn post(&self, url: &str, body: &str) -> Result<Response> {
        self.request(
            Method::POST,
            url,
            &[(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            Some(body),
        )
        .await
    }

    /// Sends a request with a given method, headers and optional body
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
    ) -> Result<Response> {
        self.request_with_timeout(method, url, headers, body, None)
            .await
    }

    /// Full request form with a per-request timeout override
    pub async fn request_with_timeout(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        self.request_with_retry(|| {
            let mut req = self.client.request(method.clone(), url);
            for (key, value) in &self.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }
            for (key, value) in headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if let Some(b) = body {
                req = req.body(b.to_string());
            }
            if let Some(t) = timeout {
                req = req.timeout(t);
            }
            req
        })
        .await
    }

    /// Returns the total number of requests made
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Executes a request with retry and backoff
    async fn request_with_retry<F>(&self, build_request: F) -> Result<Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        const MAX_RETRIES: u32 = 2;
        const INITIAL_BACKOFF_MS: u64 = 500;

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1));
                debug!("Retry attempt {attempt}, waiting {backoff:?}");
                sleep(backoff).await;
            }

            self.request_count.fetch_add(1, Ordering::Relaxed);

            match build_request().send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!("Response: {status} for {}", response.url());

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!("Rate limited by server, backing off");
                        last_error = Some(VigilError::CrawlError(
                            "rate limited by server".to_string(),
                        ));
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    warn!("Request failed (attempt {attempt}): {e}");
                    last_error = Some(VigilError::HttpError(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| VigilError::CrawlError("max retries exceeded".to_string())))
    }
}
