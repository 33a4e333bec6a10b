//! Response time and page weight checks over the crawl snapshot

use crate::context::TestContext;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{Finding, ModuleResult, Severity, TestResult, TestStatus};
use crate::registry::TestModule;
use async_trait::async_trait;

/// Flags slow or oversized pages recorded during the crawl. Thresholds
/// are fields rather than constants so callers can tune them.
pub struct PerfModule {
    pub slow_ms: u64,
    pub max_bytes: u64,
}

impl Default for PerfModule {
    fn default() -> Self {
        Self {
            slow_ms: 2_000,
            max_bytes: 2_000_000,
        }
    }
}

#[async_trait]
impl TestModule for PerfModule {
    fn name(&self) -> &str {
        "perf"
    }

    fn description(&self) -> &str {
        "Flags slow responses and oversized pages from the crawl"
    }

    async fn run(&self, _client: &HttpClient, context: &TestContext) -> Result<ModuleResult> {
        let mut result = ModuleResult::new(self.name());

        let mut timing = TestResult::new("response-times");
        for page in &context.pages {
            // Cache hits carry a zero response time and are skipped
            if page.response_time_ms > self.slow_ms {
                timing.add_finding(
                    Finding::new(
                        "Slow Page Response",
                        "The page took unusually long to respond during the crawl.",
                        Severity::Low,
                        "Performance",
                    )
                    .with_url(&page.url)
                    .with_evidence(format!(
                        "responded in {}ms (threshold {}ms)",
                        page.response_time_ms, self.slow_ms
                    ))
                    .with_recommendation("Profile the endpoint and add server-side caching."),
                );
            }
        }
        timing.mark_completed(TestStatus::Passed);
        result.add_test(timing);

        let mut weight = TestResult::new("page-weight");
        for page in &context.pages {
            if page.size_bytes > self.max_bytes {
                weight.add_finding(
                    Finding::new(
                        "Oversized Page",
                        "The page body is larger than the configured budget.",
                        Severity::Info,
                        "Performance",
                    )
                    .with_url(&page.url)
                    .with_evidence(format!(
                        "{} bytes (budget {} bytes)",
                        page.size_bytes, self.max_bytes
                    ))
                    .with_recommendation("Compress responses and trim unused assets."),
                );
            }
        }
        weight.mark_completed(TestStatus::Passed);
        result.add_test(weight);

        result.mark_completed();
        Ok(result)
    }
}
