//! Basic SEO hygiene checks over the crawl snapshot

use crate::context::TestContext;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{Finding, ModuleResult, Severity, TestResult, TestStatus};
use crate::registry::TestModule;
use async_trait::async_trait;

/// Flags pages with missing titles or meta descriptions. Works entirely
/// from the frozen context; makes no requests of its own.
pub struct SeoModule;

#[async_trait]
impl TestModule for SeoModule {
    fn name(&self) -> &str {
        "seo"
    }

    fn description(&self) -> &str {
        "Checks crawled pages for missing titles and meta descriptions"
    }

    async fn run(&self, _client: &HttpClient, context: &TestContext) -> Result<ModuleResult> {
        let mut result = ModuleResult::new(self.name());

        let mut titles = TestResult::new("page-titles");
        for page in context.html_pages() {
            match &page.title {
                Some(title) if title.len() <= 70 => {}
                Some(title) => {
                    titles.add_finding(
                        Finding::new(
                            "Page Title Too Long",
                            "Titles beyond ~70 characters are truncated in search results.",
                            Severity::Info,
                            "SEO",
                        )
                        .with_url(&page.url)
                        .with_evidence(format!("title is {} characters", title.len()))
                        .with_recommendation("Keep page titles under 70 characters."),
                    );
                }
                None => {
                    titles.add_finding(
                        Finding::new(
                            "Missing Page Title",
                            "The page has no <title> element.",
                            Severity::Low,
                            "SEO",
                        )
                        .with_url(&page.url)
                        .with_recommendation("Add a unique, descriptive <title> to every page."),
                    );
                }
            }
        }
        titles.mark_completed(TestStatus::Passed);
        result.add_test(titles);

        let mut descriptions = TestResult::new("meta-descriptions");
        for page in context.html_pages() {
            let missing = page
                .meta
                .get("description")
                .map(|d| d.trim().is_empty())
                .unwrap_or(true);
            if missing {
                descriptions.add_finding(
                    Finding::new(
                        "Missing Meta Description",
                        "The page has no meta description.",
                        Severity::Info,
                        "SEO",
                    )
                    .with_url(&page.url)
                    .with_recommendation("Add a meta description summarizing the page content."),
                );
            }
        }
        descriptions.mark_completed(TestStatus::Passed);
        result.add_test(descriptions);

        result.mark_completed();
        Ok(result)
    }
}
