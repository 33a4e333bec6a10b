//! Integration tests for the scan engine and module orchestration

mod common;

use async_trait::async_trait;
use common::{html_response, test_config};
use std::sync::atomic::{AtomicUsize, Ordering};
use vigil::context::TestContext;
use vigil::engine::ScanEngine;
use vigil::error::{Result, VigilError};
use vigil::http::HttpClient;
use vigil::models::{
    Finding, ModuleResult, ModuleSettings, ScanConfig, ScanState, Severity, TestResult,
    TestStatus,
};
use vigil::registry::{ModuleRegistry, TestModule};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer};

static BROKEN_TEARDOWNS: AtomicUsize = AtomicUsize::new(0);

/// Produces one High and one Info finding
struct AlphaModule;

#[async_trait]
impl TestModule for AlphaModule {
    fn name(&self) -> &str {
        "alpha"
    }

    fn description(&self) -> &str {
        "emits two findings"
    }

    async fn run(&self, _client: &HttpClient, context: &TestContext) -> Result<ModuleResult> {
        let mut result = ModuleResult::new(self.name());
        let mut test = TestResult::new("alpha-check");
        test.add_finding(
            Finding::new("Alpha High", "d", Severity::High, "Demo").with_url(&context.target_url),
        );
        test.add_finding(Finding::new("Alpha Info", "d", Severity::Info, "Demo"));
        test.mark_completed(TestStatus::Passed);
        result.add_test(test);
        result.mark_completed();
        Ok(result)
    }
}

/// Always fails in run; its teardown must still be invoked
struct BrokenModule;

#[async_trait]
impl TestModule for BrokenModule {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "always fails"
    }

    async fn run(&self, _client: &HttpClient, _context: &TestContext) -> Result<ModuleResult> {
        Err(VigilError::ModuleError(
            "broken".to_string(),
            "simulated failure".to_string(),
        ))
    }

    async fn teardown(&self) -> Result<()> {
        BROKEN_TEARDOWNS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Produces one Low finding
struct GammaModule;

#[async_trait]
impl TestModule for GammaModule {
    fn name(&self) -> &str {
        "gamma"
    }

    fn description(&self) -> &str {
        "emits one finding"
    }

    async fn run(&self, _client: &HttpClient, _context: &TestContext) -> Result<ModuleResult> {
        let mut result = ModuleResult::new(self.name());
        let mut test = TestResult::new("gamma-check");
        test.add_finding(Finding::new("Gamma Low", "d", Severity::Low, "Demo"));
        test.mark_completed(TestStatus::Passed);
        result.add_test(test);
        result.mark_completed();
        Ok(result)
    }
}

fn demo_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register("alpha", || Box::new(AlphaModule));
    registry.register("broken", || Box::new(BrokenModule));
    registry.register("gamma", || Box::new(GammaModule));
    registry
}

async fn single_page_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_response("<html><head><title>t</title></head></html>"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_module_isolation_in_parallel_mode() {
    let server = single_page_server().await;
    let config = ScanConfig {
        parallel_modules: true,
        ..test_config(&server.uri())
    };

    let teardowns_before = BROKEN_TEARDOWNS.load(Ordering::SeqCst);
    let engine = ScanEngine::new(demo_registry());
    let result = engine.run(&config).await.expect("scan should succeed");

    assert_eq!(result.status, ScanState::Completed);
    assert_eq!(result.module_results.len(), 3);

    assert_eq!(result.module_results[0].module, "alpha");
    assert_eq!(result.module_results[0].status, TestStatus::Passed);
    assert_eq!(result.module_results[0].summary.total(), 2);

    assert_eq!(result.module_results[1].module, "broken");
    assert_eq!(result.module_results[1].status, TestStatus::Error);
    assert_eq!(
        result.module_results[1].summary.total(),
        0,
        "error result carries zero findings"
    );
    assert!(result.module_results[1].error.is_some());

    assert_eq!(result.module_results[2].module, "gamma");
    assert_eq!(result.module_results[2].status, TestStatus::Passed);

    // Summary still sums the surviving modules' findings
    assert_eq!(result.summary.total_findings, 3);
    assert_eq!(result.summary.by_severity.high, 1);
    assert_eq!(result.summary.by_severity.low, 1);
    assert_eq!(result.summary.by_severity.info, 1);
    assert_eq!(result.summary.modules_errored, 1);

    assert!(
        BROKEN_TEARDOWNS.load(Ordering::SeqCst) > teardowns_before,
        "teardown runs even when run() fails"
    );
}

#[tokio::test]
async fn test_sequential_mode_preserves_registration_order() {
    let server = single_page_server().await;
    let config = ScanConfig {
        parallel_modules: false,
        ..test_config(&server.uri())
    };

    let engine = ScanEngine::new(demo_registry());
    let result = engine.run(&config).await.expect("scan should succeed");

    let order: Vec<&str> = result
        .module_results
        .iter()
        .map(|m| m.module.as_str())
        .collect();
    assert_eq!(order, vec!["alpha", "broken", "gamma"]);
    assert_eq!(result.module_results[1].status, TestStatus::Error);
}

#[tokio::test]
async fn test_disabled_modules_are_skipped() {
    let server = single_page_server().await;
    let mut config = test_config(&server.uri());
    config
        .modules
        .insert("broken".to_string(), ModuleSettings { enabled: false });

    let engine = ScanEngine::new(demo_registry());
    let result = engine.run(&config).await.expect("scan should succeed");

    let names: Vec<&str> = result
        .module_results
        .iter()
        .map(|m| m.module.as_str())
        .collect();
    assert_eq!(names, vec!["alpha", "gamma"]);
    assert_eq!(result.summary.modules_errored, 0);
}

#[tokio::test]
async fn test_unusable_target_fails_the_scan() {
    let config = test_config("not-a-valid-url");
    let engine = ScanEngine::new(demo_registry());
    assert!(
        engine.run(&config).await.is_err(),
        "setup-phase failure must cross the run boundary"
    );
}

#[tokio::test]
async fn test_builtin_scan_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_response(
            // No title, no meta description, no security headers
            "<html><body>bare</body></html>",
        ))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let engine = ScanEngine::with_builtins();
    let result = engine.run(&config).await.expect("scan should succeed");

    assert_eq!(result.module_results.len(), 3);
    assert!(result
        .module_results
        .iter()
        .all(|m| m.status == TestStatus::Passed));

    // headers module flags the missing protections
    let headers = &result.module_results[0];
    assert_eq!(headers.module, "headers");
    assert!(headers.summary.total() >= 5);

    // seo module flags the missing title and description
    let seo = &result.module_results[1];
    assert_eq!(seo.module, "seo");
    assert_eq!(seo.summary.total(), 2);

    assert_eq!(result.summary.urls_crawled, 1);
    assert!(result.summary.total_requests >= 1);
    assert!(result.finished_at.is_some());
}

#[tokio::test]
async fn test_stats_reflect_completed_scan() {
    let server = single_page_server().await;
    let config = test_config(&server.uri());

    let engine = ScanEngine::new(demo_registry());
    let stats = engine.stats();
    let result = engine.run(&config).await.expect("scan should succeed");

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.phase, "completed");
    assert_eq!(snapshot.pages_crawled, result.summary.urls_crawled);
    assert_eq!(snapshot.modules_completed, 3);
    assert_eq!(snapshot.modules_total, 3);
    assert_eq!(snapshot.total_findings, result.summary.total_findings);
    assert_eq!(snapshot.task.current, snapshot.task.total);
}
