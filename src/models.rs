//! Core data models for the Vigil scanning framework

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Severity level for security findings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

impl Severity {
    /// All severities in descending order of importance
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Returns the color name for terminal output
    pub fn color(&self) -> &str {
        match self {
            Severity::Critical => "red",
            Severity::High => "bright red",
            Severity::Medium => "yellow",
            Severity::Low => "blue",
            Severity::Info => "white",
        }
    }
}

/// A security finding discovered by a test module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Unique identifier
    pub id: String,
    /// Name of the finding
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Severity level
    pub severity: Severity,
    /// Category (Headers, SEO, Performance, etc.)
    pub category: String,
    /// Affected URL, if any
    pub url: Option<String>,
    /// HTTP method involved, if any
    pub method: Option<String>,
    /// Parameter involved, if any
    pub parameter: Option<String>,
    /// Technical evidence entries
    pub evidence: Vec<String>,
    /// Remediation recommendations
    pub recommendations: Vec<String>,
    /// CWE reference (e.g., CWE-79)
    pub cwe_id: Option<String>,
    /// OWASP Top 10 reference
    pub owasp_category: Option<String>,
}

impl Finding {
    /// Creates a new Finding with a generated UUID
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            severity,
            category: category.into(),
            url: None,
            method: None,
            parameter: None,
            evidence: Vec::new(),
            recommendations: Vec::new(),
            cwe_id: None,
            owasp_category: None,
        }
    }

    /// Sets the affected URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the HTTP method
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the affected parameter
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    /// Appends an evidence entry
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    /// Appends a remediation recommendation
    pub fn with_recommendation(mut self, rec: impl Into<String>) -> Self {
        self.recommendations.push(rec.into());
        self
    }

    /// Sets the CWE ID
    pub fn with_cwe(mut self, cwe: impl Into<String>) -> Self {
        self.cwe_id = Some(cwe.into());
        self
    }

    /// Sets the OWASP category
    pub fn with_owasp(mut self, owasp: impl Into<String>) -> Self {
        self.owasp_category = Some(owasp.into());
        self
    }
}

/// Execution status shared by tests and modules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Error,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pending => write!(f, "pending"),
            TestStatus::Running => write!(f, "running"),
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::Error => write!(f, "error"),
        }
    }
}

/// Finding counts broken down by severity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    /// Tallies the findings in a slice
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            counts.record(&finding.severity);
        }
        counts
    }

    /// Increments the counter for one severity
    pub fn record(&mut self, severity: &Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    /// Adds another count set into this one
    pub fn merge(&mut self, other: &SeverityCounts) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.info += other.info;
    }

    /// Total findings across all severities
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }

    /// Count for a single severity
    pub fn get(&self, severity: &Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }
}

/// Result of a single named check inside a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub findings: Vec<Finding>,
    /// Severity breakdown, computed once at completion
    pub summary: SeverityCounts,
}

impl TestResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Running,
            findings: Vec::new(),
            summary: SeverityCounts::default(),
        }
    }

    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Finalizes the test: sets the status and derives the summary
    /// from the complete finding list.
    pub fn mark_completed(&mut self, status: TestStatus) {
        self.status = status;
        self.summary = SeverityCounts::from_findings(&self.findings);
    }
}

/// Result of one test module's execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResult {
    pub module: String,
    pub status: TestStatus,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    /// Error message when the module itself failed
    pub error: Option<String>,
    pub tests: Vec<TestResult>,
    /// Severity breakdown, computed once at completion
    pub summary: SeverityCounts,
}

impl ModuleResult {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            status: TestStatus::Running,
            started_at: Local::now(),
            finished_at: None,
            error: None,
            tests: Vec::new(),
            summary: SeverityCounts::default(),
        }
    }

    /// Builds a completed error-status result with zero findings
    pub fn from_error(module: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(module);
        result.error = Some(error.into());
        result.mark_completed();
        result
    }

    pub fn add_test(&mut self, test: TestResult) {
        self.tests.push(test);
    }

    /// Iterates over every finding in this module's tests
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.tests.iter().flat_map(|t| t.findings.iter())
    }

    /// Finalizes the module: derives status and summary from the
    /// complete child collection.
    pub fn mark_completed(&mut self) {
        self.summary = SeverityCounts::default();
        for test in &self.tests {
            self.summary.merge(&SeverityCounts::from_findings(&test.findings));
        }
        self.status = if self.error.is_some() {
            TestStatus::Error
        } else if self
            .tests
            .iter()
            .any(|t| matches!(t.status, TestStatus::Failed | TestStatus::Error))
        {
            TestStatus::Failed
        } else {
            TestStatus::Passed
        };
        self.finished_at = Some(Local::now());
    }
}

/// Scan lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanState {
    Initializing,
    Crawling,
    ModuleExecution,
    Finalizing,
    Completed,
    Failed,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Initializing => write!(f, "initializing"),
            ScanState::Crawling => write!(f, "crawling"),
            ScanState::ModuleExecution => write!(f, "module-execution"),
            ScanState::Finalizing => write!(f, "finalizing"),
            ScanState::Completed => write!(f, "completed"),
            ScanState::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregate figures for a finished scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_findings: usize,
    pub by_severity: SeverityCounts,
    pub modules_executed: usize,
    pub modules_errored: usize,
    pub tests_executed: usize,
    pub urls_crawled: usize,
    pub api_endpoints: usize,
    pub total_requests: u64,
    pub duration_ms: u64,
}

/// Result of a complete scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    pub target: String,
    pub status: ScanState,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub module_results: Vec<ModuleResult>,
    pub summary: ScanSummary,
}

impl ScanResult {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            target: target.into(),
            status: ScanState::Initializing,
            started_at: Local::now(),
            finished_at: None,
            module_results: Vec::new(),
            summary: ScanSummary::default(),
        }
    }

    /// Finalizes the scan: walks the finished module tree exactly once
    /// and derives every aggregate figure from it.
    pub fn finalize(&mut self, urls_crawled: usize, api_endpoints: usize, total_requests: u64) {
        let finished = Local::now();
        let mut by_severity = SeverityCounts::default();
        let mut tests = 0;
        let mut errored = 0;
        for module in &self.module_results {
            by_severity.merge(&module.summary);
            tests += module.tests.len();
            if module.status == TestStatus::Error {
                errored += 1;
            }
        }
        self.summary = ScanSummary {
            total_findings: by_severity.total(),
            by_severity,
            modules_executed: self.module_results.len(),
            modules_errored: errored,
            tests_executed: tests,
            urls_crawled,
            api_endpoints,
            total_requests,
            duration_ms: (finished - self.started_at).num_milliseconds().max(0) as u64,
        };
        self.finished_at = Some(finished);
        self.status = ScanState::Completed;
    }

    /// Returns count of findings at one severity
    pub fn count_by_severity(&self, severity: &Severity) -> usize {
        self.summary.by_severity.get(severity)
    }
}

/// One HTML input descriptor inside a form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormInput {
    pub name: String,
    pub input_type: String,
    pub value: Option<String>,
}

/// A form discovered on a crawled page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageForm {
    /// Absolute action URL
    pub action: String,
    /// Uppercased HTTP method, GET when unspecified
    pub method: String,
    pub inputs: Vec<FormInput>,
}

/// A single page fetched during the crawl. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledPage {
    /// Normalized, canonical URL
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub title: Option<String>,
    pub depth: u32,
    /// Back-reference to the page that linked here
    pub parent_url: Option<String>,
    /// Deduplicated absolute link URLs
    pub links: Vec<String>,
    pub forms: Vec<PageForm>,
    pub scripts: Vec<String>,
    pub stylesheets: Vec<String>,
    pub meta: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Zero for cache hits
    pub response_time_ms: u64,
    pub size_bytes: u64,
    pub fetched_at: DateTime<Local>,
}

impl CrawledPage {
    /// True when the response was HTML
    pub fn is_html(&self) -> bool {
        self.content_type.contains("text/html")
    }
}

/// How an API endpoint was discovered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiscoverySource {
    /// Classified from a fetched non-HTML response
    Crawler,
    /// Matched by inline-script pattern scanning
    Script,
}

/// An API-like endpoint discovered during the crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub url: String,
    /// None until the method has been confirmed
    pub method: Option<String>,
    /// Query parameter names seen on the endpoint
    pub parameters: Vec<String>,
    pub content_type: Option<String>,
    pub source: DiscoverySource,
}

/// Per-module settings resolved from `[modules.<name>]` tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Cache tier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Default entry TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Maximum entries in the memory tier
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    /// Optional shared cache endpoint (redis://...)
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_true")]
    pub disk_enabled: bool,
    /// Directory for the disk tier; a temp-dir default is used when unset
    #[serde(default)]
    pub disk_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            memory_capacity: default_memory_capacity(),
            redis_url: None,
            disk_enabled: true,
            disk_dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_memory_capacity() -> usize {
    512
}

fn default_user_agent() -> String {
    "Vigil-Scanner/0.1.0".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> usize {
    200
}

fn default_concurrency() -> usize {
    10
}

/// Configuration for a scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Target URL to scan
    pub target: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    /// HTTP/HTTPS proxy URL
    #[serde(default)]
    pub proxy: Option<String>,
    /// Default headers sent on every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Default cookies sent on every request
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    /// Maximum crawl depth
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Maximum pages to visit
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Global in-flight request bound for the crawl
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Fixed delay before each fetch, in milliseconds
    #[serde(default)]
    pub crawl_delay_ms: u64,
    /// Crawl beyond the target host
    #[serde(default)]
    pub follow_external: bool,
    /// Only crawl URLs matching one of these regexes (empty = all)
    #[serde(default)]
    pub include_patterns: Vec<String>,
    /// Never crawl URLs matching one of these regexes
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Run test modules concurrently instead of in registration order
    #[serde(default)]
    pub parallel_modules: bool,
    /// Per-module settings keyed by module name
    #[serde(default)]
    pub modules: HashMap<String, ModuleSettings>,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ScanConfig {
    /// Enabled status for a module; modules absent from the
    /// configuration default to enabled.
    pub fn module_enabled(&self, name: &str) -> bool {
        self.modules.get(name).map(|m| m.enabled).unwrap_or(true)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            follow_redirects: true,
            proxy: None,
            headers: HashMap::new(),
            cookies: HashMap::new(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            concurrency: default_concurrency(),
            crawl_delay_ms: 0,
            follow_external: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            parallel_modules: false,
            modules: HashMap::new(),
            cache: CacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Low < Severity::Info);
    }

    #[test]
    fn test_module_summary_from_final_children() {
        let mut module = ModuleResult::new("demo");
        let mut test = TestResult::new("check-a");
        test.add_finding(Finding::new("a", "d", Severity::High, "Demo"));
        test.add_finding(Finding::new("b", "d", Severity::Info, "Demo"));
        test.mark_completed(TestStatus::Passed);
        module.add_test(test);
        module.mark_completed();

        assert_eq!(module.status, TestStatus::Passed);
        assert_eq!(module.summary.high, 1);
        assert_eq!(module.summary.info, 1);
        assert_eq!(module.summary.total(), 2);
    }

    #[test]
    fn test_error_module_result_has_zero_findings() {
        let module = ModuleResult::from_error("broken", "boom");
        assert_eq!(module.status, TestStatus::Error);
        assert_eq!(module.summary.total(), 0);
        assert!(module.tests.is_empty());
        assert_eq!(module.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_scan_finalize_walks_tree() {
        let mut scan = ScanResult::new("https://example.com");

        let mut ok = ModuleResult::new("ok");
        let mut test = TestResult::new("check");
        test.add_finding(Finding::new("x", "d", Severity::Medium, "Demo"));
        test.mark_completed(TestStatus::Passed);
        ok.add_test(test);
        ok.mark_completed();

        scan.module_results.push(ok);
        scan.module_results.push(ModuleResult::from_error("bad", "oops"));
        scan.finalize(7, 2, 42);

        assert_eq!(scan.status, ScanState::Completed);
        assert_eq!(scan.summary.modules_executed, 2);
        assert_eq!(scan.summary.modules_errored, 1);
        assert_eq!(scan.summary.total_findings, 1);
        assert_eq!(scan.summary.urls_crawled, 7);
        assert_eq!(scan.summary.total_requests, 42);
    }

    #[test]
    fn test_module_enabled_defaults() {
        let mut config = ScanConfig::default();
        assert!(config.module_enabled("anything"));
        config
            .modules
            .insert("headers".to_string(), ModuleSettings { enabled: false });
        assert!(!config.module_enabled("headers"));
    }
}
