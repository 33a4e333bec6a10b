//! Security response header checks

use crate::context::TestContext;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{Finding, ModuleResult, Severity, TestResult, TestStatus};
use crate::registry::TestModule;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::debug;

/// Flags missing or obviously misconfigured security response headers
pub struct HeadersModule;

struct HeaderCheck {
    name: &'static str,
    severity: Severity,
    cwe: &'static str,
    owasp: &'static str,
    description: &'static str,
    recommendation: &'static str,
    /// Returns a problem description for a present-but-weak value
    weak: fn(&str) -> Option<String>,
}

fn never_weak(_: &str) -> Option<String> {
    None
}

fn weak_nosniff(value: &str) -> Option<String> {
    (value.to_lowercase() != "nosniff").then(|| format!("expected 'nosniff', got '{value}'"))
}

fn weak_frame_options(value: &str) -> Option<String> {
    let upper = value.to_uppercase();
    (upper != "DENY" && upper != "SAMEORIGIN")
        .then(|| format!("unexpected value '{value}'"))
}

fn weak_csp(value: &str) -> Option<String> {
    (value.contains("unsafe-inline") || value.contains("unsafe-eval"))
        .then(|| format!("CSP contains unsafe directives: {value}"))
}

const CHECKS: &[HeaderCheck] = &[
    HeaderCheck {
        name: "Content-Security-Policy",
        severity: Severity::Medium,
        cwe: "CWE-693",
        owasp: "A05:2021 Security Misconfiguration",
        description: "Content-Security-Policy header is missing or misconfigured.",
        recommendation: "Implement a strict Content-Security-Policy without unsafe directives.",
        weak: weak_csp,
    },
    HeaderCheck {
        name: "Strict-Transport-Security",
        severity: Severity::High,
        cwe: "CWE-319",
        owasp: "A02:2021 Cryptographic Failures",
        description: "HSTS header is missing. Users may connect over plain HTTP.",
        recommendation: "Add 'Strict-Transport-Security: max-age=31536000; includeSubDomains'.",
        weak: never_weak,
    },
    HeaderCheck {
        name: "X-Content-Type-Options",
        severity: Severity::Low,
        cwe: "CWE-693",
        owasp: "A05:2021 Security Misconfiguration",
        description: "X-Content-Type-Options header is missing.",
        recommendation: "Add 'X-Content-Type-Options: nosniff'.",
        weak: weak_nosniff,
    },
    HeaderCheck {
        name: "X-Frame-Options",
        severity: Severity::Medium,
        cwe: "CWE-1021",
        owasp: "A05:2021 Security Misconfiguration",
        description: "X-Frame-Options header is missing, enabling potential clickjacking.",
        recommendation: "Add 'X-Frame-Options: DENY' or 'SAMEORIGIN'.",
        weak: weak_frame_options,
    },
    HeaderCheck {
        name: "Referrer-Policy",
        severity: Severity::Low,
        cwe: "CWE-200",
        owasp: "A01:2021 Broken Access Control",
        description: "Referrer-Policy header is missing.",
        recommendation: "Add 'Referrer-Policy: strict-origin-when-cross-origin'.",
        weak: never_weak,
    },
];

fn check_headers(headers: &HeaderMap, target: &str) -> TestResult {
    let mut test = TestResult::new("security-response-headers");

    for check in CHECKS {
        let value = headers.get(check.name).and_then(|v| v.to_str().ok());
        match value {
            None => {
                test.add_finding(
                    Finding::new(
                        format!("Missing {} Header", check.name),
                        check.description,
                        check.severity.clone(),
                        "Security Headers",
                    )
                    .with_url(target)
                    .with_evidence(format!("header '{}' absent from the response", check.name))
                    .with_recommendation(check.recommendation)
                    .with_cwe(check.cwe)
                    .with_owasp(check.owasp),
                );
            }
            Some(value) => {
                if let Some(problem) = (check.weak)(value) {
                    test.add_finding(
                        Finding::new(
                            format!("Misconfigured {} Header", check.name),
                            check.description,
                            check.severity.clone(),
                            "Security Headers",
                        )
                        .with_url(target)
                        .with_evidence(problem)
                        .with_recommendation(check.recommendation)
                        .with_cwe(check.cwe)
                        .with_owasp(check.owasp),
                    );
                } else {
                    debug!("Header '{}' is properly configured", check.name);
                }
            }
        }
    }

    test.mark_completed(TestStatus::Passed);
    test
}

fn check_disclosure(headers: &HeaderMap, target: &str) -> TestResult {
    let mut test = TestResult::new("information-disclosure");

    let disclosures = [
        ("Server", "Server header reveals software version"),
        ("X-Powered-By", "X-Powered-By header reveals the technology stack"),
    ];
    for (name, description) in disclosures {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let reveals_version = name != "Server" || value.chars().any(|c| c.is_ascii_digit());
        if reveals_version {
            test.add_finding(
                Finding::new(
                    format!("{name} Header Information Disclosure"),
                    description,
                    Severity::Low,
                    "Security Headers",
                )
                .with_url(target)
                .with_evidence(format!("{name}: {value}"))
                .with_recommendation(format!("Remove or genericize the {name} header."))
                .with_cwe("CWE-200")
                .with_owasp("A01:2021 Broken Access Control"),
            );
        }
    }

    test.mark_completed(TestStatus::Passed);
    test
}

#[async_trait]
impl TestModule for HeadersModule {
    fn name(&self) -> &str {
        "headers"
    }

    fn description(&self) -> &str {
        "Checks security response headers on the target for missing or weak protections"
    }

    async fn run(&self, client: &HttpClient, context: &TestContext) -> Result<ModuleResult> {
        let mut result = ModuleResult::new(self.name());

        let response = client.get(&context.target_url).await?;
        let headers = response.headers().clone();

        result.add_test(check_headers(&headers, &context.target_url));
        result.add_test(check_disclosure(&headers, &context.target_url));
        result.mark_completed();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                name.parse::<HeaderName>().expect("header name"),
                HeaderValue::from_str(value).expect("header value"),
            );
        }
        map
    }

    #[test]
    fn test_all_missing_headers_flagged() {
        let test = check_headers(&headers(&[]), "https://example.com");
        assert_eq!(test.findings.len(), CHECKS.len());
        assert_eq!(test.status, TestStatus::Passed);
    }

    #[test]
    fn test_weak_values_flagged() {
        let map = headers(&[
            ("content-security-policy", "default-src 'self' 'unsafe-inline'"),
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "ALLOWALL"),
            ("strict-transport-security", "max-age=31536000"),
            ("referrer-policy", "no-referrer"),
        ]);
        let test = check_headers(&map, "https://example.com");
        let titles: Vec<&str> = test.findings.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Misconfigured Content-Security-Policy Header"));
        assert!(titles.contains(&"Misconfigured X-Frame-Options Header"));
        assert_eq!(test.findings.len(), 2);
    }

    #[test]
    fn test_disclosure_headers() {
        let map = headers(&[("server", "nginx/1.18.0"), ("x-powered-by", "PHP/8.1")]);
        let test = check_disclosure(&map, "https://example.com");
        assert_eq!(test.findings.len(), 2);

        // A generic Server header without a version is fine
        let map = headers(&[("server", "nginx")]);
        let test = check_disclosure(&map, "https://example.com");
        assert!(test.findings.is_empty());
    }
}
