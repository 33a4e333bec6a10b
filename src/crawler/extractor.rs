//! Structural extraction from HTML and inline scripts

use crate::models::{ApiEndpoint, DiscoverySource, FormInput, PageForm};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Everything pulled out of one HTML document
#[derive(Debug, Default)]
pub struct PageContent {
    pub title: Option<String>,
    pub meta: HashMap<String, String>,
    pub links: Vec<String>,
    pub forms: Vec<PageForm>,
    pub scripts: Vec<String>,
    pub stylesheets: Vec<String>,
}

/// Parses an HTML document and extracts its structure. Absolute link
/// URLs are deduplicated in document order.
pub fn parse_html(base_url: &Url, html: &str) -> PageContent {
    let document = Html::parse_document(html);
    let mut content = PageContent::default();

    if let Ok(selector) = Selector::parse("title") {
        content.title = document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());
    }

    if let Ok(selector) = Selector::parse("meta") {
        for element in document.select(&selector) {
            let name = element
                .value()
                .attr("name")
                .or_else(|| element.value().attr("property"));
            if let (Some(name), Some(value)) = (name, element.value().attr("content")) {
                content
                    .meta
                    .insert(name.to_lowercase(), value.to_string());
            }
        }
    }

    let mut seen_links = HashSet::new();
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(resolved) = resolve_url(base_url, href) {
                    if seen_links.insert(resolved.clone()) {
                        content.links.push(resolved);
                    }
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("form") {
        for form in document.select(&selector) {
            let action = form
                .value()
                .attr("action")
                .and_then(|a| resolve_url(base_url, a))
                .unwrap_or_else(|| base_url.to_string());
            let method = form
                .value()
                .attr("method")
                .unwrap_or("GET")
                .to_uppercase();

            let mut inputs = Vec::new();
            if let Ok(input_selector) = Selector::parse("input, select, textarea") {
                for input in form.select(&input_selector) {
                    let Some(name) = input.value().attr("name") else {
                        continue;
                    };
                    let input_type = input
                        .value()
                        .attr("type")
                        .unwrap_or(input.value().name())
                        .to_lowercase();
                    inputs.push(FormInput {
                        name: name.to_string(),
                        input_type,
                        value: input.value().attr("value").map(str::to_string),
                    });
                }
            }

            content.forms.push(PageForm {
                action,
                method,
                inputs,
            });
        }
    }

    if let Ok(selector) = Selector::parse("script[src]") {
        for element in document.select(&selector) {
            if let Some(resolved) =
                element.value().attr("src").and_then(|s| resolve_url(base_url, s))
            {
                content.scripts.push(resolved);
            }
        }
    }

    if let Ok(selector) = Selector::parse(r#"link[rel="stylesheet"][href]"#) {
        for element in document.select(&selector) {
            if let Some(resolved) =
                element.value().attr("href").and_then(|h| resolve_url(base_url, h))
            {
                content.stylesheets.push(resolved);
            }
        }
    }

    content
}

/// Best-effort API endpoint discovery from inline script text. Regex
/// misses simply yield fewer endpoints; this never fails the page.
pub fn extract_api_endpoints(base_url: &Url, body: &str) -> Vec<ApiEndpoint> {
    let patterns = [
        r#"(?:fetch|axios\.(?:get|post|put|delete|patch)|\.ajax)\s*\(\s*["']([^"']+)["']"#,
        r#"["'](/api/[a-zA-Z0-9_\-/.?&=]*)["']"#,
        r#"(?:endpoint|baseUrl|apiUrl|API_URL)\s*[=:]\s*["']([^"']+)["']"#,
    ];

    let mut seen = HashSet::new();
    let mut endpoints = Vec::new();

    for pattern in &patterns {
        if let Ok(re) = Regex::new(pattern) {
            for cap in re.captures_iter(body) {
                let Some(m) = cap.get(1) else { continue };
                let Some(resolved) = resolve_url(base_url, m.as_str()) else {
                    continue;
                };
                if !seen.insert(resolved.clone()) {
                    continue;
                }
                let parameters = Url::parse(&resolved)
                    .map(|u| {
                        u.query_pairs()
                            .map(|(name, _)| name.into_owned())
                            .collect()
                    })
                    .unwrap_or_default();
                endpoints.push(ApiEndpoint {
                    url: resolved,
                    method: None,
                    parameters,
                    content_type: None,
                    source: DiscoverySource::Script,
                });
            }
        }
    }

    endpoints
}

/// Resolves a potentially relative URL against a base URL, skipping
/// non-navigable schemes and bare fragments.
fn resolve_url(base_url: &Url, raw: &str) -> Option<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("mailto:")
        || trimmed.starts_with("tel:")
        || trimmed.starts_with("javascript:")
        || trimmed.starts_with("data:")
    {
        return None;
    }

    let mut resolved = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Url::parse(trimmed).ok()?
    } else {
        base_url.join(trimmed).ok()?
    };

    resolved.set_fragment(None);
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_html_structure() {
        let base = Url::parse("https://example.com/").expect("valid url");
        let html = r##"
            <html>
            <head>
                <title> Home </title>
                <meta name="description" content="A site">
                <link rel="stylesheet" href="/css/site.css">
            </head>
            <body>
                <a href="/about">About</a>
                <a href="/about">About again</a>
                <a href="mailto:x@example.com">Mail</a>
                <form action="/search" method="post">
                    <input type="text" name="q" value="seed">
                    <input type="submit" value="go">
                    <select name="lang"><option>en</option></select>
                </form>
                <script src="/js/app.js"></script>
            </body>
            </html>
        "##;

        let content = parse_html(&base, html);
        assert_eq!(content.title.as_deref(), Some("Home"));
        assert_eq!(content.meta.get("description").map(String::as_str), Some("A site"));
        assert_eq!(content.links, vec!["https://example.com/about".to_string()]);
        assert_eq!(content.scripts, vec!["https://example.com/js/app.js".to_string()]);
        assert_eq!(
            content.stylesheets,
            vec!["https://example.com/css/site.css".to_string()]
        );

        assert_eq!(content.forms.len(), 1);
        let form = &content.forms[0];
        assert_eq!(form.action, "https://example.com/search");
        assert_eq!(form.method, "POST");
        assert_eq!(form.inputs.len(), 2, "submit input has no name: {:?}", form.inputs);
        assert_eq!(form.inputs[0].name, "q");
        assert_eq!(form.inputs[0].input_type, "text");
        assert_eq!(form.inputs[0].value.as_deref(), Some("seed"));
        assert_eq!(form.inputs[1].input_type, "select");
    }

    #[test]
    fn test_extract_api_endpoints_from_scripts() {
        let base = Url::parse("https://example.com/").expect("valid url");
        let body = r#"
            <script>
            fetch("/api/users?role=admin");
            axios.get("/api/v2/data");
            const API_URL = "/api/config";
            </script>
        "#;

        let endpoints = extract_api_endpoints(&base, body);
        let urls: Vec<&str> = endpoints.iter().map(|e| e.url.as_str()).collect();
        assert!(urls.contains(&"https://example.com/api/users?role=admin"));
        assert!(urls.contains(&"https://example.com/api/v2/data"));
        assert!(urls.contains(&"https://example.com/api/config"));

        let users = endpoints
            .iter()
            .find(|e| e.url.contains("/api/users"))
            .expect("users endpoint");
        assert_eq!(users.parameters, vec!["role".to_string()]);
        assert_eq!(users.source, DiscoverySource::Script);
        assert!(users.method.is_none());
    }

    #[test]
    fn test_resolve_url_skips_non_navigable() {
        let base = Url::parse("https://example.com/").expect("valid url");
        assert!(resolve_url(&base, "#top").is_none());
        assert!(resolve_url(&base, "javascript:void(0)").is_none());
        assert!(resolve_url(&base, "data:text/plain,x").is_none());
        assert_eq!(
            resolve_url(&base, "/a#frag"),
            Some("https://example.com/a".to_string())
        );
    }
}
