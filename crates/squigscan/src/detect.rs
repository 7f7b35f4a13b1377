//! Site detection: whether a page is a graphing tool worth scanning.

use crate::page::{has_match, PageSource};
use scraper::Html;
use serde::Serialize;
use tracing::debug;
use url::Url;

/// Hosts known to serve frequency-response graph tools.
pub const HOST_PATTERNS: &[&str] = &[
    "squig.link",
    "crinacle.com",
    "headphones.com",
    "graph.headphones.com",
    "graph-lab.com",
];

/// Any host containing this fragment is treated as a graph tool.
const HOST_FRAGMENT: &str = "squig";

/// DOM elements typical of graph tool pages.
pub const DOM_INDICATORS: &[&str] = &[
    "div[id*=\"graph\"]",
    "div[class*=\"squig\"]",
    "script[src*=\"plotly\"]",
    "div[class*=\"measurement\"]",
];

/// Why a page was or was not considered a graph tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteVerdict {
    /// Host pattern the URL matched, if any.
    pub host_match: Option<String>,
    /// DOM indicator selectors present on the page.
    pub indicators: Vec<String>,
}

impl SiteVerdict {
    pub fn is_supported(&self) -> bool {
        self.host_match.is_some() || !self.indicators.is_empty()
    }
}

pub fn detect_site(page: &dyn PageSource) -> SiteVerdict {
    let host_match = page.url().and_then(host_match);

    let document = Html::parse_document(page.html());
    let indicators: Vec<String> = DOM_INDICATORS
        .iter()
        .filter(|sel| has_match(&document, sel))
        .map(|sel| sel.to_string())
        .collect();

    let verdict = SiteVerdict {
        host_match,
        indicators,
    };
    debug!(
        supported = verdict.is_supported(),
        host = ?verdict.host_match,
        indicators = verdict.indicators.len(),
        "site detection"
    );
    verdict
}

/// The host pattern `url` matches, if any.
pub fn host_match(url: &str) -> Option<String> {
    let host = match Url::parse(url) {
        Ok(parsed) => parsed.host_str()?.to_ascii_lowercase(),
        Err(_) => url.to_ascii_lowercase(),
    };
    HOST_PATTERNS
        .iter()
        .find(|pattern| host == **pattern || host.ends_with(&format!(".{pattern}")))
        .map(|pattern| pattern.to_string())
        .or_else(|| host.contains(HOST_FRAGMENT).then(|| HOST_FRAGMENT.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageSnapshot;

    #[test]
    fn test_host_patterns() {
        assert_eq!(host_match("https://crin.squig.link/?share=HD650").as_deref(), Some("squig.link"));
        assert_eq!(host_match("https://graph.headphones.com/").as_deref(), Some("headphones.com"));
        assert_eq!(host_match("https://graph-lab.com/x").as_deref(), Some("graph-lab.com"));
        assert_eq!(host_match("http://mysquigmirror.net/").as_deref(), Some("squig"));
        assert_eq!(host_match("https://example.com/squig.link"), None);
    }

    #[test]
    fn test_dom_indicators() {
        let page = PageSnapshot::from_html(
            Some("https://example.com/"),
            r#"<html><head><script src="/js/plotly-2.min.js"></script></head>
               <body><div id="graphBox"></div></body></html>"#,
        );
        let verdict = detect_site(&page);
        assert!(verdict.is_supported());
        assert_eq!(verdict.host_match, None);
        assert_eq!(verdict.indicators.len(), 2);
    }

    #[test]
    fn test_unrelated_page() {
        let page = PageSnapshot::from_html(
            Some("https://news.example.com/"),
            "<html><body><p>Hello</p></body></html>",
        );
        assert!(!detect_site(&page).is_supported());
    }
}
