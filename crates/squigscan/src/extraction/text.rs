//! Visible-text scan: device names shown on the page without data.
//!
//! Two channels feed it. Known list and legend selectors favour recall and
//! keep ambiguous labels; arbitrary text nodes favour precision and keep
//! only labels that clearly look like a model name. Everything found here
//! becomes a name-only placeholder.

use super::{Candidate, ExtractionStrategy, ScanContext};
use crate::names::{accepts_label, normalize, ScanChannel};
use crate::page::{selector_texts, visible_text_nodes};
use crate::types::SourceTag;
use std::collections::HashSet;

pub struct VisibleTextScan;

impl ExtractionStrategy for VisibleTextScan {
    fn source(&self) -> SourceTag {
        SourceTag::Text
    }

    fn extract(&self, ctx: &ScanContext<'_>) -> Vec<Candidate> {
        if ctx.page.html().is_empty() {
            return Vec::new();
        }
        let document = ctx.document();

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut offer = |text: String, channel: ScanChannel| {
            if !accepts_label(&text, channel) {
                return;
            }
            let key = normalize(&text).key;
            if !key.is_empty() && seen.insert(key) {
                out.push(Candidate::placeholder(text));
            }
        };

        for selector in &ctx.config.text_selectors {
            for text in selector_texts(document, selector) {
                offer(text, ScanChannel::Selector);
            }
        }
        for text in visible_text_nodes(document) {
            offer(text, ScanChannel::TextNode);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::page::PageSnapshot;

    fn scan(html: &str) -> Vec<String> {
        let page = PageSnapshot::from_html(None, html);
        let config = ScanConfig::default();
        VisibleTextScan
            .extract(&ScanContext::new(&page, &[], &config))
            .into_iter()
            .map(|c| {
                assert!(c.frequencies.is_empty());
                c.raw_name
            })
            .collect()
    }

    #[test]
    fn test_selector_channel_keeps_ambiguous_labels() {
        let found = scan(
            r#"<ul>
                <li class="phone-item">Blessing</li>
                <li class="phone-item">Target Curve</li>
                <li class="phone-item">Sennheiser HD650</li>
            </ul>"#,
        );
        assert_eq!(found, vec!["Blessing", "Sennheiser HD650"]);
    }

    #[test]
    fn test_text_node_channel_requires_model_shape() {
        let found = scan(
            r#"<div><p>Compare</p><p>Settings panel</p><p>Moondrop Blessing 2</p><p>1000 Hz</p></div>"#,
        );
        assert_eq!(found, vec!["Moondrop Blessing 2"]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let found = scan(
            r#"<div class="phone-name">HD 650</div><span>HD-650</span><option>hd650</option>"#,
        );
        assert_eq!(found, vec!["HD 650"]);
    }
}
