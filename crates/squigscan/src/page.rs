//! The page abstraction the extraction strategies read from.
//!
//! A host (browser bridge, test fixture, saved capture) exposes the page
//! through [`PageSource`]: the serialized document, the datum objects a
//! rendering library attached to the chart's vector paths, and whichever
//! page-global variables it can serialize. Strategies only ever read; one
//! scan pass sees one consistent snapshot.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Attribute a capture host uses to serialize a path's bound datum.
pub const DATUM_ATTRIBUTES: &[&str] = &["data-datum", "data-d3-datum", "data-__data__"];

/// Elements whose text is never visible.
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

/// Read-only view of a page.
pub trait PageSource {
    /// Page URL, if known.
    fn url(&self) -> Option<&str>;

    /// Serialized document.
    fn html(&self) -> &str;

    /// Datum objects bound to paths inside `container` (a CSS selector list).
    ///
    /// The default reads JSON from datum attributes on `path` elements in
    /// the serialized document.
    fn path_data(&self, container: &str) -> Vec<Value> {
        path_data_from_html(self.html(), container)
    }

    /// Value of a page-global variable, if the host exposes it.
    fn global(&self, name: &str) -> Option<&Value>;
}

/// A captured page: document plus serialized render state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub html: String,
    /// Datum objects captured directly from the chart's paths.
    #[serde(default)]
    pub chart_data: Vec<Value>,
    /// Serialized page-global variables by name.
    #[serde(default)]
    pub globals: Map<String, Value>,
}

impl PageSnapshot {
    pub fn from_html(url: Option<&str>, html: impl Into<String>) -> Self {
        Self {
            url: url.map(String::from),
            html: html.into(),
            ..Self::default()
        }
    }

    pub fn with_global(mut self, name: &str, value: Value) -> Self {
        self.globals.insert(name.to_string(), value);
        self
    }

    pub fn with_chart_datum(mut self, datum: Value) -> Self {
        self.chart_data.push(datum);
        self
    }
}

impl PageSource for PageSnapshot {
    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn html(&self) -> &str {
        &self.html
    }

    fn path_data(&self, container: &str) -> Vec<Value> {
        let mut data = self.chart_data.clone();
        data.extend(path_data_from_html(&self.html, container));
        data
    }

    fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }
}

// ── Document helpers ────────────────────────────────────────────────────────

/// A script element's body and type attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBody {
    pub script_type: Option<String>,
    pub text: String,
}

impl ScriptBody {
    pub fn is_json(&self) -> bool {
        self.script_type
            .as_deref()
            .is_some_and(|t| t.to_ascii_lowercase().contains("json"))
    }
}

/// Inline script bodies (external scripts have no body and are skipped).
pub fn script_bodies(document: &Html) -> Vec<ScriptBody> {
    let Ok(sel) = Selector::parse("script") else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|el| {
            let text: String = el.text().collect();
            if text.trim().is_empty() {
                return None;
            }
            Some(ScriptBody {
                script_type: el.value().attr("type").map(String::from),
                text,
            })
        })
        .collect()
}

/// Trimmed text of every visible text node, in document order.
pub fn visible_text_nodes(document: &Html) -> Vec<String> {
    let mut out = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let collapsed = collapse_whitespace(text);
        if !collapsed.is_empty() {
            out.push(collapsed);
        }
    }
    out
}

/// Collapsed text of each element matching `selector`. Invalid selectors
/// yield nothing.
pub fn selector_texts(document: &Html, selector: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        debug!("skipping invalid selector {selector:?}");
        return Vec::new();
    };
    document
        .select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether any element matches `selector`.
pub fn has_match(document: &Html, selector: &str) -> bool {
    Selector::parse(selector)
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false)
}

fn path_data_from_html(html: &str, container: &str) -> Vec<Value> {
    // Cheap pre-check: most pages carry no serialized datums at all.
    if !DATUM_ATTRIBUTES.iter().any(|a| html.contains(a)) {
        return Vec::new();
    }

    let path_selector = container
        .split(',')
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| format!("{part} path"))
        .collect::<Vec<_>>()
        .join(", ");
    let Ok(sel) = Selector::parse(&path_selector) else {
        debug!("skipping invalid chart container selector {container:?}");
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document.select(&sel).filter_map(|el| datum_of(&el)).collect()
}

fn datum_of(el: &ElementRef<'_>) -> Option<Value> {
    let raw = DATUM_ATTRIBUTES
        .iter()
        .find_map(|attr| el.value().attr(attr))?;
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("unparseable path datum: {e}");
            None
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
