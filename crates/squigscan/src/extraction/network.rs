//! Network-response scan: measurement files fetched by the page.
//!
//! The host's fetch wrapper forwards a copy of each matching response as a
//! [`CapturedResponse`]; the page's own response is left untouched. Bodies
//! are read either as structured data or as delimited text.

use super::shapes::collect_candidates;
use super::{Candidate, ExtractionStrategy, ScanContext};
use crate::types::SourceTag;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

/// Name used when a URL has no usable file stem.
const FALLBACK_NAME: &str = "Measurement";

/// A copy of one network response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub body: String,
}

impl CapturedResponse {
    pub fn new(url: impl Into<String>, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: content_type.map(String::from),
            body: body.into(),
        }
    }

    fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|t| t.to_ascii_lowercase().contains("json"))
    }
}

pub struct NetworkScan;

impl ExtractionStrategy for NetworkScan {
    fn source(&self) -> SourceTag {
        SourceTag::Network
    }

    fn extract(&self, ctx: &ScanContext<'_>) -> Vec<Candidate> {
        let limits = ctx.walk_limits();
        let mut out = Vec::new();

        for response in ctx.responses {
            if !is_measurement_url(&response.url) {
                continue;
            }
            let name = name_from_url(&response.url);

            let trimmed = response.body.trim_start();
            let looks_structured =
                response.is_json() || trimmed.starts_with('{') || trimmed.starts_with('[');
            if looks_structured {
                match serde_json::from_str::<Value>(&response.body) {
                    Ok(value) => {
                        out.extend(collect_candidates(&value, &name, limits));
                        continue;
                    }
                    Err(e) if response.is_json() => {
                        debug!(url = %response.url, "unparseable JSON response: {e}");
                        continue;
                    }
                    // A bracketed first line may still be delimited text.
                    Err(_) => {}
                }
            }

            if let Some((frequencies, amplitudes)) = parse_delimited(&response.body) {
                out.push(Candidate {
                    raw_name: name,
                    frequencies,
                    amplitudes,
                });
            }
        }
        out
    }
}

/// Whether a fetched URL plausibly carries measurement data.
pub fn is_measurement_url(url: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)(?:\.(?:csv|json|txt)(?:[?#].*)?$|data|measurement|frequency)")
            .expect("measurement url regex is valid")
    });
    re.is_match(url)
}

/// Device name from the URL's file stem: percent-decoded, extension
/// stripped, `_` and `-` turned into spaces.
pub fn name_from_url(raw: &str) -> String {
    let path = match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        // Relative URL: drop query and fragment by hand.
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let file = path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default();
    let decoded = percent_decode_str(file).decode_utf8_lossy();

    static EXT: OnceLock<Regex> = OnceLock::new();
    let ext = EXT.get_or_init(|| {
        Regex::new(r"(?i)\.(?:csv|json|txt)$").expect("extension regex is valid")
    });
    let stem = ext.replace(&decoded, "");
    let name = stem
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

/// Read the first two numeric tokens of each line. The first header line
/// (mentioning "frequency" or "Hz"), any other non-numeric line and rows
/// with non-finite values or a non-positive frequency are skipped.
pub fn parse_delimited(body: &str) -> Option<(Vec<f64>, Vec<f64>)> {
    let mut frequencies = Vec::new();
    let mut amplitudes = Vec::new();
    let mut header_skipped = false;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !header_skipped {
            let lower = line.to_ascii_lowercase();
            if lower.contains("frequency") || lower.contains("hz") {
                header_skipped = true;
                continue;
            }
        }

        let mut tokens = line
            .split(|c: char| c == ',' || c == ';' || c == '\t' || c.is_whitespace())
            .filter(|t| !t.is_empty());
        let (Some(f), Some(a)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let (Ok(f), Ok(a)) = (f.parse::<f64>(), a.parse::<f64>()) else {
            continue;
        };
        // `NaN`/`inf` tokens parse, but only finite rows at positive
        // frequencies belong to the series.
        if f.is_finite() && a.is_finite() && f > 0.0 {
            frequencies.push(f);
            amplitudes.push(a);
        }
    }

    if frequencies.is_empty() {
        None
    } else {
        Some((frequencies, amplitudes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::page::PageSnapshot;

    fn scan(responses: &[CapturedResponse]) -> Vec<Candidate> {
        let page = PageSnapshot::default();
        let config = ScanConfig::default();
        NetworkScan.extract(&ScanContext::new(&page, responses, &config))
    }

    #[test]
    fn test_url_patterns() {
        assert!(is_measurement_url("https://x.squig.link/data/phones/HD650%20L.txt"));
        assert!(is_measurement_url("/graphs/Aria.csv"));
        assert!(is_measurement_url("/api/list.json?v=3"));
        assert!(is_measurement_url("/measurements/1"));
        assert!(!is_measurement_url("https://cdn.example.com/plotly.min.js"));
        assert!(!is_measurement_url("/img/logo.png"));
    }

    #[test]
    fn test_name_from_url() {
        assert_eq!(name_from_url("https://x.squig.link/data/Moondrop_Aria-L.csv"), "Moondrop Aria L");
        assert_eq!(name_from_url("/data/phones/HD650%20R.txt?cache=1"), "HD650 R");
        assert_eq!(name_from_url("https://x.squig.link/"), "Measurement");
    }

    #[test]
    fn test_delimited_skips_header_and_junk() {
        let body = "Frequency (Hz), SPL (dB)\n* smoothing 1/24\n20, 98.5\n\n30\t97.0\n40;96.5;0.1\nabc,def\n";
        let (f, a) = parse_delimited(body).unwrap();
        assert_eq!(f, vec![20.0, 30.0, 40.0]);
        assert_eq!(a, vec![98.5, 97.0, 96.5]);
        assert!(parse_delimited("Frequency,SPL\n").is_none());
    }

    #[test]
    fn test_delimited_skips_non_finite_rows() {
        let body = "Frequency,SPL\n20,1\n30,NaN\n40,3\ninf,2\n0,5\n100,2\n";
        let (f, a) = parse_delimited(body).unwrap();
        assert_eq!(f, vec![20.0, 40.0, 100.0]);
        assert_eq!(a, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_nan_row_keeps_rest_of_measurement() {
        let responses = [CapturedResponse::new(
            "https://x.squig.link/data/HD650.csv",
            Some("text/csv"),
            "Frequency,SPL\n20,1\n30,NaN\n40,3\n100,2\n",
        )];
        let page = PageSnapshot::default();
        let config = ScanConfig::default();
        let ctx = ScanContext::new(&page, &responses, &config);
        let mut store = crate::store::CurveStore::default();
        let report = crate::extraction::run_all(&ctx, &mut store);
        assert_eq!(report.rejected, 0);
        assert_eq!(store.counts().with_data, 1);
        assert_eq!(store.snapshot()[0].frequencies(), &[20.0, 40.0, 100.0]);
    }

    #[test]
    fn test_csv_response_named_from_url() {
        let found = scan(&[CapturedResponse::new(
            "https://x.squig.link/data/Truthear_Zero.csv",
            Some("text/csv"),
            "frequency,db\n20,1\n30,2\n40,3\n",
        )]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].raw_name, "Truthear Zero");
        assert_eq!(found[0].frequencies, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_json_response_uses_shape_names() {
        let found = scan(&[CapturedResponse::new(
            "https://example.com/api/measurements",
            Some("application/json; charset=utf-8"),
            r#"{"data": [{"x": [20, 30, 40], "y": [1, 2, 3], "name": "Blessing 2"}]}"#,
        )]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].raw_name, "Blessing 2");
    }

    #[test]
    fn test_unmatched_or_broken_responses_ignored() {
        let found = scan(&[
            CapturedResponse::new("/img/logo.png", None, "20,1\n30,2\n"),
            CapturedResponse::new("/data/x.json", Some("application/json"), "{broken"),
            CapturedResponse::new("/data/empty.csv", Some("text/csv"), ""),
        ]);
        assert!(found.is_empty());
    }
}
