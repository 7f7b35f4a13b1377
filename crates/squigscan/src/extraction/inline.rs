//! Inline-script literal scan.
//!
//! Script bodies are searched for plotting calls and data assignments; the
//! literal that follows is read by the restricted parser in
//! [`super::literal`]. Nothing on the page is ever executed.

use super::literal::{parse_literal, parse_literal_at};
use super::shapes::{collect_candidates, WalkLimits};
use super::{Candidate, ExtractionStrategy, ScanContext};
use crate::page::{script_bodies, ScriptBody};
use crate::types::SourceTag;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Fallback name stem for unnamed plotted traces.
const TRACE_NAME_STEM: &str = "Measurement";

pub struct InlineScriptScan;

impl ExtractionStrategy for InlineScriptScan {
    fn source(&self) -> SourceTag {
        SourceTag::Inline
    }

    fn extract(&self, ctx: &ScanContext<'_>) -> Vec<Candidate> {
        let limits = ctx.walk_limits();
        let max_bytes = ctx.config.max_literal_bytes;
        let mut out = Vec::new();

        for script in script_bodies(ctx.document()) {
            if script.is_json() {
                out.extend(scan_json_block(&script, limits, max_bytes));
            } else {
                out.extend(scan_script(&script.text, limits, max_bytes));
            }
        }
        out
    }
}

fn plot_call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bPlotly\s*\.\s*(?:newPlot|react|plot)\s*\(").expect("plot call regex is valid")
    })
}

fn assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Za-z_$][\w$]*)\s*=\s*[\[{]").expect("assignment regex is valid")
    })
}

/// Keys that make a script worth parsing.
fn series_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"["'`]?\b(?:x|y|fr|freqs?|frequenc(?:y|ies)|amps?|amplitudes?)\b["'`]?\s*:"#,
        )
        .expect("series key regex is valid")
    })
}

fn scan_json_block(script: &ScriptBody, limits: WalkLimits, max_bytes: usize) -> Vec<Candidate> {
    let text = script.text.trim();
    if text.len() > max_bytes {
        debug!(bytes = text.len(), "skipping oversized JSON script block");
        return Vec::new();
    }
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => match parse_literal(text) {
            Ok(v) => v,
            Err(e) => {
                debug!("unparseable JSON script block: {e}");
                return Vec::new();
            }
        },
    };
    collect_candidates(&value, TRACE_NAME_STEM, limits)
}

fn scan_script(text: &str, limits: WalkLimits, max_bytes: usize) -> Vec<Candidate> {
    if !series_key_regex().is_match(text) {
        return Vec::new();
    }
    let mut out = Vec::new();

    for m in plot_call_regex().find_iter(text) {
        let Some(start) = second_argument_start(text, m.end()) else {
            continue;
        };
        let Some(value) = literal_at(text, start, max_bytes) else {
            continue;
        };
        trace!(offset = start, "parsed plotting call data");
        match &value {
            Value::Array(traces) => {
                for (i, trace) in traces.iter().enumerate() {
                    let hint = format!("{TRACE_NAME_STEM} {}", i + 1);
                    out.extend(collect_candidates(trace, &hint, limits));
                }
            }
            other => out.extend(collect_candidates(other, TRACE_NAME_STEM, limits)),
        }
    }

    for caps in assignment_regex().captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // The literal starts at the bracket that closes the match.
        let start = whole.end() - 1;
        let Some(value) = literal_at(text, start, max_bytes) else {
            continue;
        };
        out.extend(collect_candidates(&value, name.as_str(), limits));
    }
    out
}

/// Parse the literal starting at `start`, reading at most `max_bytes`.
fn literal_at(text: &str, start: usize, max_bytes: usize) -> Option<Value> {
    let mut end = text.len().min(start.saturating_add(max_bytes));
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    match parse_literal_at(&text[..end], start) {
        Ok((value, _)) => Some(value),
        Err(e) => {
            debug!(offset = start, "skipping non-literal: {e}");
            None
        }
    }
}

/// Offset of the second argument of a call whose argument list begins at
/// `pos`, skipping nested brackets and quoted strings in the first.
fn second_argument_start(text: &str, pos: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut iter = text[pos..].char_indices();

    while let Some((i, c)) = iter.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                let rest = &text[pos + i + 1..];
                let skipped = rest.len() - rest.trim_start().len();
                return Some(pos + i + 1 + skipped);
            }
            _ => {}
        }
    }
    None
}
