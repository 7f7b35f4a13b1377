//! Ranking of scored results and the frequency windows offered for analysis.

use crate::scoring;
use crate::target::{self, TargetKind};
use crate::types::{Measurement, ScoredResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

/// A closed frequency window in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyRange {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl FrequencyRange {
    pub const FULL: FrequencyRange = FrequencyRange::new(20.0, 20_000.0);
    pub const BASS: FrequencyRange = FrequencyRange::new(20.0, 200.0);
    pub const MIDRANGE: FrequencyRange = FrequencyRange::new(200.0, 2_000.0);
    pub const TREBLE: FrequencyRange = FrequencyRange::new(2_000.0, 20_000.0);

    pub const fn new(min_hz: f64, max_hz: f64) -> Self {
        Self { min_hz, max_hz }
    }
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for FrequencyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min_hz, self.max_hz)
    }
}

impl FromStr for FrequencyRange {
    type Err = String;

    /// Accepts `"lo-hi"` in Hz or a preset name (full, bass, midrange, treble).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "full" => return Ok(Self::FULL),
            "bass" => return Ok(Self::BASS),
            "mid" | "midrange" => return Ok(Self::MIDRANGE),
            "treble" => return Ok(Self::TREBLE),
            _ => {}
        }
        let (lo, hi) = s
            .split_once('-')
            .ok_or_else(|| format!("expected \"lo-hi\", got {s:?}"))?;
        let min_hz: f64 = lo
            .trim()
            .parse()
            .map_err(|_| format!("invalid lower bound {lo:?}"))?;
        let max_hz: f64 = hi
            .trim()
            .parse()
            .map_err(|_| format!("invalid upper bound {hi:?}"))?;
        if !(min_hz.is_finite() && max_hz.is_finite()) || min_hz > max_hz {
            return Err(format!("invalid range {min_hz}-{max_hz}"));
        }
        Ok(Self { min_hz, max_hz })
    }
}

/// Sort ascending by deviation. Infinite deviations go last; equal
/// deviations keep discovery order.
pub fn rank(mut results: Vec<ScoredResult>) -> Vec<ScoredResult> {
    // total_cmp orders +inf after every finite value and is a total order,
    // so the stable sort is well defined even with NaN present.
    results.sort_by(|a, b| a.deviation_db.total_cmp(&b.deviation_db));
    results
}

/// Score measurements against a generated target and rank them.
pub fn analyze(
    measurements: &[Measurement],
    kind: TargetKind,
    range: FrequencyRange,
    step_ratio: f64,
) -> Vec<ScoredResult> {
    let target = target::generate_with_ratio(kind, step_ratio);
    rank(scoring::score_all(
        measurements,
        &target,
        range.min_hz,
        range.max_hz,
    ))
}

/// Plain-text rank table: rank, model, deviation (dB RMS).
pub fn render_table(results: &[ScoredResult]) -> String {
    let name_width = results
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Model".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:>4}  {:<name_width$}  {:>10}", "Rank", "Model", "Deviation");
    for (i, r) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:<name_width$}  {:>10}",
            i + 1,
            r.name,
            format_deviation(r.deviation_db)
        );
    }
    out
}

/// Two decimals, or `inf` for the incomparable sentinel.
pub fn format_deviation(deviation_db: f64) -> String {
    if deviation_db.is_finite() {
        format!("{deviation_db:.2}")
    } else {
        "inf".to_string()
    }
}
