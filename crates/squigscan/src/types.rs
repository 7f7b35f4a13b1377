//! Core data types: measurements, target curves and scored results.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which extraction strategy produced a measurement.
///
/// Variants are declared in strategy priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Datum objects bound to the chart's vector paths.
    Chart,
    /// Well-known page-global variables.
    Globals,
    /// Literals inside inline script bodies.
    Inline,
    /// Intercepted network responses.
    Network,
    /// Visible page text (name-only placeholders).
    Text,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Chart => "chart",
            SourceTag::Globals => "globals",
            SourceTag::Inline => "inline",
            SourceTag::Network => "network",
            SourceTag::Text => "text",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named frequency-response series.
///
/// Only constructible through [`Measurement::new`], which enforces equal
/// lengths, finite values and positive frequencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub(crate) id: String,
    pub(crate) display_name: String,
    pub(crate) frequencies: Vec<f64>,
    pub(crate) amplitudes: Vec<f64>,
    pub(crate) source: SourceTag,
}

impl Measurement {
    /// Build a measurement, rejecting malformed series.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        frequencies: Vec<f64>,
        amplitudes: Vec<f64>,
        source: SourceTag,
    ) -> Result<Self, ScanError> {
        validate_series(&frequencies, &amplitudes)?;
        Ok(Self {
            id: id.into(),
            display_name: display_name.into(),
            frequencies,
            amplitudes,
            source,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    pub fn source(&self) -> SourceTag {
        self.source
    }

    /// True iff the measurement carries at least one sample.
    pub fn has_data(&self) -> bool {
        !self.frequencies.is_empty()
    }

    /// Replace the series in place. Same validation as construction.
    pub(crate) fn replace_series(
        &mut self,
        frequencies: Vec<f64>,
        amplitudes: Vec<f64>,
        source: SourceTag,
    ) -> Result<(), ScanError> {
        validate_series(&frequencies, &amplitudes)?;
        self.frequencies = frequencies;
        self.amplitudes = amplitudes;
        self.source = source;
        Ok(())
    }
}

/// Check the shape invariant shared by measurements and candidates.
pub fn validate_series(frequencies: &[f64], amplitudes: &[f64]) -> Result<(), ScanError> {
    if frequencies.len() != amplitudes.len() {
        return Err(ScanError::ShapeMismatch {
            frequencies: frequencies.len(),
            amplitudes: amplitudes.len(),
        });
    }
    for (index, (&f, &a)) in frequencies.iter().zip(amplitudes).enumerate() {
        if !f.is_finite() || !a.is_finite() {
            return Err(ScanError::NonFinite { index });
        }
        if f <= 0.0 {
            return Err(ScanError::NonPositiveFrequency { index, value: f });
        }
    }
    Ok(())
}

/// A reference curve generated from a closed-form formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCurve {
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<f64>,
}

impl TargetCurve {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// One row of an analysis: a measurement's deviation from a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    pub name: String,
    /// RMS deviation in dB, or `f64::INFINITY` when nothing was comparable.
    /// Serializes the sentinel as `null`.
    pub deviation_db: f64,
    pub source_id: String,
}

impl ScoredResult {
    pub fn is_comparable(&self) -> bool {
        self.deviation_db.is_finite()
    }
}
