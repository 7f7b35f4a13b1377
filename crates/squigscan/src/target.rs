//! Reference target curves.
//!
//! All curves share a geometric frequency axis from 20 Hz to 20 kHz. The
//! amplitude formulas are simplified approximations, not published target
//! data:
//!
//! - **Flat**: 0 dB everywhere.
//! - **Diffuse field**: 0 dB up to 1 kHz, then `6 · log10(f / 1 kHz)` dB.
//! - **Harman-like**: linear interpolation on a log-frequency axis between
//!   the anchors in [`HARMAN_ANCHORS`]: a bass shelf below 100 Hz, flat
//!   midrange, a presence rise peaking at 3 kHz and a treble roll-off.

use crate::types::TargetCurve;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const AXIS_START_HZ: f64 = 20.0;
pub const AXIS_END_HZ: f64 = 20_000.0;

/// Default per-step multiplicative ratio of the frequency axis.
pub const DEFAULT_STEP_RATIO: f64 = 1.05;

/// Gain of the diffuse-field rise above 1 kHz, in dB per decade.
pub const DIFFUSE_FIELD_GAIN_DB: f64 = 6.0;

/// `(frequency Hz, amplitude dB)` anchors of the Harman-like curve.
pub const HARMAN_ANCHORS: [(f64, f64); 7] = [
    (20.0, 6.0),
    (80.0, 5.5),
    (200.0, 0.0),
    (1_000.0, 0.0),
    (3_000.0, 8.0),
    (8_000.0, 3.0),
    (20_000.0, -4.0),
];

/// Which reference curve to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Flat,
    #[serde(alias = "diffuse", alias = "diffuse-field")]
    DiffuseField,
    #[default]
    Harman,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [TargetKind::Harman, TargetKind::DiffuseField, TargetKind::Flat];

    pub fn label(&self) -> &'static str {
        match self {
            TargetKind::Flat => "Flat Response",
            TargetKind::DiffuseField => "Diffuse Field",
            TargetKind::Harman => "Harman Target",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetKind::Flat => "flat",
            TargetKind::DiffuseField => "diffuse-field",
            TargetKind::Harman => "harman",
        };
        f.write_str(s)
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(TargetKind::Flat),
            "diffuse" | "diffuse-field" | "diffuse_field" | "df" => Ok(TargetKind::DiffuseField),
            "harman" => Ok(TargetKind::Harman),
            other => Err(format!("unknown target kind: {other}")),
        }
    }
}

/// Generate a target curve on the default axis.
pub fn generate(kind: TargetKind) -> TargetCurve {
    generate_with_ratio(kind, DEFAULT_STEP_RATIO)
}

/// Generate a target curve with a custom axis step ratio.
///
/// Ratios at or below 1.0 would never reach 20 kHz and fall back to the
/// default.
pub fn generate_with_ratio(kind: TargetKind, ratio: f64) -> TargetCurve {
    let frequencies = frequency_axis(ratio);
    let amplitudes = frequencies
        .iter()
        .map(|&f| match kind {
            TargetKind::Flat => 0.0,
            TargetKind::DiffuseField => diffuse_field_db(f),
            TargetKind::Harman => harman_db(f),
        })
        .collect();
    TargetCurve {
        frequencies,
        amplitudes,
    }
}

/// Geometric axis `20 · ratio^i` up to 20 kHz, closed with an exact 20 kHz
/// sample.
pub fn frequency_axis(ratio: f64) -> Vec<f64> {
    let ratio = if ratio.is_finite() && ratio > 1.0 {
        ratio
    } else {
        DEFAULT_STEP_RATIO
    };

    let mut axis = Vec::new();
    let mut step: i32 = 0;
    loop {
        let f = AXIS_START_HZ * ratio.powi(step);
        if f >= AXIS_END_HZ {
            break;
        }
        axis.push(f);
        step += 1;
    }
    axis.push(AXIS_END_HZ);
    axis
}

fn diffuse_field_db(f: f64) -> f64 {
    if f <= 1_000.0 {
        0.0
    } else {
        (f / 1_000.0).log10() * DIFFUSE_FIELD_GAIN_DB
    }
}

fn harman_db(f: f64) -> f64 {
    let (first_f, first_db) = HARMAN_ANCHORS[0];
    if f <= first_f {
        return first_db;
    }
    for pair in HARMAN_ANCHORS.windows(2) {
        let (f_lo, db_lo) = pair[0];
        let (f_hi, db_hi) = pair[1];
        if f <= f_hi {
            let t = (f.log10() - f_lo.log10()) / (f_hi.log10() - f_lo.log10());
            return db_lo + t * (db_hi - db_lo);
        }
    }
    HARMAN_ANCHORS[HARMAN_ANCHORS.len() - 1].1
}
