//! Chart data-binding scan: datum objects attached to the chart's paths.

use super::shapes::point_pairs;
use super::{Candidate, ExtractionStrategy, ScanContext};
use crate::names::is_reference_curve;
use crate::types::SourceTag;
use serde_json::Value;
use tracing::debug;

/// Fields that identify a plotted curve, in preference order.
const ID_FIELDS: &[&str] = &["id", "dispName", "fullName", "name", "label"];

/// Fields holding the plotted `[x, y]` points.
const POINT_FIELDS: &[&str] = &["l", "data", "points", "values"];

pub struct ChartScan;

impl ExtractionStrategy for ChartScan {
    fn source(&self) -> SourceTag {
        SourceTag::Chart
    }

    fn extract(&self, ctx: &ScanContext<'_>) -> Vec<Candidate> {
        ctx.page
            .path_data(&ctx.config.chart_container)
            .iter()
            .filter_map(|datum| candidate_from_datum(datum, ctx.config.min_curve_points))
            .collect()
    }
}

fn candidate_from_datum(datum: &Value, min_points: usize) -> Option<Candidate> {
    let obj = datum.as_object()?;
    let id = ID_FIELDS.iter().find_map(|field| {
        obj.get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })?;

    if is_reference_curve(id) {
        debug!(id, "skipping reference curve");
        return None;
    }

    let (frequencies, amplitudes) = POINT_FIELDS
        .iter()
        .find_map(|field| point_pairs(obj.get(*field)?))?;
    if frequencies.len() <= min_points {
        debug!(id, points = frequencies.len(), "chart path too short");
        return None;
    }

    Some(Candidate {
        raw_name: id.to_string(),
        frequencies,
        amplitudes,
    })
}
