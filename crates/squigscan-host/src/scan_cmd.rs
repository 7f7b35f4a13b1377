//! `squigscan scan <page>` — one scan pass over a captured page, then rank.

use crate::output::{self, Styled};
use crate::snapshot;
use anyhow::{Context, Result};
use squigscan::extraction::{run_all, ScanContext};
use squigscan::{
    detect_site, ranking, AnalysisReport, CurveStore, FrequencyRange, ScanConfig, TargetKind,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// Inputs of a one-shot scan.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub input: PathBuf,
    pub url: Option<String>,
    pub responses: Option<PathBuf>,
    pub target: TargetKind,
    pub range: FrequencyRange,
}

/// Scan the page and build the ranked report.
pub fn analyze_page(request: &ScanRequest, config: &ScanConfig) -> Result<AnalysisReport> {
    let page = snapshot::load_page(&request.input, request.url.as_deref())?;
    let responses = match &request.responses {
        Some(path) => snapshot::load_responses(path)?,
        None => Vec::new(),
    };

    let verdict = detect_site(&page);
    if !verdict.is_supported() {
        warn!(
            input = %request.input.display(),
            "page does not look like a graph tool; scanning anyway"
        );
    }

    let mut store = CurveStore::new(config.match_policy);
    let ctx = ScanContext::new(&page, &responses, config);
    let report = run_all(&ctx, &mut store);
    let counts = store.counts();
    info!(
        candidates = report.candidates,
        rejected = report.rejected,
        total = counts.total,
        with_data = counts.with_data,
        "scan complete"
    );

    let results = ranking::analyze(
        &store.snapshot(),
        request.target,
        request.range,
        config.target_step_ratio,
    );
    Ok(AnalysisReport {
        target: request.target,
        range: request.range,
        found: store.len(),
        results,
    })
}

/// Run the scan command.
pub fn run(request: &ScanRequest, config: &ScanConfig, json: bool) -> Result<()> {
    let report = analyze_page(request, config)?;

    if json {
        let value = serde_json::to_value(&report).context("failed to serialize report")?;
        output::print_json(&value);
        return Ok(());
    }

    let s = Styled::new();
    let with_data = report.results.iter().filter(|r| r.is_comparable()).count();
    let sym = if with_data > 0 { s.ok_sym() } else { s.warn_sym() };
    eprintln!(
        "  {sym} Found {} measurements ({with_data} with data in range)",
        report.found
    );
    eprintln!(
        "  {}",
        s.dim(&format!(
            "{} · {} Hz",
            report.target.label(),
            report.range
        ))
    );
    eprintln!();
    print!("{}", output::styled_table(&s, &report.results));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn snapshot_file(value: serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(value.to_string().as_bytes()).unwrap();
        file
    }

    fn flat_points(n: usize, level: f64) -> serde_json::Value {
        json!((0..n)
            .map(|i| json!([20.0 * 1.12_f64.powi(i as i32), level]))
            .collect::<Vec<_>>())
    }

    #[test]
    fn test_analyze_page_ranks_sources_together() {
        let file = snapshot_file(json!({
            "url": "https://crin.squig.link/",
            "html": "<html><body><div class=\"phone-item\">Moondrop Aria</div></body></html>",
            "chart_data": [
                {"id": "Sennheiser HD650", "l": flat_points(60, 3.0)},
                {"id": "Harman Target", "l": flat_points(60, 0.0)}
            ],
            "globals": {
                "phoneObjs": [{"dispName": "Truthear Zero", "fr": [[100, 1], [1000, 1], [5000, 1]]}]
            }
        }));
        let request = ScanRequest {
            input: file.path().to_path_buf(),
            url: None,
            responses: None,
            target: TargetKind::Flat,
            range: FrequencyRange::FULL,
        };
        let report = analyze_page(&request, &ScanConfig::default()).unwrap();

        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Truthear Zero", "Sennheiser HD650", "Moondrop Aria"]);
        assert_eq!(report.results[0].deviation_db, 1.0);
        assert_eq!(report.results[1].deviation_db, 3.0);
        assert!(!report.results[2].is_comparable());
        assert_eq!(report.found, 3);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let request = ScanRequest {
            input: PathBuf::from("/nonexistent/page.json"),
            url: None,
            responses: None,
            target: TargetKind::Harman,
            range: FrequencyRange::FULL,
        };
        assert!(analyze_page(&request, &ScanConfig::default()).is_err());
    }
}
