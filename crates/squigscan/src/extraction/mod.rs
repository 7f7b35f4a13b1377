//! Measurement extraction strategies.
//!
//! Each strategy reads one substrate of the page (chart bindings, global
//! state, inline scripts, network responses, visible text) and reports
//! [`Candidate`]s. Strategies never share mutable state; the
//! [`CurveStore`] merges whatever they report.

pub mod chart;
pub mod globals;
pub mod inline;
pub mod literal;
pub mod network;
pub mod shapes;
pub mod text;

use crate::config::ScanConfig;
use crate::names::is_reference_curve;
use crate::page::PageSource;
use crate::store::{CurveStore, UpsertOutcome};
use crate::types::SourceTag;
use scraper::Html;
use std::cell::OnceCell;
use tracing::{debug, info};

pub use chart::ChartScan;
pub use globals::GlobalStateScan;
pub use inline::InlineScriptScan;
pub use network::{is_measurement_url, CapturedResponse, NetworkScan};
pub use shapes::WalkLimits;
pub use text::VisibleTextScan;

/// A raw series found on the page, before validation and merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub raw_name: String,
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<f64>,
}

impl Candidate {
    /// A name-only placeholder.
    pub fn placeholder(raw_name: impl Into<String>) -> Self {
        Self {
            raw_name: raw_name.into(),
            frequencies: Vec::new(),
            amplitudes: Vec::new(),
        }
    }
}

/// Everything a strategy may read during one scan pass.
pub struct ScanContext<'a> {
    pub page: &'a dyn PageSource,
    pub responses: &'a [CapturedResponse],
    pub config: &'a ScanConfig,
    document: OnceCell<Html>,
}

impl<'a> ScanContext<'a> {
    pub fn new(
        page: &'a dyn PageSource,
        responses: &'a [CapturedResponse],
        config: &'a ScanConfig,
    ) -> Self {
        Self {
            page,
            responses,
            config,
            document: OnceCell::new(),
        }
    }

    /// The page document, parsed on first use and shared by every strategy
    /// in the pass.
    pub fn document(&self) -> &Html {
        self.document
            .get_or_init(|| Html::parse_document(self.page.html()))
    }

    pub fn walk_limits(&self) -> WalkLimits {
        WalkLimits {
            max_depth: self.config.walk_max_depth,
            max_keys: self.config.walk_max_keys,
            max_nodes: self.config.walk_max_nodes,
        }
    }
}

/// One heuristic over one page substrate.
pub trait ExtractionStrategy: Send + Sync {
    /// Tag recorded on measurements this strategy produces.
    fn source(&self) -> SourceTag;

    /// Candidates found in the current page state. Malformed data is
    /// skipped, never reported as an error.
    fn extract(&self, ctx: &ScanContext<'_>) -> Vec<Candidate>;
}

/// All strategies in priority order.
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(ChartScan),
        Box::new(GlobalStateScan),
        Box::new(InlineScriptScan),
        Box::new(NetworkScan),
        Box::new(VisibleTextScan),
    ]
}

/// Tally of one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub candidates: usize,
    pub inserted: usize,
    pub updated: usize,
    pub rejected: usize,
}

impl ScanReport {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated > 0
    }
}

/// Run `strategies` in order and merge every candidate into `store`.
pub fn run_strategies(
    strategies: &[Box<dyn ExtractionStrategy>],
    ctx: &ScanContext<'_>,
    store: &mut CurveStore,
) -> ScanReport {
    let mut report = ScanReport::default();

    for strategy in strategies {
        run_strategy(strategy.as_ref(), ctx, store, &mut report);
    }

    if report.changed() {
        let counts = store.counts();
        info!(
            inserted = report.inserted,
            updated = report.updated,
            total = counts.total,
            with_data = counts.with_data,
            "scan pass complete"
        );
    }
    report
}

/// Run one strategy and merge its candidates into `store`, tallying into
/// `report`. Reference curves are refused whichever strategy found them.
pub fn run_strategy(
    strategy: &dyn ExtractionStrategy,
    ctx: &ScanContext<'_>,
    store: &mut CurveStore,
    report: &mut ScanReport,
) {
    let source = strategy.source();
    let candidates = strategy.extract(ctx);
    if !candidates.is_empty() {
        debug!(source = %source, count = candidates.len(), "strategy produced candidates");
    }
    report.candidates += candidates.len();

    for candidate in candidates {
        if is_reference_curve(&candidate.raw_name) {
            debug!(source = %source, name = %candidate.raw_name, "skipping reference curve");
            report.rejected += 1;
            continue;
        }
        match store.upsert(
            &candidate.raw_name,
            candidate.frequencies,
            candidate.amplitudes,
            source,
        ) {
            Ok(UpsertOutcome::Inserted(_)) => report.inserted += 1,
            Ok(UpsertOutcome::Updated(_)) => report.updated += 1,
            Ok(UpsertOutcome::Unchanged(_)) => {}
            Err(e) => {
                debug!(source = %source, name = %candidate.raw_name, "rejected candidate: {e}");
                report.rejected += 1;
            }
        }
    }
}

/// Run the default strategies once.
pub fn run_all(ctx: &ScanContext<'_>, store: &mut CurveStore) -> ScanReport {
    run_strategies(&default_strategies(), ctx, store)
}
