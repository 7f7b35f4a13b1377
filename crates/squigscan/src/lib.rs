//! squigscan — frequency-response curve scraping and target-deviation ranking.
//!
//! The crate pulls headphone/IEM measurement curves out of graph tool pages
//! through a set of best-effort extraction strategies, merges them by
//! device name, and ranks them by RMS deviation from a reference target.
//!
//! Pages are read through [`PageSource`]; [`PageSnapshot`] is the captured,
//! serializable form. [`PageWatcher`] runs the long-lived scan session a
//! host drives with [`InboundMessage`]s.

pub mod config;
pub mod detect;
pub mod error;
pub mod extraction;
pub mod messages;
pub mod names;
pub mod page;
pub mod ranking;
pub mod scoring;
pub mod store;
pub mod target;
pub mod types;
pub mod watcher;

pub use config::ScanConfig;
pub use detect::{detect_site, SiteVerdict};
pub use error::{ConfigError, LiteralError, ScanError, WatcherError};
pub use extraction::{run_all, CapturedResponse, Candidate, ExtractionStrategy, ScanContext};
pub use messages::{AnalysisReport, InboundMessage, OutboundMessage, Reply};
pub use names::{normalize, MatchPolicy, NormalizedName};
pub use page::{PageSnapshot, PageSource};
pub use ranking::{rank, render_table, FrequencyRange};
pub use scoring::score;
pub use store::{CurveStore, StoreCounts, UpsertOutcome};
pub use target::{generate, TargetKind};
pub use types::{Measurement, ScoredResult, SourceTag, TargetCurve};
pub use watcher::{NetworkTap, PageWatcher, ScanPhase, WatcherHandle};
