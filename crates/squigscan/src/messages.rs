//! JSON message protocol between the scanner and its host.
//!
//! Every message is an object tagged by `action`. Inbound messages are
//! queries and page events; outbound messages are badge and popup
//! notifications. Replies to queries are untagged.

use crate::extraction::CapturedResponse;
use crate::page::PageSnapshot;
use crate::ranking::FrequencyRange;
use crate::store::StoreCounts;
use crate::target::TargetKind;
use crate::types::ScoredResult;
use serde::{Deserialize, Deserializer, Serialize};

/// Messages the host sends to the scanner.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Popup asking how many devices were found.
    GetMeasurementCount,
    /// Request for a ranked analysis. Defaults: Harman target, full range.
    OpenAnalysisModal {
        #[serde(default)]
        target: Option<TargetKind>,
        #[serde(default, deserialize_with = "range_from_str")]
        range: Option<FrequencyRange>,
    },
    /// The page changed; carries the new state if the host captured it.
    PageUpdated {
        #[serde(default)]
        snapshot: Option<PageSnapshot>,
    },
    /// A copy of a fetched response body.
    NetworkResponse(CapturedResponse),
    /// Drop everything and scan from scratch.
    ForceRescan,
    Shutdown,
}

fn range_from_str<'de, D>(deserializer: D) -> Result<Option<FrequencyRange>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}

/// Notifications the scanner pushes to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Toolbar badge count.
    UpdateBadge { count: usize },
    /// Popup status line.
    #[serde(rename_all = "camelCase")]
    UpdateMeasurementCount { count: usize, with_data: usize },
}

impl OutboundMessage {
    pub fn badge(counts: StoreCounts) -> Self {
        OutboundMessage::UpdateBadge {
            count: counts.total,
        }
    }

    pub fn status(counts: StoreCounts) -> Self {
        OutboundMessage::UpdateMeasurementCount {
            count: counts.total,
            with_data: counts.with_data,
        }
    }
}

/// Result of an `openAnalysisModal` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub target: TargetKind,
    pub range: FrequencyRange,
    /// Devices in the store when the analysis ran, placeholders included.
    pub found: usize,
    pub results: Vec<ScoredResult>,
}

/// Reply to an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Counts(StoreCounts),
    Analysis(AnalysisReport),
    Ack { ok: bool },
}

impl Reply {
    pub fn ack() -> Self {
        Reply::Ack { ok: true }
    }
}
