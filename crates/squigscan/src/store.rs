//! CurveStore — the page-scoped collection of captured measurements.
//!
//! Strategies freely report the same device more than once; the store
//! merges by normalized name so each device appears once. A later
//! extraction with data fills in an earlier placeholder without changing
//! its id, and an empty result never blanks out data already captured.

use crate::error::ScanError;
use crate::names::{self, MatchPolicy, NormalizedName};
use crate::types::{validate_series, Measurement, SourceTag};
use serde::Serialize;
use tracing::debug;

/// What an upsert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(String),
    Updated(String),
    Unchanged(String),
}

impl UpsertOutcome {
    pub fn id(&self) -> &str {
        match self {
            UpsertOutcome::Inserted(id)
            | UpsertOutcome::Updated(id)
            | UpsertOutcome::Unchanged(id) => id,
        }
    }

    /// True when the store's contents changed.
    pub fn is_change(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged(_))
    }
}

/// Totals reported to the badge and popup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCounts {
    #[serde(rename = "count")]
    pub total: usize,
    pub with_data: usize,
}

struct Entry {
    name: NormalizedName,
    measurement: Measurement,
}

/// Measurements keyed by normalized device name.
pub struct CurveStore {
    entries: Vec<Entry>,
    policy: MatchPolicy,
}

impl Default for CurveStore {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}

impl CurveStore {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Merge a strategy result into the store.
    ///
    /// Mismatched or malformed series are rejected before anything is
    /// touched. An existing match only takes the new series if it is
    /// non-empty.
    pub fn upsert(
        &mut self,
        raw_name: &str,
        frequencies: Vec<f64>,
        amplitudes: Vec<f64>,
        source: SourceTag,
    ) -> Result<UpsertOutcome, ScanError> {
        validate_series(&frequencies, &amplitudes)?;

        let name = names::normalize(raw_name);
        if name.key.is_empty() {
            return Err(ScanError::EmptyName {
                raw: raw_name.to_string(),
            });
        }

        let policy = self.policy;
        // Prefer an exact key hit over a looser substring hit.
        let position = self
            .entries
            .iter()
            .position(|e| e.name.key == name.key)
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|e| names::names_match(&e.name, &name, policy))
            });

        if let Some(index) = position {
            let entry = &mut self.entries[index];
            let id = entry.measurement.id.clone();
            if frequencies.is_empty() {
                return Ok(UpsertOutcome::Unchanged(id));
            }
            if entry.measurement.frequencies == frequencies
                && entry.measurement.amplitudes == amplitudes
                && entry.measurement.source == source
            {
                return Ok(UpsertOutcome::Unchanged(id));
            }
            debug!(
                id = %id,
                source = %source,
                points = frequencies.len(),
                "updating measurement series"
            );
            entry
                .measurement
                .replace_series(frequencies, amplitudes, source)?;
            return Ok(UpsertOutcome::Updated(id));
        }

        let id = measurement_id(source, &name.key);
        let measurement =
            Measurement::new(id.clone(), name.display.clone(), frequencies, amplitudes, source)?;
        debug!(id = %id, has_data = measurement.has_data(), "inserting measurement");
        self.entries.push(Entry { name, measurement });
        Ok(UpsertOutcome::Inserted(id))
    }

    /// Current measurements. Order is not part of the contract.
    pub fn snapshot(&self) -> Vec<Measurement> {
        self.entries.iter().map(|e| e.measurement.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Measurement> {
        self.entries
            .iter()
            .map(|e| &e.measurement)
            .find(|m| m.id == id)
    }

    /// Remove entries whose current source satisfies `predicate`.
    /// Returns how many were removed.
    pub fn clear<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(SourceTag) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|e| !predicate(e.measurement.source));
        before - self.entries.len()
    }

    pub fn clear_all(&mut self) -> usize {
        self.clear(|_| true)
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            total: self.entries.len(),
            with_data: self
                .entries
                .iter()
                .filter(|e| e.measurement.has_data())
                .count(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stable id for a newly discovered device.
pub fn measurement_id(source: SourceTag, key: &str) -> String {
    format!("{source}:{key}")
}
