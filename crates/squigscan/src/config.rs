//! Scan configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields a usable config. Selected fields can be overridden through
//! `SQUIGSCAN_*` environment variables.

use crate::error::ConfigError;
use crate::names::MatchPolicy;
use crate::target::DEFAULT_STEP_RATIO;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Tunables for the extraction heuristics and the page watcher.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum point count for a chart path to count as a curve.
    pub min_curve_points: usize,
    /// Periodic re-scan interval while nothing has been found.
    pub poll_interval_ms: u64,
    /// Periodic re-scans before giving up.
    pub max_poll_attempts: u32,
    /// Quiet period that coalesces mutation bursts into one scan.
    pub mutation_quiet_ms: u64,
    /// Network responses retained for re-parsing on re-scan.
    pub max_captured_responses: usize,
    /// CSS selector of the chart container whose paths carry datum objects.
    pub chart_container: String,
    /// Page-global variable names probed by the global-state scan.
    pub global_names: Vec<String>,
    /// Selectors whose text is scanned for device names (recall channel).
    pub text_selectors: Vec<String>,
    /// Structural walk bounds for global and literal data.
    pub walk_max_depth: usize,
    pub walk_max_keys: usize,
    pub walk_max_nodes: usize,
    /// Largest inline literal the literal parser will attempt.
    pub max_literal_bytes: usize,
    pub match_policy: MatchPolicy,
    /// Multiplicative step of the target curves' frequency axis.
    pub target_step_ratio: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_curve_points: 50,
            poll_interval_ms: 1_000,
            max_poll_attempts: 20,
            mutation_quiet_ms: 500,
            max_captured_responses: 64,
            chart_container: "svg#fr-graph, div[id*=\"graph\"] svg, svg".to_string(),
            global_names: [
                "phoneObjs",
                "activePhones",
                "allPhones",
                "phoneData",
                "graphData",
                "frData",
                "measurements",
                "plotData",
                "chartData",
                "__INITIAL_STATE__",
                "__NEXT_DATA__",
                "__NUXT__",
                "__APP_STATE__",
                "__PRELOADED_STATE__",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            text_selectors: [
                "[class*=\"phone\"]",
                "[class*=\"headphone\"]",
                "[class*=\"model\"]",
                "[class*=\"iem\"]",
                "[data-phone]",
                ".legend text",
                "option",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            walk_max_depth: 6,
            walk_max_keys: 256,
            walk_max_nodes: 50_000,
            max_literal_bytes: 5_000_000,
            match_policy: MatchPolicy::Permissive,
            target_step_ratio: DEFAULT_STEP_RATIO,
        }
    }
}

impl ScanConfig {
    /// Parse a TOML document, then validate.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        info!("loaded scan config from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        if let Err(e) = config.validate() {
            warn!("ignoring environment overrides: {e}");
            return Self::default();
        }
        config
    }

    /// Apply `SQUIGSCAN_*` overrides. Unparseable values are logged and skipped.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(name: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("ignoring {name}={value:?}: not a valid value");
                    None
                }
            }
        }

        if let Some(v) = parsed("SQUIGSCAN_MIN_POINTS", lookup("SQUIGSCAN_MIN_POINTS")) {
            self.min_curve_points = v;
        }
        if let Some(v) = parsed("SQUIGSCAN_POLL_MS", lookup("SQUIGSCAN_POLL_MS")) {
            self.poll_interval_ms = v;
        }
        if let Some(v) = parsed("SQUIGSCAN_MAX_POLLS", lookup("SQUIGSCAN_MAX_POLLS")) {
            self.max_poll_attempts = v;
        }
        if let Some(v) = parsed("SQUIGSCAN_QUIET_MS", lookup("SQUIGSCAN_QUIET_MS")) {
            self.mutation_quiet_ms = v;
        }
        if let Some(policy) = lookup("SQUIGSCAN_MATCH_POLICY") {
            match policy.trim().to_ascii_lowercase().as_str() {
                "permissive" => self.match_policy = MatchPolicy::Permissive,
                "exact" | "exact_key" => self.match_policy = MatchPolicy::ExactKey,
                other => warn!("ignoring SQUIGSCAN_MATCH_POLICY={other:?}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.mutation_quiet_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "mutation_quiet_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if !(self.target_step_ratio.is_finite() && self.target_step_ratio > 1.0) {
            return Err(ConfigError::Invalid {
                field: "target_step_ratio",
                reason: format!("{} is not greater than 1", self.target_step_ratio),
            });
        }
        if self.max_captured_responses == 0 {
            return Err(ConfigError::Invalid {
                field: "max_captured_responses",
                reason: "must be at least 1".into(),
            });
        }
        if self.walk_max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "walk_max_depth",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn mutation_quiet(&self) -> Duration {
        Duration::from_millis(self.mutation_quiet_ms)
    }
}
