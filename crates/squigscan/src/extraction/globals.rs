//! Global-state scan: well-known page globals walked for curve shapes.

use super::literal::parse_literal;
use super::shapes::collect_candidates;
use super::{Candidate, ExtractionStrategy, ScanContext};
use crate::types::SourceTag;
use serde_json::Value;
use tracing::{debug, trace};

pub struct GlobalStateScan;

impl ExtractionStrategy for GlobalStateScan {
    fn source(&self) -> SourceTag {
        SourceTag::Globals
    }

    fn extract(&self, ctx: &ScanContext<'_>) -> Vec<Candidate> {
        let limits = ctx.walk_limits();
        let mut out = Vec::new();

        for name in &ctx.config.global_names {
            let Some(value) = ctx.page.global(name) else {
                continue;
            };
            trace!(global = %name, "walking page global");

            // Some hosts serialize a global as its source text.
            let found = match value {
                Value::String(text) if text.len() <= ctx.config.max_literal_bytes => {
                    match parse_literal(text) {
                        Ok(parsed) => collect_candidates(&parsed, name, limits),
                        Err(e) => {
                            debug!(global = %name, "global is not a data literal: {e}");
                            Vec::new()
                        }
                    }
                }
                other => collect_candidates(other, name, limits),
            };
            out.extend(found);
        }
        out
    }
}
