//! Run-level counters, exposed for the console summary.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::verdict::VerdictKind;

/// Counters for a single request path.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
pub struct PathCounters {
    pub success: u64,
    pub warnings: u64,
    pub errors: u64,
    pub skipped: u64,
}

/// Aggregated counters for the whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunStats {
    pub success: u64,
    pub warnings: u64,
    pub errors: u64,
    pub skipped: u64,
    /// Responses with 401/403, counted regardless of verdict.
    pub auth_errors: u64,
    /// Transport/I-O faults caught while running a test body.
    pub io_errors: u64,
    /// Per-path breakdown of the four verdict counters.
    pub per_path: HashMap<String, PathCounters>,
}

impl RunStats {
    /// Record exactly one terminal classification.
    pub fn record(&mut self, kind: VerdictKind, path: &str, status_code: u16) {
        let entry = self.per_path.entry(path.to_string()).or_default();
        match kind {
            VerdictKind::Success => {
                self.success += 1;
                entry.success += 1;
            }
            VerdictKind::Warning => {
                self.warnings += 1;
                entry.warnings += 1;
            }
            VerdictKind::Error => {
                self.errors += 1;
                entry.errors += 1;
            }
            VerdictKind::SkippedReporting => {
                self.skipped += 1;
                entry.skipped += 1;
            }
        }
        if status_code == 401 || status_code == 403 {
            self.auth_errors += 1;
        }
    }

    pub fn record_io_error(&mut self) {
        self.io_errors += 1;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.success + self.warnings + self.errors + self.skipped
    }

    /// Compact one-line summary: "12 success, 3 warnings, 1 errors, 0 skipped".
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{} success, {} warnings, {} errors, {} skipped",
            self.success, self.warnings, self.errors, self.skipped
        )
    }
}
