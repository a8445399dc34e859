//! Ignore policy — operator-configured rules that downgrade or hide
//! classifications from the report.

use serde::{Deserialize, Serialize};

use crate::model::ResponseView;

/// Per-run ignore configuration, loaded from the project config.
///
/// All flags default to off: everything is checked and everything is
/// reported unless the operator opts out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnorePolicy {
    /// Status codes whose mismatches are filtered. Entries may use `X` as a
    /// digit wildcard ("5XX").
    pub ignored_codes: Vec<String>,
    /// A response whose body contains any of these terms is filtered.
    pub ignored_body_terms: Vec<String>,
    /// Hide warnings from the report entirely.
    pub hide_warnings: bool,
    /// Hide successes from the report entirely.
    pub hide_success: bool,
    /// Hide responses matched by the ignore filters instead of reporting
    /// them as downgraded successes.
    pub hide_ignored_matches: bool,
    /// Skip the documented-example body check.
    pub skip_body_check: bool,
    /// Skip the expected-but-undocumented-code check.
    pub skip_undocumented_check: bool,
    /// Skip the content-type conformance check.
    pub skip_content_type_check: bool,
    /// Skip scanning bodies for leaked error details.
    pub skip_leak_check: bool,
    /// Maximum acceptable response time in milliseconds; 0 disables.
    pub max_response_time_ms: u64,
}

impl IgnorePolicy {
    #[must_use]
    pub fn is_ignored_code(&self, code: &str) -> bool {
        self.ignored_codes.iter().any(|entry| {
            entry.len() == code.len()
                && entry
                    .chars()
                    .zip(code.chars())
                    .all(|(e, c)| e.eq_ignore_ascii_case(&'x') || e.eq_ignore_ascii_case(&c))
        })
    }

    /// Whether the response as a whole matches the operator's filters,
    /// either by status code or by body content.
    #[must_use]
    pub fn is_ignored_response(&self, response: &ResponseView) -> bool {
        self.is_ignored_code(&response.code())
            || self
                .ignored_body_terms
                .iter()
                .any(|term| !term.is_empty() && response.body.contains(term))
    }
}
