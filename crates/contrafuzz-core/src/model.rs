//! Shared views: the observed response, the contract's expectations, and the
//! per-test summary kept for the final report.

use std::collections::{HashMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The response as observed for one test execution.
///
/// Pure data — the verdict engine never re-reads the wire.
#[derive(Debug, Clone)]
pub struct ResponseView {
    pub status_code: u16,
    /// Raw body text, possibly empty.
    pub body: String,
    /// Parsed JSON body; absent when the body is not valid JSON.
    pub json: Option<serde_json::Value>,
    /// Declared Content-Type header, if any.
    pub content_type: Option<String>,
    pub latency_ms: u64,
    /// Qualified name of the fuzzed field, when the mutation targeted one.
    pub fuzzed_field: Option<String>,
}

impl ResponseView {
    #[must_use]
    pub fn new(
        status_code: u16,
        body: impl Into<String>,
        content_type: Option<String>,
        latency_ms: u64,
    ) -> Self {
        let body = body.into();
        let json = serde_json::from_str(&body).ok();
        Self {
            status_code,
            body,
            json,
            content_type,
            latency_ms,
            fuzzed_field: None,
        }
    }

    #[must_use]
    pub fn with_fuzzed_field(mut self, field: impl Into<String>) -> Self {
        self.fuzzed_field = Some(field.into());
        self
    }

    /// Status code as the 3-digit string used throughout contract lookups.
    #[must_use]
    pub fn code(&self) -> String {
        self.status_code.to_string()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Per-operation metadata supplied by the contract loader.
#[derive(Debug, Clone, Default)]
pub struct ContractExpectation {
    /// Documented status codes, kept as strings ("200", "4XX").
    pub documented_codes: HashSet<String>,
    /// Documented example bodies, keyed by exact code or range token ("4XX").
    pub documented_bodies: HashMap<String, Vec<String>>,
    /// Documented content types per exact status code.
    pub documented_content_types: HashMap<String, Vec<String>>,
}

impl ContractExpectation {
    /// Whether `code` is literally documented.
    #[must_use]
    pub fn covers_code(&self, code: &str) -> bool {
        self.documented_codes.contains(code)
    }

    /// Whether the code's range token ("4XX" for "404") is itself documented.
    #[must_use]
    pub fn covers_range(&self, code: &str) -> bool {
        let Some(token) = range_token(code) else {
            return false;
        };
        self.documented_codes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&token))
    }

    /// Documented example bodies for `code`, falling back to the code's
    /// range token (case-insensitively).
    #[must_use]
    pub fn bodies_for(&self, code: &str) -> &[String] {
        if let Some(bodies) = self.documented_bodies.get(code) {
            return bodies;
        }
        if let Some(token) = range_token(code) {
            for (key, bodies) in &self.documented_bodies {
                if key.eq_ignore_ascii_case(&token) {
                    return bodies;
                }
            }
        }
        &[]
    }

    /// Documented content types for `code`. Empty when the contract does not
    /// constrain this code.
    #[must_use]
    pub fn content_types_for(&self, code: &str) -> &[String] {
        self.documented_content_types
            .get(code)
            .map_or(&[], Vec::as_slice)
    }
}

/// "404" → "4XX". `None` for codes that are not 3 digits.
#[must_use]
pub fn range_token(code: &str) -> Option<String> {
    if code.len() != 3 {
        return None;
    }
    let first = code.chars().next()?;
    first.is_ascii_digit().then(|| format!("{first}XX"))
}

/// Snapshot of the fuzzed HTTP request, kept for reproduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Immutable snapshot of one finished test, retained for the run's duration
/// and consumed by the clustering engine and the report renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestSummary {
    /// Test identifier, e.g. "Test 42".
    pub id: String,
    pub path: String,
    pub method: String,
    pub status_code: u16,
    /// Machine key of the verdict reason; clustering groups by this.
    pub result_reason: String,
    /// Response body as observed.
    #[serde(default)]
    pub body: String,
    pub error: bool,
    pub warning: bool,
    /// What the playbook did, in prose.
    #[serde(default)]
    pub scenario: String,
    /// What the playbook expected back, in prose.
    #[serde(default)]
    pub expected: String,
    /// Human-readable verdict message.
    #[serde(default)]
    pub result_details: String,
    /// The fuzzed request, for reproduction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSnapshot>,
}
