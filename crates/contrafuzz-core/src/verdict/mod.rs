//! Verdict types and the classification engine.

mod content_type;
mod engine;
mod leak;
mod schema_match;

pub use content_type::equivalent;
pub use engine::{CaseError, CaseHandle, CheckOptions, ConfigOverrides, VerdictEngine};
pub use leak::scan as scan_for_leaks;
pub use schema_match::NOT_NECESSARILY_DOCUMENTED;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome class of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Success,
    Warning,
    Error,
    /// Excluded from the report at the operator's request.
    SkippedReporting,
}

/// Short machine key explaining a verdict; this is what failure clustering
/// groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    MatchesContract,
    ContentTypeMismatch,
    SchemaMismatch,
    UndocumentedExpectedCode,
    DocumentedUnexpectedCode,
    NotFound,
    NotImplemented,
    UnexpectedBehaviour,
    ErrorLeakDetected,
    ResponseTimeExceeded,
    UnexpectedException,
}

impl Reason {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::MatchesContract => "matches_contract",
            Self::ContentTypeMismatch => "content_type_mismatch",
            Self::SchemaMismatch => "schema_mismatch",
            Self::UndocumentedExpectedCode => "undocumented_expected_code",
            Self::DocumentedUnexpectedCode => "documented_unexpected_code",
            Self::NotFound => "not_found",
            Self::NotImplemented => "not_implemented",
            Self::UnexpectedBehaviour => "unexpected_behaviour",
            Self::ErrorLeakDetected => "error_leak_detected",
            Self::ResponseTimeExceeded => "response_time_exceeded",
            Self::UnexpectedException => "unexpected_exception",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// The classified outcome of one test execution.
///
/// Created once per test by the engine, converted into statistics and a
/// [`crate::model::TestSummary`], never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub reason: Reason,
    pub message: String,
    /// The outcome was downgraded because it matched the ignore filters.
    pub ignored: bool,
}

impl Verdict {
    #[must_use]
    pub fn success() -> Self {
        Self {
            kind: VerdictKind::Success,
            reason: Reason::MatchesContract,
            message: "response matches expected result".to_string(),
            ignored: false,
        }
    }

    #[must_use]
    pub fn warning(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            kind: VerdictKind::Warning,
            reason,
            message: message.into(),
            ignored: false,
        }
    }

    #[must_use]
    pub fn error(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            kind: VerdictKind::Error,
            reason,
            message: message.into(),
            ignored: false,
        }
    }

    /// A warning downgraded to success because the operator filtered it.
    #[must_use]
    pub fn ignored_success(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            kind: VerdictKind::Success,
            reason,
            message: message.into(),
            ignored: true,
        }
    }

    /// Reclassify this verdict as hidden from the report.
    #[must_use]
    pub fn into_skipped(mut self) -> Self {
        self.kind = VerdictKind::SkippedReporting;
        self
    }

    /// Downgrade to an ignored success, keeping the original reason.
    #[must_use]
    pub fn into_ignored(mut self) -> Self {
        self.kind = VerdictKind::Success;
        self.ignored = true;
        self.message.push_str(" (matched ignore filters)");
        self
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.kind, VerdictKind::Error)
    }

    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self.kind, VerdictKind::Warning)
    }
}
