//! The verdict engine: per-test lifecycle, the classification decision
//! table, statistics, and create/delete chaining bookkeeping.
//!
//! One test flows Started → InProgress → Classified → Finalized. The engine
//! allocates a correlation id per case, the playbook attaches scenario and
//! request/response details through the [`CaseHandle`], exactly one
//! classification produces a [`Verdict`], and finalization persists the
//! summary. A panic or transport fault inside the test body becomes an
//! `unexpected_exception` error verdict; the run never aborts.

use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::family::ResponseCodeFamily;
use crate::model::{ContractExpectation, RequestSnapshot, ResponseView, TestSummary};
use crate::policy::IgnorePolicy;
use crate::stats::RunStats;
use crate::verdict::{Reason, Verdict, VerdictKind, leak, schema_match};
use crate::verdict::content_type;

/// Which optional checks a playbook requests for one classification.
#[derive(Debug, Clone, Copy)]
pub struct CheckOptions {
    pub check_schema: bool,
    pub check_content_type: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            check_schema: true,
            check_content_type: true,
        }
    }
}

/// Per-playbook configuration overrides, passed in explicitly so the engine
/// carries no global state.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides(HashMap<String, String>);

impl ConfigOverrides {
    #[must_use]
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self(entries)
    }

    /// Expected-code override for a playbook, keyed
    /// `"<playbook>.expected_response_code"`, as a comma-separated list of
    /// exactly-3-character codes.
    #[must_use]
    pub fn expected_codes(&self, playbook: &str) -> Option<ResponseCodeFamily> {
        self.0
            .get(&format!("{playbook}.expected_response_code"))
            .map(|codes| ResponseCodeFamily::from_codes(codes))
    }
}

/// A fault raised by a test body, converted into a verdict by the engine.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    /// Connection refused, timeout, broken pipe and friends.
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

/// In-flight state for one test execution, keyed by correlation id.
#[derive(Debug, Default)]
struct ActiveCase {
    method: String,
    path: String,
    playbook: String,
    scenario: String,
    expected: String,
    request: Option<RequestSnapshot>,
    response_code: u16,
    response_body: String,
}

#[derive(Debug, Default)]
struct EngineState {
    active: HashMap<u64, ActiveCase>,
    summaries: Vec<TestSummary>,
    stats: RunStats,
    /// Bodies of 2xx POST responses, stacked per path for later DELETEs.
    creations: HashMap<String, Vec<String>>,
}

/// Classifies responses and owns all per-run bookkeeping.
pub struct VerdictEngine {
    policy: IgnorePolicy,
    overrides: ConfigOverrides,
    leak_keywords: Vec<String>,
    open_fields: HashSet<String>,
    next_id: AtomicU64,
    state: Mutex<EngineState>,
}

impl VerdictEngine {
    #[must_use]
    pub fn new(
        policy: IgnorePolicy,
        overrides: ConfigOverrides,
        leak_keywords: Vec<String>,
        open_fields: HashSet<String>,
    ) -> Self {
        Self {
            policy,
            overrides,
            leak_keywords,
            open_fields,
            next_id: AtomicU64::new(1),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Build an engine from a loaded project config.
    #[must_use]
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.policy.clone(),
            ConfigOverrides::new(config.playbook_overrides.clone()),
            config.leak_keywords.clone(),
            config.open_fields.iter().cloned().collect(),
        )
    }

    #[must_use]
    pub fn policy(&self) -> &IgnorePolicy {
        &self.policy
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        // A poisoned lock only means a playbook panicked mid-update; the
        // bookkeeping remains usable and the run must go on.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a correlation id and open a case record.
    pub fn start_case(&self, method: &str, path: &str, playbook: &str) -> CaseHandle<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.state().active.insert(
            id,
            ActiveCase {
                method: method.to_uppercase(),
                path: path.to_string(),
                playbook: playbook.to_string(),
                ..Default::default()
            },
        );
        CaseHandle { engine: self, id }
    }

    /// Run one test body to completion.
    ///
    /// Whatever happens inside — a classified verdict, a transport error, or
    /// a panic — the case is finalized and the returned verdict reflects it.
    pub fn run_case<F>(&self, method: &str, path: &str, playbook: &str, body: F) -> Verdict
    where
        F: FnOnce(&CaseHandle<'_>) -> Result<Verdict, CaseError>,
    {
        let handle = self.start_case(method, path, playbook);
        let verdict = match catch_unwind(AssertUnwindSafe(|| body(&handle))) {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(CaseError::Transport(msg))) => {
                self.state().stats.record_io_error();
                Verdict::error(
                    Reason::UnexpectedException,
                    format!("unexpected exception: transport failure: {msg}"),
                )
            }
            Ok(Err(CaseError::Other(msg))) => Verdict::error(
                Reason::UnexpectedException,
                format!("unexpected exception: {msg}"),
            ),
            Err(payload) => Verdict::error(
                Reason::UnexpectedException,
                format!("unexpected exception: {}", panic_message(payload.as_ref())),
            ),
        };
        self.finalize(handle.id, &verdict);
        verdict
    }

    /// Classify one observed response against the contract.
    ///
    /// Pure with respect to engine state: all bookkeeping happens at
    /// finalization, so repeated calls with the same inputs yield the same
    /// verdict.
    #[must_use]
    pub fn classify(
        &self,
        response: &ResponseView,
        expectation: &ContractExpectation,
        expected_family: &ResponseCodeFamily,
        opts: &CheckOptions,
        playbook: &str,
    ) -> Verdict {
        let family = self
            .overrides
            .expected_codes(playbook)
            .unwrap_or_else(|| expected_family.clone());
        let code = response.code();

        let matches_schema = !opts.check_schema
            || schema_match::matches(response, expectation, &self.open_fields);
        let code_expected = family.matches(&code);
        let code_documented = expectation.covers_code(&code)
            || schema_match::NOT_NECESSARILY_DOCUMENTED.contains(&response.status_code)
            || expectation.covers_range(&code);
        let matches_content_type = !opts.check_content_type
            || content_type::matches_declared(expectation, &code, response.content_type.as_deref());
        let unimplemented = response.status_code == 501;

        let verdict = self.decide(
            response,
            &code,
            matches_schema,
            code_expected,
            code_documented,
            matches_content_type,
            unimplemented,
        );
        let verdict = self.apply_overrides(verdict, response);
        let verdict = self.apply_ignore_policy(verdict, response);

        tracing::debug!(
            code = %code,
            reason = %verdict.reason,
            kind = ?verdict.kind,
            playbook,
            "classified response"
        );
        verdict
    }

    /// The decision table. First matching row wins.
    #[allow(clippy::too_many_arguments)]
    fn decide(
        &self,
        response: &ResponseView,
        code: &str,
        matches_schema: bool,
        code_expected: bool,
        code_documented: bool,
        matches_content_type: bool,
        unimplemented: bool,
    ) -> Verdict {
        if !matches_content_type && !self.policy.skip_content_type_check {
            let got = response.content_type.as_deref().unwrap_or("<none>");
            return Verdict::warning(
                Reason::ContentTypeMismatch,
                format!("response content type [{got}] not matching the contract"),
            );
        }
        if matches_schema && code_documented && code_expected {
            return Verdict::success();
        }
        if !matches_schema && code_documented && code_expected {
            let message =
                format!("documented response code {code}, but body does not match the contract");
            return if self.policy.skip_body_check {
                Verdict::ignored_success(Reason::SchemaMismatch, message)
            } else {
                Verdict::warning(Reason::SchemaMismatch, message)
            };
        }
        if code_expected && !code_documented {
            let message = format!("expected response code {code} is not documented in the contract");
            return if self.policy.skip_undocumented_check {
                Verdict::ignored_success(Reason::UndocumentedExpectedCode, message)
            } else {
                Verdict::warning(Reason::UndocumentedExpectedCode, message)
            };
        }
        if code_documented && !code_expected && response.status_code == 404 {
            return Verdict::error(Reason::NotFound, "resource not found: 404".to_string());
        }
        if code_documented && !code_expected && unimplemented {
            return Verdict::warning(
                Reason::NotImplemented,
                "operation not implemented: 501".to_string(),
            );
        }
        if code_documented && !code_expected {
            return Verdict::error(
                Reason::DocumentedUnexpectedCode,
                format!("unexpected response code {code}: documented, but not expected here"),
            );
        }
        if response.status_code == 404 {
            return Verdict::error(Reason::NotFound, "resource not found: 404".to_string());
        }
        Verdict::error(
            Reason::UnexpectedBehaviour,
            format!("unexpected behaviour: response code {code} neither expected nor documented"),
        )
    }

    /// The two cross-cutting overrides: error-details leaks trump any
    /// would-be success or warning, and slow successes become errors.
    fn apply_overrides(&self, verdict: Verdict, response: &ResponseView) -> Verdict {
        let verdict = if !self.policy.skip_leak_check
            && matches!(verdict.kind, VerdictKind::Success | VerdictKind::Warning)
        {
            let leaks = leak::scan(&response.body, &self.leak_keywords);
            if leaks.is_empty() {
                verdict
            } else {
                Verdict::error(
                    Reason::ErrorLeakDetected,
                    format!("error-details leak detected: [{}]", leaks.join(", ")),
                )
            }
        } else {
            verdict
        };

        if self.policy.max_response_time_ms > 0
            && response.latency_ms > self.policy.max_response_time_ms
            && verdict.kind == VerdictKind::Success
            && !self.policy.is_ignored_response(response)
        {
            return Verdict::error(
                Reason::ResponseTimeExceeded,
                format!(
                    "response took {}ms, exceeding the maximum of {}ms",
                    response.latency_ms, self.policy.max_response_time_ms
                ),
            );
        }
        verdict
    }

    /// Operator reclassification, applied uniformly after the table.
    fn apply_ignore_policy(&self, verdict: Verdict, response: &ResponseView) -> Verdict {
        match verdict.kind {
            VerdictKind::Warning | VerdictKind::Error
                if self.policy.is_ignored_response(response) =>
            {
                if self.policy.hide_ignored_matches {
                    verdict.into_skipped()
                } else {
                    verdict.into_ignored()
                }
            }
            VerdictKind::Warning if self.policy.hide_warnings => verdict.into_skipped(),
            VerdictKind::Success if self.policy.hide_success => verdict.into_skipped(),
            _ => verdict,
        }
    }

    /// Persist the summary, bump counters, release the correlation id.
    fn finalize(&self, id: u64, verdict: &Verdict) {
        let mut state = self.state();
        let case = state.active.remove(&id).unwrap_or_default();

        state
            .stats
            .record(verdict.kind, &case.path, case.response_code);

        // Create/delete chaining: remember what a POST made, forget what a
        // DELETE removed. Pure bookkeeping for chained playbooks.
        let two_xx = (200..300).contains(&case.response_code);
        if two_xx && case.method == "POST" {
            state
                .creations
                .entry(case.path.clone())
                .or_default()
                .push(case.response_body.clone());
        } else if two_xx && case.method == "DELETE" {
            let parent = parent_path(&case.path);
            if let Some(stack) = state.creations.get_mut(parent) {
                stack.pop();
            }
        }

        state.summaries.push(TestSummary {
            id: format!("Test {id}"),
            path: case.path,
            method: case.method,
            status_code: case.response_code,
            result_reason: verdict.reason.key().to_string(),
            body: case.response_body,
            error: verdict.is_error(),
            warning: verdict.is_warning(),
            scenario: case.scenario,
            expected: case.expected,
            result_details: verdict.message.clone(),
            request: case.request,
        });
    }

    /// Most recent 2xx POST response body recorded for `path`, if any.
    #[must_use]
    pub fn last_created(&self, path: &str) -> Option<String> {
        self.state()
            .creations
            .get(path)
            .and_then(|stack| stack.last().cloned())
    }

    /// Snapshot of the accumulated summaries.
    #[must_use]
    pub fn summaries(&self) -> Vec<TestSummary> {
        self.state().summaries.clone()
    }

    /// Snapshot of the run counters.
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.state().stats.clone()
    }

    /// Consume the engine at run end.
    #[must_use]
    pub fn into_results(self) -> (Vec<TestSummary>, RunStats) {
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        (state.summaries, state.stats)
    }
}

/// Capability surface handed to a running test body. Playbooks depend on
/// this, never the other way around.
pub struct CaseHandle<'a> {
    engine: &'a VerdictEngine,
    id: u64,
}

impl CaseHandle<'_> {
    pub fn scenario(&self, text: impl Into<String>) {
        if let Some(case) = self.engine.state().active.get_mut(&self.id) {
            case.scenario = text.into();
        }
    }

    pub fn expected(&self, text: impl Into<String>) {
        if let Some(case) = self.engine.state().active.get_mut(&self.id) {
            case.expected = text.into();
        }
    }

    pub fn record_request(&self, request: RequestSnapshot) {
        if let Some(case) = self.engine.state().active.get_mut(&self.id) {
            case.request = Some(request);
        }
    }

    /// Classify the observed response; also attaches it to the case record.
    #[must_use]
    pub fn classify(
        &self,
        response: &ResponseView,
        expectation: &ContractExpectation,
        expected_family: &ResponseCodeFamily,
        opts: &CheckOptions,
    ) -> Verdict {
        let playbook = {
            let mut state = self.engine.state();
            if let Some(case) = state.active.get_mut(&self.id) {
                case.response_code = response.status_code;
                case.response_body = response.body.clone();
                case.playbook.clone()
            } else {
                String::new()
            }
        };
        self.engine
            .classify(response, expectation, expected_family, opts, &playbook)
    }

    #[must_use]
    pub fn report_error(&self, reason: Reason, message: impl Into<String>) -> Verdict {
        Verdict::error(reason, message)
    }

    #[must_use]
    pub fn report_warn(&self, reason: Reason, message: impl Into<String>) -> Verdict {
        let verdict = Verdict::warning(reason, message);
        if self.engine.policy.hide_warnings {
            verdict.into_skipped()
        } else {
            verdict
        }
    }

    #[must_use]
    pub fn report_info(&self, message: impl Into<String>) -> Verdict {
        let verdict = Verdict {
            kind: VerdictKind::Success,
            reason: Reason::MatchesContract,
            message: message.into(),
            ignored: false,
        };
        if self.engine.policy.hide_success {
            verdict.into_skipped()
        } else {
            verdict
        }
    }

    /// Exclude this test from the report (playbook not applicable here).
    #[must_use]
    pub fn skip(&self, message: impl Into<String>) -> Verdict {
        Verdict {
            kind: VerdictKind::SkippedReporting,
            reason: Reason::MatchesContract,
            message: message.into(),
            ignored: false,
        }
    }

    /// Most recent 2xx POST response body recorded for `path`.
    #[must_use]
    pub fn last_created(&self, path: &str) -> Option<String> {
        self.engine.last_created(path)
    }
}

/// "/users/{id}" → "/users"; single-segment paths keep the root.
fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> VerdictEngine {
        VerdictEngine::new(
            IgnorePolicy::default(),
            ConfigOverrides::default(),
            Vec::new(),
            HashSet::new(),
        )
    }

    fn engine_with_policy(policy: IgnorePolicy) -> VerdictEngine {
        VerdictEngine::new(policy, ConfigOverrides::default(), Vec::new(), HashSet::new())
    }

    fn expectation(codes: &[&str]) -> ContractExpectation {
        let mut exp = ContractExpectation::default();
        for code in codes {
            exp.documented_codes.insert((*code).to_string());
        }
        exp
    }

    fn classify(
        engine: &VerdictEngine,
        response: &ResponseView,
        exp: &ContractExpectation,
        family: &ResponseCodeFamily,
    ) -> Verdict {
        engine.classify(response, exp, family, &CheckOptions::default(), "test_playbook")
    }

    // ── decision table oracle, one test per row ──

    #[test]
    fn row1_content_type_mismatch_wins_over_everything() {
        let eng = engine();
        let mut exp = expectation(&["200"]);
        exp.documented_content_types
            .insert("200".to_string(), vec!["application/json".to_string()]);
        let resp = ResponseView::new(200, "{}", Some("text/html".to_string()), 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Warning);
        assert_eq!(v.reason, Reason::ContentTypeMismatch);
    }

    #[test]
    fn row2_documented_expected_matching_is_success() {
        let eng = engine();
        let mut exp = expectation(&["200"]);
        exp.documented_bodies
            .insert("200".to_string(), vec![r#"{"id": 1, "name": "x"}"#.to_string()]);
        let resp = ResponseView::new(
            200,
            r#"{"id": 5, "name": "n"}"#,
            Some("application/json".to_string()),
            10,
        );
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Success);
        assert_eq!(v.reason, Reason::MatchesContract);
    }

    #[test]
    fn row3_schema_mismatch_is_warning() {
        let eng = engine();
        let mut exp = expectation(&["200"]);
        exp.documented_bodies
            .insert("200".to_string(), vec![r#"{"id": 1}"#.to_string()]);
        let resp = ResponseView::new(200, r#"{"surprise": true}"#, None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Warning);
        assert_eq!(v.reason, Reason::SchemaMismatch);
    }

    #[test]
    fn row3_downgrades_when_body_check_ignored() {
        let eng = engine_with_policy(IgnorePolicy {
            skip_body_check: true,
            ..Default::default()
        });
        let mut exp = expectation(&["200"]);
        exp.documented_bodies
            .insert("200".to_string(), vec![r#"{"id": 1}"#.to_string()]);
        let resp = ResponseView::new(200, r#"{"surprise": true}"#, None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Success);
        assert!(v.ignored);
        assert_eq!(v.reason, Reason::SchemaMismatch);
    }

    #[test]
    fn row4_expected_but_undocumented_is_warning() {
        // Scenario B: 400 expected (4xx family), only 200 documented
        let eng = engine();
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(400, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::FourXx);
        assert_eq!(v.kind, VerdictKind::Warning);
        assert_eq!(v.reason, Reason::UndocumentedExpectedCode);
    }

    #[test]
    fn row4_downgrades_when_undocumented_check_ignored() {
        let eng = engine_with_policy(IgnorePolicy {
            skip_undocumented_check: true,
            ..Default::default()
        });
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(400, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::FourXx);
        assert_eq!(v.kind, VerdictKind::Success);
        assert!(v.ignored);
    }

    #[test]
    fn row5_documented_unexpected_404_is_not_found() {
        let eng = engine();
        let exp = expectation(&["404"]);
        let resp = ResponseView::new(404, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Error);
        assert_eq!(v.reason, Reason::NotFound);
    }

    #[test]
    fn row6_unexpected_501_is_not_implemented_warning() {
        let eng = engine();
        let exp = expectation(&[]);
        // 501 is always in the not-necessarily-documented set
        let resp = ResponseView::new(501, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Warning);
        assert_eq!(v.reason, Reason::NotImplemented);
    }

    #[test]
    fn row7_documented_unexpected_code_is_error() {
        let eng = engine();
        let exp = expectation(&["500"]);
        let resp = ResponseView::new(500, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Error);
        assert_eq!(v.reason, Reason::DocumentedUnexpectedCode);
    }

    #[test]
    fn row8_undocumented_unexpected_404_is_not_found() {
        let eng = engine();
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(404, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Error);
        assert_eq!(v.reason, Reason::NotFound);
    }

    #[test]
    fn row9_anything_else_is_unexpected_behaviour() {
        let eng = engine();
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(500, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Error);
        assert_eq!(v.reason, Reason::UnexpectedBehaviour);
    }

    #[test]
    fn expected_404_against_other_documented_codes_is_undocumented_warning() {
        // Scenario E: 404 with documented {401} and 4xx expected hits the
        // expected-but-undocumented row before the hard not-found rules.
        let eng = engine();
        let exp = expectation(&["401"]);
        let resp = ResponseView::new(404, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::FourXx);
        assert_eq!(v.kind, VerdictKind::Warning);
        assert_eq!(v.reason, Reason::UndocumentedExpectedCode);
    }

    #[test]
    fn range_documented_code_counts_as_documented() {
        let eng = engine();
        let exp = expectation(&["4XX"]);
        let resp = ResponseView::new(422, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::FourXx);
        assert_eq!(v.kind, VerdictKind::Success);
    }

    #[test]
    fn classification_is_deterministic() {
        let eng = engine();
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(400, "nope", None, 1);
        let first = classify(&eng, &resp, &exp, &ResponseCodeFamily::FourXx);
        for _ in 0..10 {
            assert_eq!(classify(&eng, &resp, &exp, &ResponseCodeFamily::FourXx), first);
        }
    }

    // ── cross-cutting overrides ──

    #[test]
    fn leak_override_turns_success_into_error() {
        let eng = VerdictEngine::new(
            IgnorePolicy::default(),
            ConfigOverrides::default(),
            vec!["NullPointerException".to_string()],
            HashSet::new(),
        );
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(200, "ok but NullPointerException inside", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Error);
        assert_eq!(v.reason, Reason::ErrorLeakDetected);
        assert!(v.message.contains("NullPointerException"));
    }

    #[test]
    fn leak_override_disabled_by_policy() {
        let eng = VerdictEngine::new(
            IgnorePolicy {
                skip_leak_check: true,
                ..Default::default()
            },
            ConfigOverrides::default(),
            vec!["NullPointerException".to_string()],
            HashSet::new(),
        );
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(200, "NullPointerException", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Success);
    }

    #[test]
    fn slow_success_becomes_response_time_error() {
        let eng = engine_with_policy(IgnorePolicy {
            max_response_time_ms: 100,
            ..Default::default()
        });
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(200, "", None, 250);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Error);
        assert_eq!(v.reason, Reason::ResponseTimeExceeded);
    }

    #[test]
    fn slow_ignored_response_keeps_its_verdict() {
        let eng = engine_with_policy(IgnorePolicy {
            max_response_time_ms: 100,
            ignored_codes: vec!["200".to_string()],
            ..Default::default()
        });
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(200, "", None, 250);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Success);
    }

    // ── ignore policy reclassification ──

    #[test]
    fn hidden_warnings_become_skipped() {
        let eng = engine_with_policy(IgnorePolicy {
            hide_warnings: true,
            ..Default::default()
        });
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(400, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::FourXx);
        assert_eq!(v.kind, VerdictKind::SkippedReporting);
        assert_eq!(v.reason, Reason::UndocumentedExpectedCode);
    }

    #[test]
    fn hidden_success_becomes_skipped() {
        let eng = engine_with_policy(IgnorePolicy {
            hide_success: true,
            ..Default::default()
        });
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(200, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::SkippedReporting);
    }

    #[test]
    fn ignored_code_downgrades_error_to_success() {
        let eng = engine_with_policy(IgnorePolicy {
            ignored_codes: vec!["500".to_string()],
            ..Default::default()
        });
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(500, "boom", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Success);
        assert!(v.ignored);
        assert_eq!(v.reason, Reason::UnexpectedBehaviour);
    }

    #[test]
    fn ignored_code_with_hidden_matches_is_skipped() {
        let eng = engine_with_policy(IgnorePolicy {
            ignored_codes: vec!["500".to_string()],
            hide_ignored_matches: true,
            ..Default::default()
        });
        let exp = expectation(&["200"]);
        let resp = ResponseView::new(500, "boom", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::SkippedReporting);
    }

    // ── per-playbook overrides ──

    #[test]
    fn override_replaces_the_expected_family() {
        let mut entries = HashMap::new();
        entries.insert(
            "test_playbook.expected_response_code".to_string(),
            "418".to_string(),
        );
        let eng = VerdictEngine::new(
            IgnorePolicy::default(),
            ConfigOverrides::new(entries),
            Vec::new(),
            HashSet::new(),
        );
        let exp = expectation(&["418"]);
        let resp = ResponseView::new(418, "", None, 1);
        // Caller says 2xx, config says 418 for this playbook
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Success);
    }

    #[test]
    fn override_only_applies_to_named_playbook() {
        let mut entries = HashMap::new();
        entries.insert(
            "other_playbook.expected_response_code".to_string(),
            "418".to_string(),
        );
        let eng = VerdictEngine::new(
            IgnorePolicy::default(),
            ConfigOverrides::new(entries),
            Vec::new(),
            HashSet::new(),
        );
        let exp = expectation(&["418"]);
        let resp = ResponseView::new(418, "", None, 1);
        let v = classify(&eng, &resp, &exp, &ResponseCodeFamily::TwoXx);
        assert_eq!(v.kind, VerdictKind::Error);
    }

    // ── lifecycle ──

    #[test]
    fn run_case_finalizes_a_classified_verdict() {
        let eng = engine();
        let exp = expectation(&["200"]);
        let verdict = eng.run_case("get", "/users", "test_playbook", |case| {
            case.scenario("send a valid request");
            let resp = ResponseView::new(200, "", Some("application/json".to_string()), 5);
            Ok(case.classify(&resp, &exp, &ResponseCodeFamily::TwoXx, &CheckOptions::default()))
        });
        assert_eq!(verdict.kind, VerdictKind::Success);

        let summaries = eng.summaries();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.method, "GET");
        assert_eq!(summary.path, "/users");
        assert_eq!(summary.status_code, 200);
        assert_eq!(summary.result_reason, "matches_contract");
        assert_eq!(summary.scenario, "send a valid request");
        assert!(!summary.error);
        assert!(!summary.warning);

        assert_eq!(eng.stats().success, 1);
    }

    #[test]
    fn run_case_converts_panics_into_exception_verdicts() {
        let eng = engine();
        let verdict = eng.run_case("GET", "/users", "test_playbook", |_case| {
            panic!("playbook exploded");
        });
        assert_eq!(verdict.kind, VerdictKind::Error);
        assert_eq!(verdict.reason, Reason::UnexpectedException);
        assert!(verdict.message.contains("playbook exploded"));

        // The lifecycle still reached Finalized
        let summaries = eng.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].result_reason, "unexpected_exception");
        assert_eq!(eng.stats().errors, 1);
    }

    #[test]
    fn run_case_counts_transport_faults_as_io_errors() {
        let eng = engine();
        let verdict = eng.run_case("GET", "/users", "test_playbook", |_case| {
            Err(CaseError::Transport("connection refused".to_string()))
        });
        assert_eq!(verdict.reason, Reason::UnexpectedException);
        let stats = eng.stats();
        assert_eq!(stats.io_errors, 1);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn post_then_delete_chains_through_the_creation_stack() {
        let eng = engine();
        let exp = expectation(&["201", "204"]);

        let _ = eng.run_case("POST", "/users", "test_playbook", |case| {
            let resp = ResponseView::new(201, r#"{"id": 42}"#, None, 5);
            Ok(case.classify(&resp, &exp, &ResponseCodeFamily::TwoXx, &CheckOptions::default()))
        });
        assert_eq!(eng.last_created("/users").as_deref(), Some(r#"{"id": 42}"#));

        let _ = eng.run_case("DELETE", "/users/42", "test_playbook", |case| {
            let resp = ResponseView::new(204, "", None, 5);
            Ok(case.classify(&resp, &exp, &ResponseCodeFamily::TwoXx, &CheckOptions::default()))
        });
        assert_eq!(eng.last_created("/users"), None);
    }

    #[test]
    fn failed_delete_leaves_the_stack_alone() {
        let eng = engine();
        let exp = expectation(&["201"]);
        let _ = eng.run_case("POST", "/users", "test_playbook", |case| {
            let resp = ResponseView::new(201, r#"{"id": 1}"#, None, 5);
            Ok(case.classify(&resp, &exp, &ResponseCodeFamily::TwoXx, &CheckOptions::default()))
        });
        let _ = eng.run_case("DELETE", "/users/1", "test_playbook", |case| {
            let resp = ResponseView::new(500, "", None, 5);
            Ok(case.classify(&resp, &exp, &ResponseCodeFamily::TwoXx, &CheckOptions::default()))
        });
        assert!(eng.last_created("/users").is_some());
    }

    #[test]
    fn concurrent_cases_do_not_interfere() {
        let eng = std::sync::Arc::new(engine());
        let exp = std::sync::Arc::new(expectation(&["200"]));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let eng = eng.clone();
                let exp = exp.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let _ = eng.run_case("GET", &format!("/path{i}"), "test_playbook", |case| {
                            let resp = ResponseView::new(200, "", None, 1);
                            Ok(case.classify(
                                &resp,
                                &exp,
                                &ResponseCodeFamily::TwoXx,
                                &CheckOptions::default(),
                            ))
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = eng.stats();
        assert_eq!(stats.success, 200);
        assert_eq!(eng.summaries().len(), 200);
    }

    #[test]
    fn parent_path_strips_last_segment() {
        assert_eq!(parent_path("/users/42"), "/users");
        assert_eq!(parent_path("/users"), "/");
        assert_eq!(parent_path("plain"), "/");
    }
}
