//! Drives the playbook set against the target service and funnels every
//! observed response through the verdict engine.

use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::SmallRng;

use contrafuzz_core::{
    CaseError, CheckOptions, Config, ReasonGroup, RequestSnapshot, ResponseView, RunStats,
    TestSummary, VerdictEngine, cluster,
};

use crate::contract::{self, Operation};
use crate::playbooks::{Mutation, Playbook, default_playbooks};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Contract(#[from] contract::ContractError),
    #[error("HTTP client error: {0}")]
    Http(String),
    #[error("No operations found in the contract")]
    NoOperations,
}

/// Everything the run produced, ready for rendering.
#[derive(Debug)]
pub struct RunOutcome {
    pub summaries: Vec<TestSummary>,
    pub stats: RunStats,
    /// Clustered failures, one group per verdict reason.
    pub report: Vec<ReasonGroup>,
}

/// Blocking fuzz runner over one loaded config.
pub struct FuzzRunner {
    config: Config,
    playbooks: Vec<Box<dyn Playbook>>,
}

impl FuzzRunner {
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            playbooks: default_playbooks(),
        }
    }

    #[must_use]
    pub fn with_playbooks(mut self, playbooks: Vec<Box<dyn Playbook>>) -> Self {
        self.playbooks = playbooks;
        self
    }

    /// Run every playbook against every operation in the contract.
    ///
    /// # Errors
    ///
    /// Fails when the contract cannot be loaded or contains no operations.
    /// Individual request faults never abort the run; the engine turns them
    /// into error verdicts.
    pub fn run(&self) -> Result<RunOutcome, RunnerError> {
        let spec = contract::load_spec(&self.config.spec)?;
        let operations = contract::extract_operations(&spec);
        if operations.is_empty() {
            return Err(RunnerError::NoOperations);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| RunnerError::Http(e.to_string()))?;

        let engine = VerdictEngine::from_config(&self.config);
        let mut rng = SmallRng::from_entropy();
        let limit = self.config.cases_per_playbook as usize;

        eprintln!(
            "Fuzzing {} operations with {} playbooks...",
            operations.len(),
            self.playbooks.len()
        );

        for op in &operations {
            let mut op_total = 0u32;
            let mut op_errors = 0u32;

            for playbook in &self.playbooks {
                let family = playbook.expected_family();
                for mutation in playbook.mutations(op, &mut rng).into_iter().take(limit) {
                    let verdict = engine.run_case(&op.method, &op.path, playbook.name(), |case| {
                        case.scenario(mutation.scenario.clone());
                        case.expected(format!("response code in {family}"));

                        let (request, response) = self.send(&client, op, &mutation)?;
                        case.record_request(request);

                        let view = match &mutation.fuzzed_field {
                            Some(field) => response.with_fuzzed_field(field.clone()),
                            None => response,
                        };
                        Ok(case.classify(
                            &view,
                            &op.expectation,
                            &family,
                            &CheckOptions::default(),
                        ))
                    });
                    op_total += 1;
                    if verdict.is_error() {
                        op_errors += 1;
                    }
                }
            }

            if op_errors > 0 {
                eprintln!("  {}: {op_errors}/{op_total} errors", op.label());
            } else {
                eprintln!("  {}: OK ({op_total} cases)", op.label());
            }
        }

        let (summaries, stats) = engine.into_results();
        let report = cluster(&summaries);
        Ok(RunOutcome {
            summaries,
            stats,
            report,
        })
    }

    /// Build, send, and snapshot one request.
    fn send(
        &self,
        client: &reqwest::blocking::Client,
        op: &Operation,
        mutation: &Mutation,
    ) -> Result<(RequestSnapshot, ResponseView), CaseError> {
        let url = self.build_url(op);
        let method = reqwest::Method::from_bytes(op.method.as_bytes())
            .map_err(|_| CaseError::Other(format!("invalid HTTP method '{}'", op.method)))?;

        let mut req = client.request(method, &url);
        for (k, v) in &self.config.headers {
            req = req.header(k, v);
        }
        if let Some(body) = &mutation.body {
            req = req.header("Content-Type", "application/json");
            req = req.json(body);
        }

        let snapshot = RequestSnapshot {
            method: op.method.clone(),
            url: url.clone(),
            headers: self.config.headers.clone(),
            body: mutation.body.as_ref().map(ToString::to_string),
        };

        tracing::debug!(url = %url, method = %op.method, "sending fuzzed request");
        let start = Instant::now();
        let resp = req.send().map_err(|e| CaseError::Transport(e.to_string()))?;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = truncate_utf8(resp.text().unwrap_or_default(), 4096);

        Ok((
            snapshot,
            ResponseView::new(status, body, content_type, latency_ms),
        ))
    }

    fn build_url(&self, op: &Operation) -> String {
        let mut path = op.path.clone();
        for name in &op.path_params {
            let value = self
                .config
                .path_params
                .get(name)
                .cloned()
                .unwrap_or_else(|| "1".to_string());
            path = path.replace(&format!("{{{name}}}"), &value);
        }
        format!("{}{}", self.config.base_url, path)
    }
}

/// Truncate on a char boundary; oversized bodies keep a length marker.
fn truncate_utf8(text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…({} bytes total)", &text[..end], text.len())
}
