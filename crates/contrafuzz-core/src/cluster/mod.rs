//! Failure clustering: group per-test summaries by verdict reason, then by
//! response-body similarity, so a reviewer sees a handful of buckets instead
//! of thousands of near-identical failures.
//!
//! The algorithm is greedy, single-pass, and order-dependent by design —
//! throughput over minimal bucket count. Once created, a bucket's
//! representative bodies never change and buckets are never merged.

mod similarity;

pub use similarity::{normalize_identifiers, structurally_similar, token_jaccard};

use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::TestSummary;

/// Label for the dedicated bucket that collects blank bodies.
pub const EMPTY_BODY_SENTINEL: &str = "<empty response body>";

/// Tuning knobs for the clustering pass.
#[derive(Debug, Clone, Copy)]
pub struct ClusterOptions {
    /// Minimum token-Jaccard similarity before the expensive check runs.
    pub jaccard_gate: f64,
    /// Threshold for the authoritative similarity predicate.
    pub similarity_threshold: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            jaccard_gate: 0.7,
            similarity_threshold: 0.82,
        }
    }
}

/// Test identifiers of one bucket, grouped by request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PathGroup {
    pub path: String,
    /// Member test identifiers in encounter order, comma-separated for the
    /// renderer to turn into links.
    pub test_cases: String,
}

/// A cluster of same-reason failures sharing a near-identical body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Bucket {
    pub bucket_id: usize,
    /// First member's body, or the empty-body sentinel.
    pub error_message: String,
    /// Display color, "#rrggbb".
    pub border_color: String,
    pub paths: Vec<PathGroup>,
}

/// All buckets for one verdict reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReasonGroup {
    pub result_reason: String,
    /// "error" when any member is an error, otherwise "warning".
    pub status: String,
    /// Number of filtered summaries with this reason.
    pub total_tests: usize,
    pub buckets: Vec<Bucket>,
}

/// Cluster the run's summaries with default options and an entropy-seeded
/// color source.
#[must_use]
pub fn cluster(summaries: &[TestSummary]) -> Vec<ReasonGroup> {
    cluster_with(
        summaries,
        ClusterOptions::default(),
        &mut SmallRng::from_entropy(),
    )
}

/// Cluster with explicit options and color source.
///
/// Never fails: malformed summaries with blank bodies land in the empty
/// bucket of their reason group.
#[must_use]
pub fn cluster_with(
    summaries: &[TestSummary],
    options: ClusterOptions,
    rng: &mut impl Rng,
) -> Vec<ReasonGroup> {
    // Group by reason, keeping each group's members in input order — the
    // per-group pass is order-dependent, so input order is part of the
    // contract here.
    let mut reasons: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&TestSummary>> = HashMap::new();
    for summary in summaries.iter().filter(|s| eligible(s)) {
        let reason = summary.result_reason.as_str();
        if !groups.contains_key(reason) {
            reasons.push(reason);
        }
        groups.entry(reason).or_default().push(summary);
    }
    // Stable ordering for deterministic output
    reasons.sort_unstable();

    let mut report = Vec::with_capacity(reasons.len());
    let mut next_bucket_id = 1;
    for reason in reasons {
        let members = &groups[reason];
        let status = if members.iter().any(|s| s.error) {
            "error"
        } else {
            "warning"
        };

        let buckets = cluster_group(members, options)
            .into_iter()
            .map(|proto| {
                let bucket_id = next_bucket_id;
                next_bucket_id += 1;
                Bucket {
                    bucket_id,
                    error_message: if proto.empty {
                        EMPTY_BODY_SENTINEL.to_string()
                    } else {
                        proto.members[0].body.clone()
                    },
                    border_color: border_color(rng),
                    paths: group_paths(&proto.members),
                }
            })
            .collect();

        report.push(ReasonGroup {
            result_reason: reason.to_string(),
            status: status.to_string(),
            total_tests: members.len(),
            buckets,
        });
    }
    report
}

/// Only non-2xx outcomes flagged error or warning, with a usable reason,
/// participate in clustering.
fn eligible(summary: &TestSummary) -> bool {
    let code = summary.status_code;
    (code < 200 || code >= 300)
        && (summary.error || summary.warning)
        && !summary.result_reason.trim().is_empty()
}

struct ProtoBucket<'a> {
    /// Raw representative: the first body assigned to this bucket.
    raw: &'a str,
    /// Normalized representative, fixed at creation.
    norm: String,
    members: Vec<&'a TestSummary>,
    empty: bool,
}

/// The greedy pass over one reason group, sequential and in input order.
fn cluster_group<'a>(
    members: &[&'a TestSummary],
    options: ClusterOptions,
) -> Vec<ProtoBucket<'a>> {
    let mut buckets: Vec<ProtoBucket<'a>> = Vec::new();
    let mut empty_idx: Option<usize> = None;
    // O(1) assignment for exact repeats of a seen raw or normalized body.
    let mut raw_cache: HashMap<&'a str, usize> = HashMap::new();
    let mut norm_cache: HashMap<String, usize> = HashMap::new();
    // Normalization is computed once per distinct raw body.
    let mut norm_memo: HashMap<&'a str, String> = HashMap::new();

    for &summary in members {
        if summary.body.trim().is_empty() {
            let idx = *empty_idx.get_or_insert_with(|| {
                buckets.push(ProtoBucket {
                    raw: "",
                    norm: String::new(),
                    members: Vec::new(),
                    empty: true,
                });
                buckets.len() - 1
            });
            buckets[idx].members.push(summary);
            continue;
        }

        let raw = summary.body.as_str();
        if let Some(&idx) = raw_cache.get(raw) {
            buckets[idx].members.push(summary);
            continue;
        }

        let norm = norm_memo
            .entry(raw)
            .or_insert_with(|| similarity::normalize_identifiers(raw))
            .clone();
        if let Some(&idx) = norm_cache.get(&norm) {
            buckets[idx].members.push(summary);
            raw_cache.insert(raw, idx);
            continue;
        }

        // Backward-looking scan over buckets in creation order.
        let mut assigned = None;
        for (idx, bucket) in buckets.iter().enumerate() {
            if bucket.empty {
                continue;
            }
            if bucket.raw == raw {
                assigned = Some(idx);
                break;
            }
            if similarity::token_jaccard(&bucket.norm, &norm) >= options.jaccard_gate
                && similarity::structurally_similar(
                    &bucket.norm,
                    &norm,
                    options.similarity_threshold,
                )
            {
                assigned = Some(idx);
                break;
            }
        }

        match assigned {
            Some(idx) => {
                buckets[idx].members.push(summary);
                raw_cache.insert(raw, idx);
                norm_cache.insert(norm, idx);
            }
            None => {
                buckets.push(ProtoBucket {
                    raw,
                    norm: norm.clone(),
                    members: vec![summary],
                    empty: false,
                });
                let idx = buckets.len() - 1;
                raw_cache.insert(raw, idx);
                norm_cache.insert(norm, idx);
            }
        }
    }
    buckets
}

/// Members grouped by path in encounter order, ids joined for the renderer.
fn group_paths(members: &[&TestSummary]) -> Vec<PathGroup> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_path: HashMap<&str, Vec<&str>> = HashMap::new();
    for member in members {
        let path = member.path.as_str();
        if !by_path.contains_key(path) {
            order.push(path);
        }
        by_path.entry(path).or_default().push(member.id.as_str());
    }
    order
        .into_iter()
        .map(|path| PathGroup {
            path: path.to_string(),
            test_cases: by_path[path].join(", "),
        })
        .collect()
}

/// Mid-range pseudo-random color so both light and dark report themes can
/// render the border.
fn border_color(rng: &mut impl Rng) -> String {
    format!(
        "#{:02x}{:02x}{:02x}",
        rng.gen_range(0x20..0xe0u16),
        rng.gen_range(0x20..0xe0u16),
        rng.gen_range(0x20..0xe0u16)
    )
}

/// JSON Schema for the cluster report, exported by the CLI.
#[must_use]
pub fn report_schema() -> String {
    let schema = schemars::schema_for!(Vec<ReasonGroup>);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}
