//! Body normalization and similarity measures used by the clustering pass.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Placeholder substituted for identifier-looking tokens.
const ID_PLACEHOLDER: &str = "{id}";

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .expect("valid uuid regex")
});

static LONG_HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{16,}\b").expect("valid hex regex"));

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid number regex"));

/// Replace identifier-looking tokens (UUIDs, long hex ids, numbers, quoted
/// or not) with a placeholder, so messages differing only in an embedded
/// identifier normalize to the same template.
#[must_use]
pub fn normalize_identifiers(body: &str) -> String {
    let pass = UUID_RE.replace_all(body, ID_PLACEHOLDER);
    let pass = LONG_HEX_RE.replace_all(&pass, ID_PLACEHOLDER);
    NUMBER_RE.replace_all(&pass, ID_PLACEHOLDER).into_owned()
}

/// Token-level Jaccard similarity between two normalized bodies.
///
/// Cheap gate only: tokens are whitespace-split, the result is
/// |intersection| / |union|. Two empty strings count as identical.
#[must_use]
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

/// The authoritative similarity predicate, only consulted when the Jaccard
/// gate is met.
#[must_use]
pub fn structurally_similar(a: &str, b: &str, threshold: f64) -> bool {
    strsim::normalized_levenshtein(a, b) >= threshold
}
