//! Media-type equivalence, tolerant of vendor suffixes and parameters.

use crate::model::ContractExpectation;

/// Sentinel for missing or unparsable media types.
const UNKNOWN: &str = "unknown";

/// Compare two media-type strings for equivalence.
///
/// Parameters are ignored. Two types are equivalent when either side is a
/// wildcard for the other, or both share the top-level type and one subtype
/// is a suffix of the other ("vnd.api+json" vs "json"). Symmetric.
#[must_use]
pub fn equivalent(a: &str, b: &str) -> bool {
    let (type_a, sub_a) = parse(a);
    let (type_b, sub_b) = parse(b);

    let type_ok = type_a == "*" || type_b == "*" || type_a == type_b;
    if !type_ok {
        return false;
    }
    sub_a == "*" || sub_b == "*" || sub_a == sub_b || sub_a.ends_with(&sub_b) || sub_b.ends_with(&sub_a)
}

/// `"application/json; charset=utf-8"` → `("application", "json")`.
/// Unparsable input degrades to the unknown sentinel on both halves.
fn parse(media: &str) -> (String, String) {
    let essence = media.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.split_once('/') {
        Some((t, s)) if !t.is_empty() && !s.is_empty() => (t.to_string(), s.to_string()),
        _ => (UNKNOWN.to_string(), UNKNOWN.to_string()),
    }
}

/// Check the declared response content type against the contract.
///
/// No documented types for this code means nothing to check. Documented
/// types with no declared header is a mismatch, except that "nothing
/// documented and nothing declared" passes.
#[must_use]
pub fn matches_declared(
    expectation: &ContractExpectation,
    code: &str,
    declared: Option<&str>,
) -> bool {
    let documented = expectation.content_types_for(code);
    if documented.is_empty() {
        return true;
    }
    match declared {
        Some(actual) => documented.iter().any(|d| equivalent(d, actual)),
        None => false,
    }
}
