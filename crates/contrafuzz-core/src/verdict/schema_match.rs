//! Heuristic structural check of a response body against documented example
//! bodies. Deliberately not a JSON-Schema validator: keys are matched as
//! case-insensitive substrings of the documented examples, which tolerates
//! formatting drift the way downstream report semantics expect.

use std::collections::HashSet;

use serde_json::Value;

use crate::model::{ContractExpectation, ResponseView};
use crate::verdict::content_type;

/// Codes a service may return without the contract documenting them.
pub const NOT_NECESSARILY_DOCUMENTED: [u16; 6] = [406, 413, 414, 415, 431, 501];

/// Media types whose bodies cannot be meaningfully checked against JSON
/// examples.
const UNVERIFIABLE_CONTENT_TYPES: &[&str] =
    &["text/csv", "application/pdf", "application/octet-stream"];

/// Whether the response body structurally matches the documented examples
/// for its status code (or the code's range token).
///
/// Trivially true when there is nothing to check: no parsed JSON, blank or
/// empty payloads, inherently unverifiable content types, codes from the
/// not-necessarily-documented set, or a contract that documents no example
/// for this code.
#[must_use]
pub fn matches(
    response: &ResponseView,
    expectation: &ContractExpectation,
    open_fields: &HashSet<String>,
) -> bool {
    let Some(json) = &response.json else {
        return true;
    };
    if response.is_blank() {
        return true;
    }
    if NOT_NECESSARILY_DOCUMENTED.contains(&response.status_code) {
        return true;
    }
    if let Some(ct) = &response.content_type {
        if UNVERIFIABLE_CONTENT_TYPES
            .iter()
            .any(|u| content_type::equivalent(u, ct))
        {
            return true;
        }
    }

    let examples = expectation.bodies_for(&response.code());

    let trimmed = response.body.trim();
    if trimmed == "{}" || trimmed == "[]" {
        return true;
    }
    if let Value::Array(items) = json {
        if items.is_empty() {
            // An empty array only matches array-shaped documentation, unless
            // the contract documents nothing for this code at all.
            return examples.is_empty()
                || examples.iter().any(|e| e.trim_start().starts_with('['));
        }
    }
    if examples.is_empty() {
        return true;
    }

    // Arrays are compared through their first element.
    let actual = match json {
        Value::Array(items) => &items[0],
        other => other,
    };

    let matched = examples.iter().any(|example| {
        let example_lc = example.to_lowercase();
        value_satisfied("", actual, &example_lc, open_fields)
    });
    if !matched {
        return false;
    }

    // A 4xx body that matches the generic error shape but never mentions the
    // mutated field suggests the service did not validate that field.
    if (400..500).contains(&response.status_code) {
        if let Some(field) = &response.fuzzed_field {
            let needle = normalize_token(field);
            if !needle.is_empty() && !normalize_token(&response.body).contains(&needle) {
                return false;
            }
        }
    }
    true
}

/// Recursive key walk. `name` is the enclosing object's field name; an
/// object registered as open accepts its children unchecked.
fn value_satisfied(name: &str, value: &Value, example_lc: &str, open: &HashSet<String>) -> bool {
    match value {
        Value::Object(map) => {
            if !name.is_empty() && open.contains(name) {
                return true;
            }
            map.iter().all(|(key, child)| {
                example_lc.contains(&key.to_lowercase())
                    && value_satisfied(key, child, example_lc, open)
            })
        }
        Value::Array(items) => items
            .first()
            .is_none_or(|first| value_satisfied(name, first, example_lc, open)),
        _ => true,
    }
}

/// Strip separators and case so "user_name" and "userName" compare equal.
fn normalize_token(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expectation_with(code: &str, examples: &[&str]) -> ContractExpectation {
        let mut exp = ContractExpectation::default();
        exp.documented_bodies.insert(
            code.to_string(),
            examples.iter().map(ToString::to_string).collect(),
        );
        exp
    }

    fn no_open() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn trivially_true_for_empty_payloads() {
        let exp = expectation_with("200", &[r#"{"id": 1, "name": "x"}"#]);
        for body in ["", "   ", "{}", "[]"] {
            let view = ResponseView::new(200, body, None, 1);
            assert!(matches(&view, &exp, &no_open()), "body {body:?}");
        }
    }

    #[test]
    fn trivially_true_without_parsed_json() {
        let exp = expectation_with("200", &[r#"{"id": 1}"#]);
        let view = ResponseView::new(200, "plain text, not json", None, 1);
        assert!(matches(&view, &exp, &no_open()));
    }

    #[test]
    fn trivially_true_for_not_necessarily_documented_codes() {
        let exp = expectation_with("415", &[r#"{"totally": "different"}"#]);
        let view = ResponseView::new(415, r#"{"unrelated": true}"#, None, 1);
        assert!(matches(&view, &exp, &no_open()));
    }

    #[test]
    fn trivially_true_for_unverifiable_content_types() {
        let exp = expectation_with("200", &[r#"{"id": 1}"#]);
        let view = ResponseView::new(
            200,
            r#"{"weird": true}"#,
            Some("text/csv".to_string()),
            1,
        );
        assert!(matches(&view, &exp, &no_open()));
    }

    #[test]
    fn trivially_true_when_nothing_documented() {
        let exp = ContractExpectation::default();
        let view = ResponseView::new(200, r#"{"anything": 1}"#, None, 1);
        assert!(matches(&view, &exp, &no_open()));
    }

    #[test]
    fn matching_keys_succeed() {
        let exp = expectation_with("200", &[r#"{"id": 7, "name": "alice", "email": "a@b"}"#]);
        let view = ResponseView::new(200, r#"{"id": 99, "name": "bob"}"#, None, 1);
        assert!(matches(&view, &exp, &no_open()));
    }

    #[test]
    fn unknown_key_fails() {
        let exp = expectation_with("200", &[r#"{"id": 7}"#]);
        let view = ResponseView::new(200, r#"{"surprise": true}"#, None, 1);
        assert!(!matches(&view, &exp, &no_open()));
    }

    #[test]
    fn key_match_is_case_insensitive() {
        let exp = expectation_with("200", &[r#"{"userId": 7}"#]);
        let view = ResponseView::new(200, r#"{"userid": 1}"#, None, 1);
        assert!(matches(&view, &exp, &no_open()));
    }

    #[test]
    fn nested_objects_recurse() {
        let exp = expectation_with("200", &[r#"{"user": {"id": 1, "name": "x"}}"#]);
        let ok = ResponseView::new(200, r#"{"user": {"id": 5}}"#, None, 1);
        assert!(matches(&ok, &exp, &no_open()));

        let bad = ResponseView::new(200, r#"{"user": {"password": "leak"}}"#, None, 1);
        assert!(!matches(&bad, &exp, &no_open()));
    }

    #[test]
    fn open_field_accepts_any_children() {
        let exp = expectation_with("200", &[r#"{"metadata": {}}"#]);
        let mut open = HashSet::new();
        open.insert("metadata".to_string());
        let view = ResponseView::new(200, r#"{"metadata": {"anything": "goes"}}"#, None, 1);
        assert!(matches(&view, &exp, &open));
        assert!(!matches(&view, &exp, &no_open()));
    }

    #[test]
    fn array_body_compared_through_first_element() {
        let exp = expectation_with("200", &[r#"[{"id": 1, "name": "x"}]"#]);
        let view = ResponseView::new(200, r#"[{"id": 3}, {"other": 1}]"#, None, 1);
        assert!(matches(&view, &exp, &no_open()));
    }

    #[test]
    fn literal_empty_array_is_trivially_true() {
        let object_doc = expectation_with("200", &[r#"{"id": 1}"#]);
        let view = ResponseView::new(200, "[]", None, 1);
        assert!(matches(&view, &object_doc, &no_open()));
    }

    #[test]
    fn spaced_empty_array_needs_array_shaped_documentation() {
        let array_doc = expectation_with("200", &[r#"[{"id": 1}]"#]);
        let object_doc = expectation_with("200", &[r#"{"id": 1}"#]);
        let view = ResponseView::new(200, "[ ]", None, 1);
        assert!(matches(&view, &array_doc, &no_open()));
        assert!(!matches(&view, &object_doc, &no_open()));
    }

    #[test]
    fn error_response_must_mention_fuzzed_field() {
        let exp = expectation_with("400", &[r#"{"error": "validation failed"}"#]);
        let mentioning = ResponseView::new(
            400,
            r#"{"error": "invalid value for user_name"}"#,
            None,
            1,
        )
        .with_fuzzed_field("userName");
        assert!(matches(&mentioning, &exp, &no_open()));

        let silent = ResponseView::new(400, r#"{"error": "bad request"}"#, None, 1)
            .with_fuzzed_field("userName");
        assert!(!matches(&silent, &exp, &no_open()));
    }

    #[test]
    fn fuzzed_field_constraint_only_applies_to_4xx() {
        let exp = expectation_with("200", &[r#"{"id": 1}"#]);
        let view = ResponseView::new(200, r#"{"id": 1}"#, None, 1).with_fuzzed_field("userName");
        assert!(matches(&view, &exp, &no_open()));
    }

    #[test]
    fn range_keyed_examples_are_used() {
        let exp = expectation_with("4XX", &[r#"{"error": "e", "field": "f"}"#]);
        let view = ResponseView::new(422, r#"{"error": "nope"}"#, None, 1);
        assert!(matches(&view, &exp, &no_open()));
    }
}
