//! Mutation playbooks — each one fuzzes request fields a particular way and
//! declares which response-code family it expects back.

use rand::Rng;
use rand::rngs::SmallRng;
use serde_json::{Map, Value, json};

use contrafuzz_core::ResponseCodeFamily;

use crate::contract::Operation;

/// One fuzzed request variant produced by a playbook.
pub struct Mutation {
    pub body: Option<Value>,
    /// Qualified name of the targeted field, when one was singled out.
    pub fuzzed_field: Option<String>,
    pub scenario: String,
}

/// A mutation strategy. Playbooks depend on the engine's capability surface,
/// never the other way around.
pub trait Playbook: Send + Sync {
    fn name(&self) -> &'static str;
    fn expected_family(&self) -> ResponseCodeFamily;
    fn mutations(&self, op: &Operation, rng: &mut SmallRng) -> Vec<Mutation>;
}

/// The built-in playbook set.
#[must_use]
pub fn default_playbooks() -> Vec<Box<dyn Playbook>> {
    vec![
        Box::new(HappyPath),
        Box::new(RemoveFields),
        Box::new(NullValues),
        Box::new(EmptyStrings),
        Box::new(VeryLargeStrings),
        Box::new(BoundaryIntegers),
    ]
}

/// Spec-compliant input; the service should accept it.
pub struct HappyPath;

impl Playbook for HappyPath {
    fn name(&self) -> &'static str {
        "happy_path"
    }

    fn expected_family(&self) -> ResponseCodeFamily {
        ResponseCodeFamily::TwoXx
    }

    fn mutations(&self, op: &Operation, rng: &mut SmallRng) -> Vec<Mutation> {
        let body = op
            .request_body_schema
            .as_ref()
            .map(|schema| sample_value(schema, rng));
        vec![Mutation {
            body,
            fuzzed_field: None,
            scenario: "send a request with valid values for all fields".to_string(),
        }]
    }
}

/// Drop one field at a time.
pub struct RemoveFields;

impl Playbook for RemoveFields {
    fn name(&self) -> &'static str {
        "remove_fields"
    }

    fn expected_family(&self) -> ResponseCodeFamily {
        ResponseCodeFamily::FourXxTwoXx
    }

    fn mutations(&self, op: &Operation, rng: &mut SmallRng) -> Vec<Mutation> {
        each_field(op, rng, |field, body, _schema| {
            body.remove(field);
            Some(format!("send a request without the '{field}' field"))
        })
    }
}

/// Null out one field at a time.
pub struct NullValues;

impl Playbook for NullValues {
    fn name(&self) -> &'static str {
        "null_values"
    }

    fn expected_family(&self) -> ResponseCodeFamily {
        ResponseCodeFamily::FourXxTwoXx
    }

    fn mutations(&self, op: &Operation, rng: &mut SmallRng) -> Vec<Mutation> {
        each_field(op, rng, |field, body, _schema| {
            body.insert(field.to_string(), Value::Null);
            Some(format!("send a request with null in the '{field}' field"))
        })
    }
}

/// Empty out one string field at a time.
pub struct EmptyStrings;

impl Playbook for EmptyStrings {
    fn name(&self) -> &'static str {
        "empty_strings"
    }

    fn expected_family(&self) -> ResponseCodeFamily {
        ResponseCodeFamily::FourXxTwoXx
    }

    fn mutations(&self, op: &Operation, rng: &mut SmallRng) -> Vec<Mutation> {
        each_field(op, rng, |field, body, schema| {
            if !is_string_field(schema, field) {
                return None;
            }
            body.insert(field.to_string(), json!(""));
            Some(format!("send a request with an empty '{field}' field"))
        })
    }
}

/// Oversized string payloads; a robust service rejects them.
pub struct VeryLargeStrings;

impl Playbook for VeryLargeStrings {
    fn name(&self) -> &'static str {
        "large_strings"
    }

    fn expected_family(&self) -> ResponseCodeFamily {
        ResponseCodeFamily::FourXx
    }

    fn mutations(&self, op: &Operation, rng: &mut SmallRng) -> Vec<Mutation> {
        each_field(op, rng, |field, body, schema| {
            if !is_string_field(schema, field) {
                return None;
            }
            body.insert(field.to_string(), json!("a".repeat(10_000)));
            Some(format!(
                "send a request with 10000 characters in the '{field}' field"
            ))
        })
    }
}

/// Extreme integers at both ends of the range.
pub struct BoundaryIntegers;

impl Playbook for BoundaryIntegers {
    fn name(&self) -> &'static str {
        "boundary_integers"
    }

    fn expected_family(&self) -> ResponseCodeFamily {
        ResponseCodeFamily::FourXxTwoXx
    }

    fn mutations(&self, op: &Operation, rng: &mut SmallRng) -> Vec<Mutation> {
        let Some(props) = body_properties(op) else {
            return Vec::new();
        };
        let mut mutations = Vec::new();
        for (field, prop) in props {
            let ty = prop.get("type").and_then(Value::as_str).unwrap_or("");
            if ty != "integer" && ty != "number" {
                continue;
            }
            for extreme in [json!(i64::MAX), json!(-1)] {
                let mut body = sample_object(op, rng);
                body.insert(field.clone(), extreme.clone());
                mutations.push(Mutation {
                    body: Some(Value::Object(body)),
                    fuzzed_field: Some(field.clone()),
                    scenario: format!(
                        "send a request with {extreme} in the '{field}' field"
                    ),
                });
            }
        }
        mutations
    }
}

/// Generate one mutation per body field via `mutate`, which edits a valid
/// body in place and returns the scenario text (or `None` to skip).
fn each_field<F>(op: &Operation, rng: &mut SmallRng, mutate: F) -> Vec<Mutation>
where
    F: Fn(&str, &mut Map<String, Value>, &Value) -> Option<String>,
{
    let Some(schema) = op.request_body_schema.as_ref() else {
        return Vec::new();
    };
    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut mutations = Vec::new();
    for field in props.keys() {
        let mut body = sample_object(op, rng);
        if let Some(scenario) = mutate(field, &mut body, schema) {
            mutations.push(Mutation {
                body: Some(Value::Object(body)),
                fuzzed_field: Some(field.clone()),
                scenario,
            });
        }
    }
    mutations
}

fn body_properties(op: &Operation) -> Option<&Map<String, Value>> {
    op.request_body_schema
        .as_ref()?
        .get("properties")?
        .as_object()
}

fn is_string_field(schema: &Value, field: &str) -> bool {
    schema
        .get("properties")
        .and_then(|p| p.get(field))
        .and_then(|p| p.get("type"))
        .and_then(Value::as_str)
        == Some("string")
}

/// Valid request body as a mutable object (empty when none is declared).
fn sample_object(op: &Operation, rng: &mut SmallRng) -> Map<String, Value> {
    match op.request_body_schema.as_ref().map(|s| sample_value(s, rng)) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Generate a schema-conforming value. Compact on purpose: enough variety
/// to exercise services, not a full generator.
pub fn sample_value(schema: &Value, rng: &mut SmallRng) -> Value {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        if !values.is_empty() {
            return values[rng.gen_range(0..values.len())].clone();
        }
    }

    match schema.get("type").and_then(Value::as_str).unwrap_or("object") {
        "string" => sample_string(schema, rng),
        "integer" => {
            let min = schema.get("minimum").and_then(Value::as_i64).unwrap_or(1);
            let max = schema.get("maximum").and_then(Value::as_i64).unwrap_or(min + 100);
            json!(rng.gen_range(min..=max.max(min)))
        }
        "number" => json!(rng.gen_range(1.0..100.0)),
        "boolean" => json!(rng.r#gen::<bool>()),
        "array" => {
            let item = schema
                .get("items")
                .map(|items| sample_value(items, rng))
                .unwrap_or(Value::Null);
            json!([item])
        }
        _ => {
            let mut obj = Map::new();
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (name, prop) in props {
                    obj.insert(name.clone(), sample_value(prop, rng));
                }
            }
            Value::Object(obj)
        }
    }
}

fn sample_string(schema: &Value, rng: &mut SmallRng) -> Value {
    match schema.get("format").and_then(Value::as_str) {
        Some("email") => json!("fuzz@example.com"),
        Some("uuid") => json!("00000000-0000-4000-8000-000000000000"),
        Some("date") => json!("2024-01-15"),
        Some("date-time") => json!("2024-01-15T10:30:00Z"),
        _ => {
            let len = schema
                .get("minLength")
                .and_then(Value::as_u64)
                .unwrap_or(6)
                .max(1);
            let text: String = (0..len)
                .map(|_| (b'a' + rng.gen_range(0..26u8)) as char)
                .collect();
            json!(text)
        }
    }
}
