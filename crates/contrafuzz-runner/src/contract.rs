//! OpenAPI contract extraction — per-operation expectations for the
//! verdict engine.

use std::path::Path;

use contrafuzz_core::ContractExpectation;

/// One fuzzable operation from the contract.
pub struct Operation {
    pub method: String,
    pub path: String,
    /// Names of `{placeholders}` in the path.
    pub path_params: Vec<String>,
    /// Resolved JSON schema of the request body, when one is declared.
    pub request_body_schema: Option<serde_json::Value>,
    /// What the contract documents for this operation.
    pub expectation: ContractExpectation,
}

impl Operation {
    /// "POST /api/users"
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Cannot read {0}: {1}")]
    Io(String, String),
    #[error("Cannot parse contract: {0}")]
    Parse(String),
}

/// Read and parse an OpenAPI document, JSON or YAML by extension.
pub fn load_spec(path: &Path) -> Result<serde_json::Value, ContractError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ContractError::Io(path.display().to_string(), e.to_string()))?;
    let is_yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if is_yaml {
        serde_yml::from_str(&content).map_err(|e| ContractError::Parse(e.to_string()))
    } else {
        serde_json::from_str(&content).map_err(|e| ContractError::Parse(e.to_string()))
    }
}

/// Walk the contract's paths and build one [`Operation`] per method.
#[must_use]
pub fn extract_operations(spec: &serde_json::Value) -> Vec<Operation> {
    let mut ops = Vec::new();
    let components = spec
        .get("components")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    let Some(paths) = spec.get("paths").and_then(|p| p.as_object()) else {
        return ops;
    };

    for (path, path_item) in paths {
        for method in &["get", "post", "put", "delete", "patch"] {
            let Some(operation) = path_item.get(*method) else {
                continue;
            };

            let request_body_schema = operation
                .get("requestBody")
                .and_then(|rb| rb.get("content"))
                .and_then(|c| c.get("application/json"))
                .and_then(|ct| ct.get("schema"))
                .map(|schema| resolve_refs(schema, &components));

            ops.push(Operation {
                method: method.to_uppercase(),
                path: path.clone(),
                path_params: placeholders(path),
                request_body_schema,
                expectation: extract_expectation(operation),
            });
        }
    }

    ops
}

/// Documented codes, example bodies, and content types for one operation.
fn extract_expectation(operation: &serde_json::Value) -> ContractExpectation {
    let mut expectation = ContractExpectation::default();

    let Some(responses) = operation.get("responses").and_then(|r| r.as_object()) else {
        return expectation;
    };

    for (code, response) in responses {
        // Codes are kept as contract strings: "200", "404", also "4XX"
        expectation.documented_codes.insert(code.clone());

        let Some(content) = response.get("content").and_then(|c| c.as_object()) else {
            continue;
        };

        let types: Vec<String> = content.keys().cloned().collect();
        if !types.is_empty() {
            expectation
                .documented_content_types
                .insert(code.clone(), types);
        }

        let mut bodies = Vec::new();
        for media in content.values() {
            collect_examples(media, &mut bodies);
        }
        if !bodies.is_empty() {
            expectation.documented_bodies.insert(code.clone(), bodies);
        }
    }

    expectation
}

/// Pull `example` and `examples` values out of a media-type object, plus the
/// schema's declared properties as a last-resort pseudo-example.
fn collect_examples(media: &serde_json::Value, out: &mut Vec<String>) {
    if let Some(example) = media.get("example") {
        if let Ok(text) = serde_json::to_string(example) {
            out.push(text);
        }
    }
    if let Some(examples) = media.get("examples").and_then(|e| e.as_object()) {
        for named in examples.values() {
            let value = named.get("value").unwrap_or(named);
            if let Ok(text) = serde_json::to_string(value) {
                out.push(text);
            }
        }
    }
    if out.is_empty() {
        // No explicit example: the schema's property names still constrain
        // the body shape for the heuristic check.
        if let Some(schema) = media.get("schema") {
            let mut names = Vec::new();
            collect_property_names(schema, &mut names);
            if !names.is_empty() {
                out.push(format!("{{{}}}", names.join(", ")));
            }
        }
    }
}

fn collect_property_names(schema: &serde_json::Value, out: &mut Vec<String>) {
    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, child) in props {
            out.push(format!("\"{name}\""));
            collect_property_names(child, out);
        }
    }
    if let Some(items) = schema.get("items") {
        collect_property_names(items, out);
    }
}

/// "{name}" placeholders in a path template.
fn placeholders(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        names.push(rest[start + 1..start + end].to_string());
        rest = &rest[start + end + 1..];
    }
    names
}

/// Recursively resolve `$ref` against OpenAPI components.
///
/// Depth-limited to keep circular references from recursing forever.
pub fn resolve_refs(schema: &serde_json::Value, components: &serde_json::Value) -> serde_json::Value {
    resolve_refs_inner(schema, components, 0)
}

fn resolve_refs_inner(
    schema: &serde_json::Value,
    components: &serde_json::Value,
    depth: u32,
) -> serde_json::Value {
    if depth > 20 {
        return schema.clone();
    }
    match schema {
        serde_json::Value::Object(obj) => {
            if let Some(ref_str) = obj.get("$ref").and_then(|v| v.as_str()) {
                if let Some(resolved) = lookup_ref(ref_str, components) {
                    return resolve_refs_inner(&resolved, components, depth + 1);
                }
                return schema.clone();
            }
            let new_obj: serde_json::Map<String, serde_json::Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), resolve_refs_inner(v, components, depth + 1)))
                .collect();
            serde_json::Value::Object(new_obj)
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(
            arr.iter()
                .map(|v| resolve_refs_inner(v, components, depth + 1))
                .collect(),
        ),
        _ => schema.clone(),
    }
}

/// "#/components/schemas/User" → the schema under components.
fn lookup_ref(ref_str: &str, components: &serde_json::Value) -> Option<serde_json::Value> {
    let name = ref_str.strip_prefix("#/components/schemas/")?;
    components.get("schemas")?.get(name).cloned()
}
