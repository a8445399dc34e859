//! Project configuration for contract fuzzing

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::policy::IgnorePolicy;

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAPI contract path (local file)
    pub spec: PathBuf,

    /// Base URL of the server to test
    pub base_url: String,

    /// HTTP headers (Auth, API keys, etc.)
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Path parameters (entity IDs, etc.)
    #[serde(default)]
    pub path_params: HashMap<String, String>,

    /// Ignore policy: what to filter, hide, or stop checking
    #[serde(default)]
    pub policy: IgnorePolicy,

    /// Keywords whose presence in a response body counts as an
    /// error-details leak
    #[serde(default)]
    pub leak_keywords: Vec<String>,

    /// Field names whose objects accept undeclared properties
    #[serde(default)]
    pub open_fields: Vec<String>,

    /// Per-playbook overrides, e.g.
    /// `"remove_fields.expected_response_code" = "200,400"`
    #[serde(default)]
    pub playbook_overrides: HashMap<String, String>,

    /// Cases per playbook and operation (fuzzed-field variants are cycled)
    #[serde(default = "default_cases_per_playbook")]
    pub cases_per_playbook: u32,
}

fn default_cases_per_playbook() -> u32 {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: PathBuf::from("openapi.yaml"),
            base_url: "http://localhost:8080".to_string(),
            headers: HashMap::new(),
            path_params: HashMap::new(),
            policy: IgnorePolicy::default(),
            leak_keywords: default_leak_keywords(),
            open_fields: Vec::new(),
            playbook_overrides: HashMap::new(),
            cases_per_playbook: default_cases_per_playbook(),
        }
    }
}

/// Keywords that commonly leak implementation details into error bodies.
fn default_leak_keywords() -> Vec<String> {
    [
        "Exception",
        "stack trace",
        "stacktrace",
        "Traceback",
        "ORA-",
        "SQLSTATE",
        "panicked at",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.contrafuzz.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".contrafuzz.toml", ".contrafuzz.json", "contrafuzz.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        // No config file, return default
        Ok(Self::default())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# contrafuzz configuration

# OpenAPI contract (local file path)
spec = "openapi.yaml"

# Server to test
base_url = "http://localhost:8080"

# Keywords counted as error-details leaks
# leak_keywords = ["Exception", "stack trace"]

# Object fields that accept undeclared properties
# open_fields = ["metadata"]

# HTTP headers (auth, api keys)
[headers]
Authorization = "Bearer your-token-here"
# X-API-Key = "your-api-key"

# Path parameters (entity IDs for testing)
[path_params]
user_id = "1"
# order_id = "100"

# Ignore policy
[policy]
# ignored_codes = ["404", "5XX"]
# ignored_body_terms = ["maintenance mode"]
# hide_warnings = false
# hide_success = false
# hide_ignored_matches = false
# skip_body_check = false
# skip_undocumented_check = false
# skip_content_type_check = false
# skip_leak_check = false
# max_response_time_ms = 0

# Per-playbook expected-code overrides
[playbook_overrides]
# "remove_fields.expected_response_code" = "200,400"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
