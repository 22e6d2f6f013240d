//! Core types for taskscope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity of a registry model, `owner/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    /// Account that owns the model
    pub owner: String,

    /// Model name within the owner's namespace
    pub name: String,
}

impl ModelKey {
    /// Create a new model key
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name`
    pub fn parse(key: &str) -> Option<Self> {
        let (owner, name) = key.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One declared input parameter of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    /// Parameter name
    pub name: String,

    /// Human-readable description, if the registry has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON schema type, if declared
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Output schema of a model
///
/// Registries either wrap the output in an object schema with a
/// `properties` mapping, or publish a single schema fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "schema", rename_all = "snake_case")]
pub enum OutputSchema {
    /// Object schema; only the `properties` mapping is kept
    Properties(Map<String, Value>),

    /// Any other schema fragment, kept whole
    Fragment(Value),
}

impl OutputSchema {
    /// Classify a raw schema fragment by shape
    pub fn from_fragment(fragment: Value) -> Self {
        match fragment {
            Value::Object(mut object) => match object.remove("properties") {
                Some(Value::Object(properties)) => Self::Properties(properties),
                Some(other) => {
                    object.insert("properties".to_string(), other);
                    Self::Fragment(Value::Object(object))
                }
                None => Self::Fragment(Value::Object(object)),
            },
            other => Self::Fragment(other),
        }
    }
}

/// Descriptor of a third-party model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Owner and name
    #[serde(flatten)]
    pub key: ModelKey,

    /// Free-text description
    pub description: Option<String>,

    /// Declared input parameters, in registry order
    #[serde(default)]
    pub input_schema: Vec<InputField>,

    /// Output schema, when the registry publishes one
    pub output_schema: Option<OutputSchema>,
}

impl ModelDescriptor {
    /// Create a descriptor with no schemas
    pub fn new(key: ModelKey, description: impl Into<String>) -> Self {
        Self {
            key,
            description: Some(description.into()),
            input_schema: Vec::new(),
            output_schema: None,
        }
    }
}

/// A recorded input/output pair for a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelExample {
    /// Inputs the prediction was run with
    #[serde(default)]
    pub input: Map<String, Value>,

    /// Whatever the model returned
    #[serde(default)]
    pub output: Value,
}

/// Structured judgment about a model, produced by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Short natural-language description
    pub summary: String,

    /// Coarse input modalities, e.g. "text", "image"
    pub input_types: Vec<String>,

    /// Coarse output modalities
    pub output_types: Vec<String>,

    /// Task name from the recognized taxonomy
    pub task: String,

    /// Summary of `task`, looked up from the taxonomy after parsing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_summary: Option<String>,

    /// Example use cases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cases: Option<Vec<String>>,

    /// Free-form categories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

/// Persisted classification keyed by `owner/name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// `owner/name`
    pub model_key: String,

    /// The stored classification
    pub classification: ClassificationResult,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// Last modification; equal to `created_at` since entries are never updated
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create a fresh entry timestamped now
    pub fn new(model_key: impl Into<String>, classification: ClassificationResult) -> Self {
        let now = Utc::now();
        Self {
            model_key: model_key.into(),
            classification,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_key_roundtrip() {
        let key = ModelKey::parse("acme/upscaler").unwrap();
        assert_eq!(key.owner, "acme");
        assert_eq!(key.name, "upscaler");
        assert_eq!(key.to_string(), "acme/upscaler");

        assert!(ModelKey::parse("acme").is_none());
        assert!(ModelKey::parse("/upscaler").is_none());
        assert!(ModelKey::parse("acme/up/scaler").is_none());
    }

    #[test]
    fn test_output_schema_shapes() {
        let object = OutputSchema::from_fragment(json!({
            "type": "object",
            "properties": {"image": {"type": "string", "format": "uri"}}
        }));
        match object {
            OutputSchema::Properties(props) => assert!(props.contains_key("image")),
            other => panic!("expected properties, got {:?}", other),
        }

        let array = OutputSchema::from_fragment(json!({
            "type": "array",
            "items": {"type": "string"}
        }));
        assert!(matches!(array, OutputSchema::Fragment(_)));

        // A non-object `properties` value is not a mapping; keep the fragment intact
        let odd = OutputSchema::from_fragment(json!({"properties": "nope"}));
        assert_eq!(odd, OutputSchema::Fragment(json!({"properties": "nope"})));
    }

    #[test]
    fn test_classification_parses_llm_shape() {
        let raw = r#"{"summary":"upscales images","inputTypes":["image"],"outputTypes":["image"],"task":"image-to-image"}"#;
        let parsed: ClassificationResult = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.task, "image-to-image");
        assert!(parsed.task_summary.is_none());
        assert!(parsed.use_cases.is_none());

        let out = serde_json::to_value(&parsed).unwrap();
        assert!(out.get("taskSummary").is_none());
        assert_eq!(out["inputTypes"], json!(["image"]));
    }
}
