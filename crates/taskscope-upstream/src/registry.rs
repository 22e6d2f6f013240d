//! Model registry client
//!
//! Fetches a model's descriptor and its example predictions:
//! ```text
//! GET {base_url}/models/{owner}/{name}
//! GET {base_url}/models/{owner}/{name}/examples
//! ```
//! The registry's model JSON is loosely shaped; every nested field is
//! optional and checked before use.

use crate::{transport_error, with_bearer};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use taskscope_core::{
    Error, InputField, ModelDescriptor, ModelExample, ModelKey, OutputSchema, Result,
};
use tracing::{debug, warn};

/// Source of model metadata
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Fetch the descriptor and example predictions for a model
    async fn fetch(&self, key: &ModelKey) -> Result<(ModelDescriptor, Vec<ModelExample>)>;
}

/// Registry reached over HTTP
pub struct HttpModelRegistry {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpModelRegistry {
    /// Create a client for the registry at `base_url`
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &ModelKey, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = with_bearer(self.client.get(url), self.token.as_deref())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Registry returned {} for {}", status, url);
            return Err(Error::upstream(key.to_string(), status.as_u16()));
        }

        let body = response.text().await.map_err(transport_error)?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ModelRegistry for HttpModelRegistry {
    async fn fetch(&self, key: &ModelKey) -> Result<(ModelDescriptor, Vec<ModelExample>)> {
        let model_url = format!("{}/models/{}/{}", self.base_url, key.owner, key.name);
        let examples_url = format!("{}/examples", model_url);

        let (model, examples) = tokio::try_join!(
            self.get_json::<RawModel>(key, &model_url),
            self.get_json::<RawExamplePage>(key, &examples_url),
        )?;

        Ok((model.into_descriptor(key.clone()), examples.into_examples()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawModel {
    description: Option<String>,
    latest_version: Option<RawVersion>,
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    openapi_schema: Option<RawOpenApi>,
}

#[derive(Debug, Deserialize)]
struct RawOpenApi {
    components: Option<RawComponents>,
}

#[derive(Debug, Deserialize)]
struct RawComponents {
    schemas: Option<RawSchemas>,
}

#[derive(Debug, Deserialize)]
struct RawSchemas {
    #[serde(rename = "Input")]
    input: Option<RawInput>,
    #[serde(rename = "Output")]
    output: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    properties: Option<Map<String, Value>>,
}

impl RawModel {
    fn into_descriptor(self, key: ModelKey) -> ModelDescriptor {
        let schemas = self
            .latest_version
            .and_then(|v| v.openapi_schema)
            .and_then(|s| s.components)
            .and_then(|c| c.schemas);

        let (input, output) = match schemas {
            Some(schemas) => (schemas.input, schemas.output),
            None => (None, None),
        };

        let input_schema = input
            .and_then(|i| i.properties)
            .map(|properties| {
                properties
                    .into_iter()
                    .map(|(name, property)| InputField {
                        description: string_field(&property, "description"),
                        kind: string_field(&property, "type"),
                        name,
                    })
                    .collect()
            })
            .unwrap_or_default();

        ModelDescriptor {
            key,
            description: self.description,
            input_schema,
            output_schema: output.filter(|v| !v.is_null()).map(OutputSchema::from_fragment),
        }
    }
}

fn string_field(property: &Value, field: &str) -> Option<String> {
    property.get(field).and_then(Value::as_str).map(str::to_string)
}

#[derive(Debug, Default, Deserialize)]
struct RawExamplePage {
    #[serde(default)]
    results: Vec<RawPrediction>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    input: Option<Map<String, Value>>,
    #[serde(default)]
    output: Value,
}

impl RawExamplePage {
    fn into_examples(self) -> Vec<ModelExample> {
        self.results
            .into_iter()
            .map(|p| ModelExample {
                input: p.input.unwrap_or_default(),
                output: p.output,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_from_full_model() {
        let raw: RawModel = serde_json::from_value(json!({
            "name": "upscaler",
            "description": "upscales images",
            "latest_version": {
                "openapi_schema": {
                    "components": {
                        "schemas": {
                            "Input": {
                                "type": "object",
                                "properties": {
                                    "image": {"type": "string", "format": "uri", "description": "Input image"},
                                    "scale": {"type": "number", "description": "Factor to scale image by"},
                                    "face_enhance": {"description": "Run face enhancement"}
                                }
                            },
                            "Output": {"type": "string", "format": "uri"}
                        }
                    }
                }
            }
        }))
        .unwrap();

        let descriptor = raw.into_descriptor(ModelKey::new("acme", "upscaler"));
        assert_eq!(descriptor.description.as_deref(), Some("upscales images"));

        let names: Vec<&str> = descriptor.input_schema.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["image", "scale", "face_enhance"]);
        assert_eq!(descriptor.input_schema[1].kind.as_deref(), Some("number"));
        assert!(descriptor.input_schema[2].kind.is_none());

        assert_eq!(
            descriptor.output_schema,
            Some(OutputSchema::Fragment(json!({"type": "string", "format": "uri"})))
        );
    }

    #[test]
    fn test_descriptor_without_version() {
        let raw: RawModel = serde_json::from_value(json!({
            "description": "no versions yet",
            "latest_version": null
        }))
        .unwrap();

        let descriptor = raw.into_descriptor(ModelKey::new("acme", "draft"));
        assert!(descriptor.input_schema.is_empty());
        assert!(descriptor.output_schema.is_none());
    }

    #[test]
    fn test_examples_tolerate_missing_fields() {
        let page: RawExamplePage = serde_json::from_value(json!({
            "next": null,
            "results": [
                {"id": "p1", "input": {"prompt": "a cat"}, "output": ["https://example.com/1.png"]},
                {"id": "p2", "input": null}
            ]
        }))
        .unwrap();

        let examples = page.into_examples();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].input["prompt"], "a cat");
        assert!(examples[1].input.is_empty());
        assert!(examples[1].output.is_null());
    }
}
