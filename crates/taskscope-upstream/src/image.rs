//! Image generation through the model registry
//!
//! Runs a prediction against a fixed text-to-image model and waits for it
//! synchronously:
//! ```text
//! POST {base_url}/models/{owner}/{name}/predictions
//! Prefer: wait
//! {"input": {"prompt": "...", "image_format": "webp"}}
//! ```

use crate::{transport_error, with_bearer};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use taskscope_core::{Error, ModelKey, Result};
use tracing::{debug, warn};

/// Anything that turns a text prompt into an image URL
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image and return the URL of the first output
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generates images by running a registry model
pub struct RegistryImageGenerator {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    model: ModelKey,
    image_format: String,
}

impl RegistryImageGenerator {
    /// Create a generator for `model` on the registry at `base_url`
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
        model: ModelKey,
        image_format: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            model,
            image_format: image_format.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
}

impl Prediction {
    fn into_url(self) -> Result<String> {
        if let Some(status) = self.status.as_deref() {
            if matches!(status, "failed" | "canceled") {
                let reason = self
                    .error
                    .map(|e| match e {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| status.to_string());
                return Err(Error::ImageGeneration(reason));
            }
        }

        first_url(&self.output)
            .ok_or_else(|| Error::ImageGeneration("prediction returned no image".to_string()))
    }
}

/// Output is either a single URL or a list of them
fn first_url(output: &Value) -> Option<String> {
    match output {
        Value::String(url) if !url.is_empty() => Some(url.clone()),
        Value::Array(items) => items.iter().find_map(first_url),
        _ => None,
    }
}

#[async_trait]
impl ImageGenerator for RegistryImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}/{}/predictions",
            self.base_url, self.model.owner, self.model.name
        );
        let body = json!({
            "input": {
                "prompt": prompt,
                "image_format": self.image_format,
            }
        });

        debug!("Requesting image from {}", self.model);
        let response = with_bearer(self.client.post(&url), self.token.as_deref())
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Image prediction returned {}", status);
            return Err(Error::ImageGeneration(format!(
                "{} returned status {}",
                self.model, status
            )));
        }

        let text = response.text().await.map_err(transport_error)?;
        let prediction: Prediction = serde_json::from_str(&text)?;
        prediction.into_url()
    }
}
