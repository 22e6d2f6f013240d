//! taskscope Upstream
//!
//! HTTP clients for the external services taskscope depends on:
//! - the model registry (descriptors, example predictions, image predictions)
//! - an OpenAI-compatible chat completions API
//!
//! Each client sits behind a trait so the classifier can be exercised with
//! in-process doubles. No client retries; a failed call fails the request.

pub mod image;
pub mod llm;
pub mod registry;
pub mod security;

pub use image::{ImageGenerator, RegistryImageGenerator};
pub use llm::{ChatCompletionsClient, CompletionBackend};
pub use registry::{HttpModelRegistry, ModelRegistry};
pub use security::{validate_model_segment, validate_upstream_url, SecurityError};

use taskscope_core::Error;

/// Attach a bearer token when one is configured
pub(crate) fn with_bearer(
    request: reqwest::RequestBuilder,
    token: Option<&str>,
) -> reqwest::RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> Error {
    Error::transport(err.to_string())
}
