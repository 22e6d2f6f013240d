//! Mock upstreams for testing
//!
//! In-process implementations of the registry, completion and image traits
//! that count their calls, plus a harness wiring them into the router.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use taskscope_cache::{ClassificationCache, MemoryCache};
use taskscope_core::{
    Error, InputField, ModelDescriptor, ModelExample, ModelKey, OutputSchema, Result, TaskTaxonomy,
};
use taskscope_server::config::CorsConfig;
use taskscope_server::{build_app, AppState};
use taskscope_upstream::{CompletionBackend, ImageGenerator, ModelRegistry};
use tower::ServiceExt;

/// Completion that classifies as image-to-image
pub const UPSCALER_COMPLETION: &str = r#"{
  "summary": "Upscales images with optional face enhancement",
  "inputTypes": ["image"],
  "outputTypes": ["image"],
  "task": "image-to-image",
  "useCases": ["Restore old family photos", "Prepare thumbnails for print"]
}"#;

/// A registry that serves one descriptor shape for every key
pub struct MockRegistry {
    fail_status: Option<u16>,
    description: String,
    examples: Option<Vec<ModelExample>>,
    call_count: AtomicU32,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            fail_status: None,
            description: "Real-ESRGAN with face correction".to_string(),
            examples: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Answer every fetch with this status
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::new()
        }
    }

    /// Serve this description and example list instead of the defaults
    pub fn with_model(mut self, description: &str, examples: Vec<ModelExample>) -> Self {
        self.description = description.to_string();
        self.examples = Some(examples);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelRegistry for MockRegistry {
    async fn fetch(&self, key: &ModelKey) -> Result<(ModelDescriptor, Vec<ModelExample>)> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if let Some(status) = self.fail_status {
            return Err(Error::upstream(key.to_string(), status));
        }

        let mut descriptor = ModelDescriptor::new(key.clone(), self.description.as_str());
        descriptor.input_schema = vec![
            InputField {
                name: "image".to_string(),
                description: Some("Input image".to_string()),
                kind: Some("string".to_string()),
            },
            InputField {
                name: "scale".to_string(),
                description: Some("Factor to scale image by".to_string()),
                kind: Some("number".to_string()),
            },
        ];
        descriptor.output_schema = Some(OutputSchema::from_fragment(
            json!({"type": "string", "format": "uri"}),
        ));

        if let Some(examples) = &self.examples {
            return Ok((descriptor, examples.clone()));
        }

        let mut input = Map::new();
        input.insert("scale".to_string(), json!(4));
        let examples = vec![ModelExample {
            input,
            output: Value::String("upscaled.png".to_string()),
        }];

        Ok((descriptor, examples))
    }
}

/// A completion backend with a canned response
pub struct MockLlm {
    response: Mutex<String>,
    call_count: AtomicU32,
}

impl MockLlm {
    pub fn new(response: &str) -> Self {
        Self {
            response: Mutex::new(response.to_string()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Replace the canned response
    pub fn set_response(&self, response: &str) {
        *self.response.lock().unwrap() = response.to_string();
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompletionBackend for MockLlm {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.response.lock().unwrap().clone())
    }

    fn model(&self) -> &str {
        "mock-llm"
    }
}

/// An image generator returning a fixed URL
pub struct MockImages {
    url: String,
    call_count: AtomicU32,
}

impl MockImages {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ImageGenerator for MockImages {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.url.clone())
    }
}

/// Router plus handles on every mock behind it
pub struct Harness {
    pub registry: Arc<MockRegistry>,
    pub llm: Arc<MockLlm>,
    pub images: Arc<MockImages>,
    pub cache: Arc<dyn ClassificationCache>,
    pub taxonomy: Arc<TaskTaxonomy>,
    pub app: Router,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MockRegistry::new(), MockLlm::new(UPSCALER_COMPLETION))
    }

    pub fn with(registry: MockRegistry, llm: MockLlm) -> Self {
        Self::build(registry, llm, None)
    }

    /// Default mocks with the landing page rendered from `readme_url`
    pub fn with_readme(readme_url: &str) -> Self {
        Self::build(
            MockRegistry::new(),
            MockLlm::new(UPSCALER_COMPLETION),
            Some(readme_url.to_string()),
        )
    }

    fn build(registry: MockRegistry, llm: MockLlm, readme_url: Option<String>) -> Self {
        let registry = Arc::new(registry);
        let llm = Arc::new(llm);
        let images = Arc::new(MockImages::new("https://cdn.example.com/out-0.webp"));
        let cache: Arc<dyn ClassificationCache> = Arc::new(MemoryCache::new());
        let taxonomy = Arc::new(TaskTaxonomy::builtin().unwrap());

        let state = AppState::new(
            cache.clone(),
            registry.clone(),
            llm.clone(),
            images.clone(),
            taxonomy.clone(),
        )
        .with_purge_page_size(2);
        let state = match readme_url {
            Some(url) => state.with_readme(reqwest::Client::new(), url),
            None => state,
        };

        Self {
            registry,
            llm,
            images,
            cache,
            taxonomy,
            app: build_app(state, &CorsConfig::default()),
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }
}

/// Serve `body` at `/README.md` with `status` on an ephemeral port
pub async fn serve_markdown(status: StatusCode, body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/README.md", get(move || async move { (status, body) }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/README.md", addr)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
