use crate::classifier::{ClassifyOptions, ClassifyOutcome, DebugTrace};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use pulldown_cmark::{html, Options, Parser};
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskscope_cache::CacheStats;
use taskscope_core::{CacheEntry, ClassificationResult, Error, ModelKey};
use taskscope_upstream::validate_model_segment;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Classifications never change once computed
const CLASSIFICATION_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Recomputed responses may differ from the stored classification
const RECOMPUTED_CACHE_CONTROL: &str = "no-store";

const X_CACHE: &str = "x-cache";

const LANDING_PAGE: &str = include_str!("../../static/index.html");

// ============================================================================
// Health and metrics
// ============================================================================

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response(),
    }
}

pub async fn landing(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let Some(url) = &state.readme_url else {
        return Ok(Html(LANDING_PAGE.to_string()));
    };

    let response = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::transport(format!("fetching {}: {}", url, e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::upstream(url.as_str(), status.as_u16()).into());
    }
    let markdown = response
        .text()
        .await
        .map_err(|e| Error::transport(format!("reading {}: {}", url, e)))?;

    Ok(Html(render_readme(&markdown)))
}

/// Wrap the HTML rendering of a markdown document in a minimal page
fn render_readme(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, Parser::new_ext(markdown, options));

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<title>taskscope</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        body
    )
}

// ============================================================================
// Image generation
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub image_url: String,
}

pub async fn generate_image(
    State(state): State<AppState>,
    Json(req): Json<GenerateImageRequest>,
) -> Result<Json<GenerateImageResponse>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::InvalidRequest("prompt must not be empty".to_string()));
    }

    let image_url = state.images.generate(&req.prompt).await?;
    info!("Generated image {}", image_url);
    Ok(Json(GenerateImageResponse { image_url }))
}

// ============================================================================
// Classification
// ============================================================================

/// Query switches; a switch is on when present, unless set to `false` or `0`
#[derive(Debug, Default, Deserialize)]
pub struct ClassifyQuery {
    pub prompt: Option<String>,
    pub debug: Option<String>,
    pub force: Option<String>,
}

impl ClassifyQuery {
    fn options(&self) -> ClassifyOptions {
        ClassifyOptions {
            force_refresh: flag(&self.force),
            prompt_only: flag(&self.prompt),
            debug: flag(&self.debug),
        }
    }
}

fn flag(value: &Option<String>) -> bool {
    match value.as_deref() {
        Some(v) => !matches!(v, "false" | "0"),
        None => false,
    }
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub model: String,
    pub classification: ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
}

pub async fn classify_model(
    State(state): State<AppState>,
    Path((owner, model_name)): Path<(String, String)>,
    Query(query): Query<ClassifyQuery>,
) -> Result<Response, AppError> {
    let owner = validate_model_segment(&owner)?;
    let model_name = validate_model_segment(&model_name)?;
    let key = ModelKey::new(owner, model_name);

    let options = query.options();
    let cache_control = if options.force_refresh || options.debug {
        RECOMPUTED_CACHE_CONTROL
    } else {
        CLASSIFICATION_CACHE_CONTROL
    };

    let request_id = Uuid::new_v4();
    let span = info_span!("classify", %request_id, model = %key);
    let outcome = state
        .classifier
        .classify(&key, options)
        .instrument(span)
        .await?;

    match outcome {
        ClassifyOutcome::Prompt(prompt) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            prompt,
        )
            .into_response()),
        ClassifyOutcome::Classified(classified) => {
            let body = ClassificationResponse {
                model: key.to_string(),
                classification: classified.classification,
                debug: classified.debug,
            };
            let mut response = Json(body).into_response();
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static(X_CACHE),
                HeaderValue::from_static(classified.cache.as_header()),
            );
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static(cache_control),
            );
            Ok(response)
        }
    }
}

// ============================================================================
// Taxonomy
// ============================================================================

pub async fn list_tasks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.taxonomy.to_json())
}

pub async fn list_task_names(State(state): State<AppState>) -> impl IntoResponse {
    let names: Vec<String> = state.taxonomy.names().into_iter().map(str::to_string).collect();
    Json(names)
}

// ============================================================================
// Cache administration
// ============================================================================

pub async fn list_classifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<CacheEntry>>, AppError> {
    Ok(Json(state.cache.list_all().await?))
}

pub async fn cache_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, AppError> {
    Ok(Json(state.cache.stats().await?))
}

pub async fn purge_cache(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let deleted = state.cache.purge_all(state.purge_page_size).await?;
    metrics::counter!("taskscope_cache_purged_total").increment(deleted as u64);
    Ok(Json(json!({ "deleted": deleted })))
}
