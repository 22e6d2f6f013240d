//! Cache-or-compute classification pipeline
//!
//! ```text
//! prompt_only ─► fetch ─► build prompt ─► return text
//! cache hit   ─► return stored classification
//! cache miss  ─► fetch ─► build prompt ─► LLM ─► parse ─► enrich ─► write ─► return
//! ```
//! Every failure before the write is terminal. The write itself is
//! best-effort: a conflict or store error is logged and the computed
//! result is still returned.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use taskscope_cache::ClassificationCache;
use taskscope_core::{
    build_prompt, ClassificationResult, Error, ModelDescriptor, ModelExample, ModelKey, Result,
    TaskTaxonomy,
};
use taskscope_upstream::{CompletionBackend, ModelRegistry};
use tracing::{debug, info, warn};

/// Per-request switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOptions {
    /// Skip the cache read and recompute
    pub force_refresh: bool,

    /// Return the rendered prompt without calling the LLM
    pub prompt_only: bool,

    /// Recompute and attach the intermediate state
    pub debug: bool,
}

/// Whether a classification came from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header
    pub fn as_header(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }

    fn as_label(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// Intermediate state of a computed classification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTrace {
    pub prompt: String,
    pub raw_response: String,
    pub descriptor: ModelDescriptor,
    pub examples: Vec<ModelExample>,
}

/// A classification and where it came from
#[derive(Debug, Clone)]
pub struct Classified {
    pub classification: ClassificationResult,
    pub cache: CacheStatus,
    pub debug: Option<DebugTrace>,
}

/// Result of [`Classifier::classify`]
#[derive(Debug, Clone)]
pub enum ClassifyOutcome {
    /// The rendered prompt (`prompt_only`)
    Prompt(String),

    /// A stored or freshly computed classification
    Classified(Classified),
}

/// Read-through classifier
pub struct Classifier {
    cache: Arc<dyn ClassificationCache>,
    registry: Arc<dyn ModelRegistry>,
    llm: Arc<dyn CompletionBackend>,
    taxonomy: Arc<TaskTaxonomy>,
}

impl Classifier {
    pub fn new(
        cache: Arc<dyn ClassificationCache>,
        registry: Arc<dyn ModelRegistry>,
        llm: Arc<dyn CompletionBackend>,
        taxonomy: Arc<TaskTaxonomy>,
    ) -> Self {
        Self {
            cache,
            registry,
            llm,
            taxonomy,
        }
    }

    /// Classify `key`, consulting the cache unless told otherwise
    pub async fn classify(&self, key: &ModelKey, options: ClassifyOptions) -> Result<ClassifyOutcome> {
        if options.prompt_only {
            let (descriptor, examples) = self.registry.fetch(key).await?;
            debug!("Rendering prompt for {} with {} examples", key, examples.len());
            return Ok(ClassifyOutcome::Prompt(build_prompt(
                &descriptor,
                &examples,
                &self.taxonomy,
            )));
        }

        let cache_key = key.to_string();
        if !options.force_refresh && !options.debug {
            if let Some(entry) = self.cache.get(&cache_key).await? {
                debug!("Cache hit for {}", cache_key);
                record_classification(CacheStatus::Hit);
                return Ok(ClassifyOutcome::Classified(Classified {
                    classification: entry.classification,
                    cache: CacheStatus::Hit,
                    debug: None,
                }));
            }
        }

        let (classification, trace) = self.compute(key).await?;

        match self.cache.put(&cache_key, &classification).await {
            Ok(_) => debug!("Stored classification for {}", cache_key),
            Err(Error::AlreadyExists(_)) => {
                warn!("Classification for {} already stored, keeping existing entry", cache_key)
            }
            Err(e) => warn!("Failed to store classification for {}: {}", cache_key, e),
        }

        record_classification(CacheStatus::Miss);
        Ok(ClassifyOutcome::Classified(Classified {
            classification,
            cache: CacheStatus::Miss,
            debug: options.debug.then_some(trace),
        }))
    }

    async fn compute(&self, key: &ModelKey) -> Result<(ClassificationResult, DebugTrace)> {
        let (descriptor, examples) = self.registry.fetch(key).await?;
        let prompt = build_prompt(&descriptor, &examples, &self.taxonomy);

        let started = Instant::now();
        let raw_response = self.llm.complete(&prompt).await?;
        let elapsed = started.elapsed();
        metrics::histogram!("taskscope_llm_latency_ms").record(elapsed.as_secs_f64() * 1000.0);
        info!(
            "Classified {} with {} in {}ms",
            key,
            self.llm.model(),
            elapsed.as_millis()
        );

        let classification = self.parse(key, &raw_response)?;
        Ok((
            classification,
            DebugTrace {
                prompt,
                raw_response,
                descriptor,
                examples,
            },
        ))
    }

    /// Parse the completion and attach the taxonomy summary for its task
    fn parse(&self, key: &ModelKey, raw: &str) -> Result<ClassificationResult> {
        let mut classification: ClassificationResult =
            serde_json::from_str(raw.trim()).map_err(|e| Error::LlmParse(e.to_string()))?;

        classification.task_summary = self.taxonomy.summary(&classification.task).map(str::to_string);
        if classification.task_summary.is_none() {
            warn!("{} classified with unrecognized task '{}'", key, classification.task);
        }
        Ok(classification)
    }
}

fn record_classification(status: CacheStatus) {
    metrics::counter!("taskscope_classifications_total", "cache" => status.as_label()).increment(1);
}
