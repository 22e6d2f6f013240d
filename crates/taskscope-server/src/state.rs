use crate::classifier::Classifier;
use crate::config::{CacheBackend, ServiceConfig};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use taskscope_cache::{
    ClassificationCache, MemoryCache, SqliteCache, SqliteCacheConfig, DEFAULT_PURGE_PAGE_SIZE,
};
use taskscope_core::TaskTaxonomy;
use taskscope_upstream::{
    ChatCompletionsClient, CompletionBackend, HttpModelRegistry, ImageGenerator, ModelRegistry,
    RegistryImageGenerator,
};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cache-or-compute pipeline
    pub classifier: Arc<Classifier>,

    /// Classification store, also used directly by the cache endpoints
    pub cache: Arc<dyn ClassificationCache>,

    /// Image generation backend
    pub images: Arc<dyn ImageGenerator>,

    /// Recognized tasks
    pub taxonomy: Arc<TaskTaxonomy>,

    /// Keys fetched per purge page
    pub purge_page_size: usize,

    /// Prometheus exporter, when one is installed
    pub metrics: Option<PrometheusHandle>,

    /// Outbound client shared with the upstream backends
    pub http: reqwest::Client,

    /// Markdown rendered at `/`; the built-in page is served when unset
    pub readme_url: Option<String>,
}

impl AppState {
    /// Assemble state from already-built components
    pub fn new(
        cache: Arc<dyn ClassificationCache>,
        registry: Arc<dyn ModelRegistry>,
        llm: Arc<dyn CompletionBackend>,
        images: Arc<dyn ImageGenerator>,
        taxonomy: Arc<TaskTaxonomy>,
    ) -> Self {
        let classifier = Classifier::new(cache.clone(), registry, llm, taxonomy.clone());
        Self {
            classifier: Arc::new(classifier),
            cache,
            images,
            taxonomy,
            purge_page_size: DEFAULT_PURGE_PAGE_SIZE,
            metrics: None,
            http: reqwest::Client::new(),
            readme_url: None,
        }
    }

    /// Set the purge page size
    pub fn with_purge_page_size(mut self, page_size: usize) -> Self {
        self.purge_page_size = page_size;
        self
    }

    /// Expose metrics through `handle`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Render the markdown at `url` as the landing page, fetched with `client`
    pub fn with_readme(mut self, client: reqwest::Client, url: impl Into<String>) -> Self {
        self.http = client;
        self.readme_url = Some(url.into());
        self
    }

    /// Build the production clients and store described by `config`
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let taxonomy = match &config.taxonomy_path {
            Some(path) => TaskTaxonomy::from_file(path)
                .with_context(|| format!("loading taxonomy from {}", path.display()))?,
            None => TaskTaxonomy::builtin()?,
        };
        info!("Loaded {} recognized tasks", taxonomy.len());

        let cache: Arc<dyn ClassificationCache> = match config.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new()),
            CacheBackend::Sqlite => {
                let sqlite = SqliteCache::open(&SqliteCacheConfig::new(&config.cache.path))
                    .with_context(|| format!("opening {}", config.cache.path.display()))?;
                Arc::new(sqlite)
            }
        };
        info!("Using {} classification cache", cache.name());

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("taskscope/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.http.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let registry_token = config.registry.token();
        let registry = HttpModelRegistry::new(
            client.clone(),
            &config.registry.base_url,
            registry_token.clone(),
        );

        let mut llm = ChatCompletionsClient::new(
            client.clone(),
            &config.llm.base_url,
            config.llm.api_key(),
            &config.llm.model,
        );
        if let Some(max_tokens) = config.llm.max_tokens {
            llm = llm.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = config.llm.temperature {
            llm = llm.with_temperature(temperature);
        }

        let images = RegistryImageGenerator::new(
            client.clone(),
            &config.registry.base_url,
            registry_token,
            config.image.model_key()?,
            &config.image.format,
        );

        let mut state = Self::new(
            cache,
            Arc::new(registry),
            Arc::new(llm),
            Arc::new(images),
            Arc::new(taxonomy),
        )
        .with_purge_page_size(config.cache.purge_page_size);
        state.http = client.clone();
        if let Some(url) = &config.readme_url {
            state = state.with_readme(client, url);
        }
        Ok(state)
    }
}
