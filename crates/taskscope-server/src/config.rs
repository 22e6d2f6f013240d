//! Service configuration

use crate::cli::ServeArgs;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taskscope_cache::DEFAULT_PURGE_PAGE_SIZE;
use taskscope_core::ModelKey;
use taskscope_upstream::validate_upstream_url;

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Model registry client
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Completion API client
    #[serde(default)]
    pub llm: LlmConfig,

    /// Image generation
    #[serde(default)]
    pub image: ImageConfig,

    /// Classification store
    #[serde(default)]
    pub cache: CacheConfig,

    /// YAML task table replacing the embedded one
    #[serde(default)]
    pub taxonomy_path: Option<PathBuf>,

    /// Markdown document rendered as the landing page
    #[serde(default)]
    pub readme_url: Option<String>,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,

    /// Outbound HTTP client
    #[serde(default)]
    pub http: HttpConfig,

    /// Admit plain HTTP and private hosts as upstreams
    #[serde(default)]
    pub allow_insecure_upstreams: bool,
}

impl ServiceConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &ServeArgs) -> anyhow::Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("reading {}", config_path))?;
            serde_yaml::from_str(&content).with_context(|| format!("parsing {}", config_path))?
        } else {
            Self::default()
        };

        if let Some(url) = &cli.registry_url {
            config.registry.base_url = url.clone();
        }
        if let Some(url) = &cli.llm_url {
            config.llm.base_url = url.clone();
        }
        if let Some(model) = &cli.llm_model {
            config.llm.model = model.clone();
        }
        if let Some(path) = &cli.cache_path {
            config.cache.backend = CacheBackend::Sqlite;
            config.cache.path = path.clone();
        }
        if cli.allow_insecure_upstreams {
            config.allow_insecure_upstreams = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_upstream_url(&self.registry.base_url, self.allow_insecure_upstreams)
            .with_context(|| format!("registry.base_url {}", self.registry.base_url))?;
        validate_upstream_url(&self.llm.base_url, self.allow_insecure_upstreams)
            .with_context(|| format!("llm.base_url {}", self.llm.base_url))?;
        if let Some(url) = &self.readme_url {
            validate_upstream_url(url, self.allow_insecure_upstreams)
                .with_context(|| format!("readme_url {}", url))?;
        }

        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must not be empty");
        }
        self.image.model_key()?;
        if self.cache.purge_page_size == 0 {
            anyhow::bail!("cache.purge_page_size must be positive");
        }
        if self.http.timeout_secs == Some(0) {
            anyhow::bail!("http.timeout_secs must be positive when set");
        }
        Ok(())
    }
}

/// Model registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// API base URL
    #[serde(default = "default_registry_url")]
    pub base_url: String,

    /// Environment variable holding the API token
    #[serde(default = "default_registry_token_env")]
    pub token_env: String,
}

impl RegistryConfig {
    /// Token from the environment, if set
    pub fn token(&self) -> Option<String> {
        secret_from_env(&self.token_env)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_url(),
            token_env: default_registry_token_env(),
        }
    }
}

/// Completion API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    /// Completion length cap
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl LlmConfig {
    /// API key from the environment, if set
    pub fn api_key(&self) -> Option<String> {
        secret_from_env(&self.api_key_env)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Image generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Registry model, `owner/name`
    #[serde(default = "default_image_model")]
    pub model: String,

    /// Output file format requested from the model
    #[serde(default = "default_image_format")]
    pub format: String,
}

impl ImageConfig {
    /// Parsed model key
    pub fn model_key(&self) -> anyhow::Result<ModelKey> {
        ModelKey::parse(&self.model)
            .ok_or_else(|| anyhow::anyhow!("image.model must be owner/name, got '{}'", self.model))
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            format: default_image_format(),
        }
    }
}

/// Classification store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: CacheBackend,

    /// Database file for the SQLite backend
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Keys fetched per purge page
    #[serde(default = "default_purge_page_size")]
    pub purge_page_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            path: default_cache_path(),
            purge_page_size: default_purge_page_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map, lost on restart
    Memory,
    /// SQLite database file
    #[default]
    Sqlite,
}

/// Cross-origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allow every origin
    #[serde(default = "default_true")]
    pub allow_any_origin: bool,

    /// Origins allowed when `allow_any_origin` is off
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_any_origin: true,
            allowed_origins: Vec::new(),
        }
    }
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds; requests never time out when unset
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn secret_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn default_registry_url() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_registry_token_env() -> String {
    "REPLICATE_API_TOKEN".to_string()
}

fn default_llm_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_image_model() -> String {
    "black-forest-labs/flux-schnell".to_string()
}

fn default_image_format() -> String {
    "webp".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("taskscope.db")
}

fn default_purge_page_size() -> usize {
    DEFAULT_PURGE_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServiceConfig::load("/nonexistent/taskscope.yaml", &ServeArgs::default()).unwrap();
        assert_eq!(config.registry.base_url, "https://api.replicate.com/v1");
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache.purge_page_size, DEFAULT_PURGE_PAGE_SIZE);
        assert_eq!(config.image.model_key().unwrap(), ModelKey::new("black-forest-labs", "flux-schnell"));
        assert!(config.cors.allow_any_origin);
        assert!(config.readme_url.is_none());
        assert_eq!(config.http.timeout_secs, None);
    }

    #[test]
    fn test_timeout_is_opt_in() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http:\n  timeout_secs: 30\n").unwrap();
        let loaded = ServiceConfig::load(file.path().to_str().unwrap(), &ServeArgs::default()).unwrap();
        assert_eq!(loaded.http.timeout_secs, Some(30));

        let mut config = ServiceConfig::default();
        config.http.timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_readme_url_is_checked() {
        let mut config = ServiceConfig::default();
        config.readme_url = Some("https://raw.githubusercontent.com/acme/taskscope/main/README.md".to_string());
        assert!(config.validate().is_ok());

        config.readme_url = Some("http://127.0.0.1:9000/README.md".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_then_cli_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "llm:\n  model: file-model\n  max_tokens: 1024\ncache:\n  backend: memory\n  purge_page_size: 25\n"
        )
        .unwrap();

        let cli = ServeArgs {
            llm_model: Some("cli-model".to_string()),
            ..ServeArgs::default()
        };
        let config = ServiceConfig::load(file.path().to_str().unwrap(), &cli).unwrap();

        assert_eq!(config.llm.model, "cli-model");
        assert_eq!(config.llm.max_tokens, Some(1024));
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.purge_page_size, 25);
    }

    #[test]
    fn test_insecure_upstream_requires_flag() {
        let cli = ServeArgs {
            registry_url: Some("http://127.0.0.1:9000".to_string()),
            ..ServeArgs::default()
        };
        assert!(ServiceConfig::load("/nonexistent.yaml", &cli).is_err());

        let cli = ServeArgs {
            allow_insecure_upstreams: true,
            ..cli
        };
        assert!(ServiceConfig::load("/nonexistent.yaml", &cli).is_ok());
    }

    #[test]
    fn test_cache_path_selects_sqlite() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  backend: memory\n").unwrap();

        let cli = ServeArgs {
            cache_path: Some(PathBuf::from("/var/lib/taskscope.db")),
            ..ServeArgs::default()
        };
        let loaded = ServiceConfig::load(file.path().to_str().unwrap(), &cli).unwrap();
        assert_eq!(loaded.cache.backend, CacheBackend::Sqlite);
        assert_eq!(loaded.cache.path, PathBuf::from("/var/lib/taskscope.db"));
    }

    #[test]
    fn test_sqlite_path_without_flag() {
        let loaded = ServiceConfig::load("/nonexistent.yaml", &ServeArgs::default()).unwrap();
        assert_eq!(loaded.cache.path, PathBuf::from("taskscope.db"));
    }

    #[test]
    fn test_bad_image_model_rejected() {
        let mut config = ServiceConfig::default();
        config.image.model = "flux-schnell".to_string();
        assert!(config.validate().is_err());
    }
}
