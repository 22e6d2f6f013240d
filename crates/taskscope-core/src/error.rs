//! Error types for taskscope

/// Result type alias using taskscope's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for taskscope operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The model registry answered with a non-success status
    #[error("registry lookup for {model} failed with status {status}")]
    UpstreamFetch {
        /// `owner/name` of the model being looked up
        model: String,
        /// HTTP status returned by the registry
        status: u16,
    },

    /// Transport-level failure talking to an upstream API
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// The completion call failed
    #[error("llm invocation failed: {0}")]
    LlmInvocation(String),

    /// The completion returned text that is not a classification
    #[error("llm response is not valid classification JSON: {0}")]
    LlmParse(String),

    /// Image generation failed
    #[error("image generation failed: {0}")]
    ImageGeneration(String),

    /// A cache entry already exists for the key
    #[error("cache entry already exists for {0}")]
    AlreadyExists(String),

    /// Cache backend errors
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new upstream fetch error
    pub fn upstream(model: impl Into<String>, status: u16) -> Self {
        Self::UpstreamFetch {
            model: model.into(),
            status,
        }
    }

    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new llm invocation error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::LlmInvocation(msg.into())
    }

    /// Create a new cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-readable name, used as the `error` field of API
    /// responses and as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamFetch { .. } => "upstream_fetch",
            Self::Transport(_) => "transport",
            Self::LlmInvocation(_) => "llm_invocation",
            Self::LlmParse(_) => "llm_parse",
            Self::ImageGeneration(_) => "image_generation",
            Self::AlreadyExists(_) => "already_exists",
            Self::Cache(_) => "cache",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
