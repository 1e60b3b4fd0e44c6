//! YAML Configuration File Support for Realign
//!
//! A single YAML file carries the matcher thresholds, the embedding and
//! completion capabilities, and logging. Every section is optional; missing
//! fields take their defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//!
//! matcher:
//!   edit_similarity_threshold: 0.75
//!   embedding_similarity_threshold: 0.85
//!   assisted_max_concurrency: 4
//!   capability_timeout: 30000   # milliseconds
//!
//! embedding:
//!   mode: "api"                 # none | stub | api
//!   cache_capacity: 4096
//!   api:
//!     provider: "openai"
//!     url: "https://api.openai.com/v1/embeddings"
//!     model: "text-embedding-3-small"
//!
//! completion:
//!   provider: "openai"
//!   url: "https://api.openai.com/v1/chat/completions"
//!   model: "gpt-4o-mini"
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```
//!
//! API tokens are best kept out of the file: `REALIGN_EMBEDDING_API_TOKEN`
//! and `REALIGN_COMPLETION_API_TOKEN` override the `auth_header` of the
//! matching section when set.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use matcher::{Capabilities, MatchConfig, ProgressSink};
use semantic::{
    ApiCompleter, ApiConfig, ApiEmbedder, CachedEmbedder, Embedder, SemanticError, StubEmbedder,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EMBEDDING_TOKEN_ENV: &str = "REALIGN_EMBEDDING_API_TOKEN";
pub const COMPLETION_TOKEN_ENV: &str = "REALIGN_COMPLETION_API_TOKEN";

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("failed to build capability: {0}")]
    Capability(#[from] SemanticError),
}

/// Top-level YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RealignConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub matcher: MatchConfig,

    #[serde(default)]
    pub embedding: EmbeddingYamlConfig,

    /// Chat-completions endpoint for the assisted layer; absent disables it.
    #[serde(default)]
    pub completion: Option<ApiConfig>,

    #[serde(default)]
    pub logging: LoggingYamlConfig,
}

impl RealignConfig {
    /// Load a YAML configuration file and apply token overrides from the
    /// environment.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config = Self::parse(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(yaml: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Replace API auth headers with bearer tokens found through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let bearer = |key: &str| {
            lookup(key)
                .filter(|token| !token.trim().is_empty())
                .map(|token| format!("Bearer {}", token.trim()))
        };
        if let (Some(api), Some(header)) = (self.embedding.api.as_mut(), bearer(EMBEDDING_TOKEN_ENV))
        {
            api.auth_header = Some(header);
        }
        if let (Some(api), Some(header)) = (self.completion.as_mut(), bearer(COMPLETION_TOKEN_ENV)) {
            api.auth_header = Some(header);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.matcher
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("matcher: {e}")))?;
        self.embedding.validate()?;
        if let Some(api) = &self.completion {
            api.validate()
                .map_err(|e| ConfigLoadError::Validation(format!("completion: {e}")))?;
        }
        self.logging.validate()?;
        Ok(())
    }

    /// Build the capabilities this configuration asks for.
    pub fn capabilities(
        &self,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<Capabilities, ConfigLoadError> {
        let mut caps = Capabilities::none();
        if let Some(embedder) = self.embedding.build()? {
            caps = caps.with_embedder(embedder);
        }
        if let Some(api) = &self.completion {
            caps = caps.with_completer(Arc::new(ApiCompleter::new(api.clone())?));
        }
        if let Some(progress) = progress {
            caps = caps.with_progress(progress);
        }
        Ok(caps)
    }
}

impl Default for RealignConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            matcher: MatchConfig::default(),
            embedding: EmbeddingYamlConfig::default(),
            completion: None,
            logging: LoggingYamlConfig::default(),
        }
    }
}

/// Which embedder backs the semantic layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// Semantic layer disabled.
    #[default]
    None,
    /// Offline hashed bag of words.
    Stub,
    /// Remote endpoint described by `api`.
    Api,
}

/// Embedding capability YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingYamlConfig {
    #[serde(default)]
    pub mode: EmbeddingMode,

    #[serde(default = "default_stub_dim")]
    pub stub_dim: usize,

    /// Texts cached in front of a remote embedder.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default)]
    pub api: Option<ApiConfig>,
}

impl EmbeddingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match (self.mode, &self.api) {
            (EmbeddingMode::Api, None) => Err(ConfigLoadError::Validation(
                "embedding.api is required when embedding.mode is 'api'".to_string(),
            )),
            (EmbeddingMode::Api, Some(api)) => api
                .validate()
                .map_err(|e| ConfigLoadError::Validation(format!("embedding.api: {e}"))),
            (EmbeddingMode::Stub, _) if self.stub_dim == 0 => Err(ConfigLoadError::Validation(
                "embedding.stub_dim must be >= 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn build(&self) -> Result<Option<Arc<dyn Embedder>>, ConfigLoadError> {
        Ok(match (self.mode, &self.api) {
            (EmbeddingMode::None, _) => None,
            (EmbeddingMode::Stub, _) => Some(Arc::new(StubEmbedder::new(self.stub_dim))),
            (EmbeddingMode::Api, Some(api)) => {
                let client = ApiEmbedder::new(api.clone())?;
                Some(Arc::new(CachedEmbedder::new(client, self.cache_capacity)))
            }
            (EmbeddingMode::Api, None) => {
                return Err(ConfigLoadError::Validation(
                    "embedding.api is required when embedding.mode is 'api'".to_string(),
                ));
            }
        })
    }
}

impl Default for EmbeddingYamlConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::None,
            stub_dim: default_stub_dim(),
            cache_capacity: default_cache_capacity(),
            api: None,
        }
    }
}

/// Logging YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingYamlConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingYamlConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_stub_dim() -> usize {
    StubEmbedder::DEFAULT_DIM
}

fn default_cache_capacity() -> usize {
    4096
}

fn default_log_level() -> String {
    "info".to_string()
}
