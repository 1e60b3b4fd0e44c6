use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::SemanticError;

/// Wire format spoken by a remote endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiProvider {
    /// Hugging Face feature-extraction: `{"inputs": ...}`.
    #[serde(rename = "huggingface", alias = "hf")]
    HuggingFace,
    /// OpenAI-compatible `/embeddings` and `/chat/completions`.
    #[serde(rename = "openai", alias = "gpt")]
    OpenAi,
    /// `{"text": ...}` / `{"texts": [...]}`.
    #[default]
    Custom,
}

/// Connection settings for one remote capability (embedding or completion).
///
/// # Example
/// ```
/// use semantic::{ApiConfig, ApiProvider};
///
/// let cfg = ApiConfig {
///     url: "https://api.openai.com/v1/embeddings".into(),
///     auth_header: Some("Bearer sk-xxx".into()),
///     provider: ApiProvider::OpenAi,
///     model: "text-embedding-3-small".into(),
///     ..Default::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Endpoint receiving the POST.
    pub url: String,
    /// Full `Authorization` header value, e.g. `"Bearer hf_xxx"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_header: Option<String>,
    pub provider: ApiProvider,
    /// Model name sent to providers that take one.
    pub model: String,
    /// Per-request HTTP timeout, in milliseconds.
    #[serde(with = "crate::serde_millis")]
    pub timeout: Duration,
    /// Scale embeddings to unit length. Ignored by completion clients.
    pub normalize: bool,
    /// Retry and circuit-break remote calls.
    pub enable_resilience: bool,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_header: None,
            provider: ApiProvider::Custom,
            model: String::new(),
            timeout: Duration::from_secs(30),
            normalize: true,
            enable_resilience: true,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), SemanticError> {
        if self.url.trim().is_empty() {
            return Err(SemanticError::InvalidConfig("url is required".into()));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(SemanticError::InvalidConfig(format!(
                "url must be http(s), got '{}'",
                self.url
            )));
        }
        if self.timeout.is_zero() {
            return Err(SemanticError::InvalidConfig(
                "timeout must be greater than zero".into(),
            ));
        }
        if self.provider == ApiProvider::OpenAi && self.model.trim().is_empty() {
            return Err(SemanticError::InvalidConfig(
                "model is required for the openai provider".into(),
            ));
        }
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        Ok(())
    }

    /// Label used in logs and breaker errors.
    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            ApiProvider::HuggingFace => "huggingface",
            ApiProvider::OpenAi => "openai",
            ApiProvider::Custom => "custom",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ApiConfig {
        ApiConfig {
            url: "https://example.com/embed".into(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let cfg = ApiConfig::default();
        assert_eq!(cfg.provider, ApiProvider::Custom);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert!(cfg.normalize);
        assert!(cfg.enable_resilience);
    }

    #[test]
    fn validate_requires_url_and_timeout() {
        assert!(ApiConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());

        let cfg = ApiConfig {
            url: "ftp://example.com".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ApiConfig {
            timeout: Duration::ZERO,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn openai_requires_model() {
        let cfg = ApiConfig {
            provider: ApiProvider::OpenAi,
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("model is required"));
    }

    #[test]
    fn provider_aliases_deserialize() {
        let p: ApiProvider = serde_json::from_str("\"hf\"").unwrap();
        assert_eq!(p, ApiProvider::HuggingFace);
        let p: ApiProvider = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(p, ApiProvider::OpenAi);
        let p: ApiProvider = serde_json::from_str("\"gpt\"").unwrap();
        assert_eq!(p, ApiProvider::OpenAi);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ApiConfig =
            serde_json::from_str(r#"{"url":"http://localhost:8080","timeout":500}"#).unwrap();
        assert_eq!(cfg.timeout, Duration::from_millis(500));
        assert_eq!(cfg.retry, RetryConfig::default());
    }
}
