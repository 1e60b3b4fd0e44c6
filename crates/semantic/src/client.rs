//! JSON-over-HTTP transport shared by the embedding and completion clients.

use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

use crate::resilience::{execute_with_retry_async, CircuitBreaker};
use crate::{ApiConfig, SemanticError};

/// One pooled `reqwest` client plus the retry policy and circuit breaker
/// for a single endpoint.
#[derive(Debug)]
pub(crate) struct JsonClient {
    http: reqwest::Client,
    config: ApiConfig,
    breaker: CircuitBreaker,
}

impl JsonClient {
    pub(crate) fn new(config: ApiConfig) -> Result<Self, SemanticError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(std::time::Duration::from_secs(10)))
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| SemanticError::InvalidConfig(format!("http client: {e}")))?;
        let breaker = CircuitBreaker::new(config.circuit_breaker);
        Ok(Self {
            http,
            config,
            breaker,
        })
    }

    pub(crate) fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub(crate) fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// POST `payload` and return the parsed JSON body, retrying transient
    /// failures when resilience is enabled.
    pub(crate) async fn post(&self, payload: &Value) -> Result<Value, SemanticError> {
        let provider = self.config.provider_name();
        if !self.config.enable_resilience {
            return self.send_once(payload).await;
        }
        if !self.breaker.allow_request() {
            return Err(SemanticError::CircuitOpen(provider.to_string()));
        }

        let start = Instant::now();
        let result =
            execute_with_retry_async(&self.config.retry, provider, |_| self.send_once(payload))
                .await;
        match &result {
            Ok(_) => {
                self.breaker.record_success();
                debug!(
                    provider,
                    elapsed_micros = start.elapsed().as_micros() as u64,
                    "capability_request_ok"
                );
            }
            Err(err) => {
                self.breaker.record_failure();
                warn!(
                    provider,
                    error = %err,
                    breaker = ?self.breaker.current_state(),
                    "capability_request_failed"
                );
            }
        }
        result
    }

    async fn send_once(&self, payload: &Value) -> Result<Value, SemanticError> {
        let mut request = self
            .http
            .post(&self.config.url)
            .header("Content-Type", "application/json");
        if let Some(header) = self.config.auth_header.as_deref() {
            request = request.header("Authorization", header);
        }

        let response = request.json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SemanticError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| SemanticError::MalformedResponse(format!("invalid JSON body: {e}")))
    }
}
