//! HTTP embedding client.
//!
//! Speaks three request shapes and accepts the common response shapes:
//! bare arrays (single or nested), `{"embeddings": ...}` and OpenAI's
//! `{"data": [{"embedding": ...}]}`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::JsonClient;
use crate::normalize::l2_normalize_in_place;
use crate::resilience::CircuitState;
use crate::{ApiConfig, ApiProvider, Embedder, SemanticError};

/// Remote embedding capability.
#[derive(Debug)]
pub struct ApiEmbedder {
    client: JsonClient,
}

impl ApiEmbedder {
    pub fn new(config: ApiConfig) -> Result<Self, SemanticError> {
        Ok(Self {
            client: JsonClient::new(config)?,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        self.client.config()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.client.breaker().current_state()
    }

    fn finish(&self, mut vector: Vec<f32>) -> Vec<f32> {
        if self.config().normalize {
            l2_normalize_in_place(&mut vector);
        }
        vector
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        let payload = build_payload(self.config(), &[text.to_string()], false);
        let response = self.client.post(&payload).await?;
        let vector = parse_embeddings(response)?
            .pop()
            .ok_or_else(|| {
                SemanticError::MalformedResponse("response did not contain embeddings".into())
            })?;
        Ok(self.finish(vector))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let payload = build_payload(self.config(), texts, true);
        let response = self.client.post(&payload).await?;
        let vectors = parse_embeddings(response)?;
        if vectors.len() != texts.len() {
            return Err(SemanticError::MalformedResponse(format!(
                "API returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors.into_iter().map(|v| self.finish(v)).collect())
    }
}

fn build_payload(cfg: &ApiConfig, texts: &[String], batch: bool) -> Value {
    let single = texts.first().map(String::as_str).unwrap_or_default();
    match (cfg.provider, batch) {
        (ApiProvider::HuggingFace, true) => json!({ "inputs": texts }),
        (ApiProvider::HuggingFace, false) => json!({ "inputs": single }),
        (ApiProvider::OpenAi, true) => json!({ "input": texts, "model": cfg.model }),
        (ApiProvider::OpenAi, false) => json!({ "input": single, "model": cfg.model }),
        (ApiProvider::Custom, true) => json!({ "texts": texts }),
        (ApiProvider::Custom, false) => json!({ "text": single }),
    }
}

fn parse_embeddings(value: Value) -> Result<Vec<Vec<f32>>, SemanticError> {
    match value {
        Value::Object(mut map) => {
            if let Some(embeddings) = map.remove("embeddings") {
                return parse_collection(embeddings);
            }
            if let Some(Value::Array(items)) = map.remove("data") {
                return items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(mut obj) => obj
                            .remove("embedding")
                            .ok_or_else(|| {
                                SemanticError::MalformedResponse(
                                    "missing `embedding` field in data item".into(),
                                )
                            })
                            .and_then(parse_vector),
                        _ => Err(SemanticError::MalformedResponse(
                            "unexpected entry inside `data` array".into(),
                        )),
                    })
                    .collect();
            }
            Err(SemanticError::MalformedResponse(
                "unsupported response shape".into(),
            ))
        }
        other => parse_collection(other),
    }
}

fn parse_collection(value: Value) -> Result<Vec<Vec<f32>>, SemanticError> {
    match value {
        Value::Array(items) if items.is_empty() => Ok(Vec::new()),
        Value::Array(items) if items.iter().all(Value::is_array) => {
            items.into_iter().map(parse_vector).collect()
        }
        other => parse_vector(other).map(|v| vec![v]),
    }
}

fn parse_vector(value: Value) -> Result<Vec<f32>, SemanticError> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|entry| {
                entry.as_f64().map(|f| f as f32).ok_or_else(|| {
                    SemanticError::MalformedResponse(format!(
                        "embedding entries must be numbers, got {entry}"
                    ))
                })
            })
            .collect(),
        other => Err(SemanticError::MalformedResponse(format!(
            "embedding vector must be an array, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shapes_per_provider() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let cfg = ApiConfig {
            provider: ApiProvider::OpenAi,
            model: "m".into(),
            ..Default::default()
        };
        assert_eq!(
            build_payload(&cfg, &texts, true),
            json!({"input": ["a", "b"], "model": "m"})
        );
        assert_eq!(
            build_payload(&cfg, &texts, false),
            json!({"input": "a", "model": "m"})
        );

        let cfg = ApiConfig {
            provider: ApiProvider::HuggingFace,
            ..Default::default()
        };
        assert_eq!(build_payload(&cfg, &texts, false), json!({"inputs": "a"}));

        let cfg = ApiConfig::default();
        assert_eq!(build_payload(&cfg, &texts, true), json!({"texts": ["a", "b"]}));
        assert_eq!(build_payload(&cfg, &[], false), json!({"text": ""}));
    }

    #[test]
    fn parses_bare_and_nested_arrays() {
        let nested = parse_embeddings(json!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(nested, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let single = parse_embeddings(json!([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(single, vec![vec![1.0, 2.0, 3.0]]);

        assert!(parse_embeddings(json!([])).unwrap().is_empty());
    }

    #[test]
    fn parses_embeddings_and_data_objects() {
        let v = parse_embeddings(json!({"embeddings": [[0.5, 0.5]]})).unwrap();
        assert_eq!(v, vec![vec![0.5, 0.5]]);

        let v = parse_embeddings(json!({
            "data": [{"embedding": [1.0]}, {"embedding": [2.0]}],
            "model": "x"
        }))
        .unwrap();
        assert_eq!(v, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(matches!(
            parse_embeddings(json!({"result": []})),
            Err(SemanticError::MalformedResponse(_))
        ));
        assert!(parse_embeddings(json!({"data": [{"vector": [1.0]}]})).is_err());
        assert!(parse_embeddings(json!([["a"]])).is_err());
        assert!(parse_embeddings(json!("nope")).is_err());
    }

    #[test]
    fn constructor_validates_config() {
        assert!(matches!(
            ApiEmbedder::new(ApiConfig::default()),
            Err(SemanticError::InvalidConfig(_))
        ));
        let embedder = ApiEmbedder::new(ApiConfig {
            url: "http://127.0.0.1:9/embed".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(embedder.circuit_state(), CircuitState::Closed);
    }
}
