//! Realign semantic capabilities
//!
//! The matching cascade has two layers that need outside help: the embedding
//! layer wants vectors for text windows, and the assisted layer wants a model
//! to point at where a passage sits inside a bounded window. This crate holds
//! the traits those layers consume ([`Embedder`], [`Completer`]) and the
//! implementations we ship:
//!
//! - **[`ApiEmbedder`]** - Hugging Face, OpenAI or a custom JSON endpoint
//! - **[`ApiCompleter`]** - any OpenAI-compatible chat-completions endpoint
//! - **[`StubEmbedder`]** - deterministic hashed bag of words, no network
//! - **[`CachedEmbedder`]** - LRU cache in front of any embedder
//!
//! Remote clients retry timeouts, connection errors, 429s and 5xx with
//! exponential backoff, and stop calling a dead endpoint once its circuit
//! breaker opens. Every failure comes back as a [`SemanticError`]; the
//! matcher treats it as a miss and moves on.
//!
//! ## Quick example
//!
//! ```no_run
//! use semantic::{ApiConfig, ApiEmbedder, ApiProvider, Embedder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cfg = ApiConfig {
//!         url: "https://router.huggingface.co/hf-inference/models/BAAI/bge-small-en-v1.5/pipeline/feature-extraction".into(),
//!         auth_header: Some("Bearer YOUR_HF_TOKEN".into()),
//!         provider: ApiProvider::HuggingFace,
//!         ..Default::default()
//!     };
//!
//!     let embedder = ApiEmbedder::new(cfg).unwrap();
//!     let vector = embedder.embed("Another test.").await.unwrap();
//!     println!("{} dims", vector.len());
//! }
//! ```

mod api;
mod cache;
mod capability;
mod client;
mod completion;
mod config;
mod error;
mod normalize;
pub mod resilience;
pub mod serde_millis;
mod stub;

pub use crate::api::ApiEmbedder;
pub use crate::cache::{CachedEmbedder, EmbeddingCache};
pub use crate::capability::{Completer, Embedder, LocatePrompt, LocateResponse};
pub use crate::completion::ApiCompleter;
pub use crate::config::{ApiConfig, ApiProvider};
pub use crate::error::SemanticError;
pub use crate::normalize::{cosine_similarity, l2_normalize_in_place};
pub use crate::resilience::{
    execute_with_retry_async, CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryConfig,
};
pub use crate::stub::StubEmbedder;
