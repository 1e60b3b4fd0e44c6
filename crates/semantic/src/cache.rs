//! LRU embedding cache keyed by a hash of the text.

use async_trait::async_trait;
use fxhash::hash64;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Embedder, SemanticError};

/// Bounded text → vector cache. Cloning shares the underlying storage.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    inner: Arc<Mutex<LruCache<u64, Arc<Vec<f32>>>>>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<u64, Arc<Vec<f32>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(text: &str) -> u64 {
        hash64(text.as_bytes())
    }

    pub fn get(&self, text: &str) -> Option<Arc<Vec<f32>>> {
        self.lock().get(&Self::key(text)).cloned()
    }

    pub fn insert(&self, text: &str, vector: Vec<f32>) -> Arc<Vec<f32>> {
        let vector = Arc::new(vector);
        self.lock().put(Self::key(text), Arc::clone(&vector));
        vector
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(4096)
    }
}

/// Wraps any [`Embedder`] with an [`EmbeddingCache`].
pub struct CachedEmbedder<E> {
    inner: E,
    cache: EmbeddingCache,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit.as_ref().clone());
        }
        let vector = self.inner.embed(text).await?;
        self.cache.insert(text, vector.clone());
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        let mut out: Vec<Option<Vec<f32>>> = texts
            .iter()
            .map(|t| self.cache.get(t).map(|v| v.as_ref().clone()))
            .collect();
        let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fetched = self.inner.embed_batch(&batch).await?;
            if fetched.len() != batch.len() {
                return Err(SemanticError::MalformedResponse(format!(
                    "embedder returned {} vectors for {} inputs",
                    fetched.len(),
                    batch.len()
                )));
            }
            for (slot, vector) in missing.into_iter().zip(fetched) {
                self.cache.insert(&texts[slot], vector.clone());
                out[slot] = Some(vector);
            }
        }
        Ok(out.into_iter().flatten().collect())
    }
}
