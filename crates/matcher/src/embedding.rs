//! Layer 2: embedding similarity.
//!
//! The target is cut into overlapping windows about one average chunk long.
//! Each pending chunk is compared against the windows that lie between its
//! nearest anchors; the best window wins when its cosine similarity clears
//! `embedding_similarity_threshold`, and is then snapped to sentence
//! boundaries. Each window is embedded at most once per run, on first use.

use async_trait::async_trait;
use semantic::{cosine_similarity, Embedder, SemanticError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::layer::{with_timeout, LayerContext, MatchLayer};
use crate::types::{ConfidenceTier, MatchMethod, MatchResult, SourceChunk};

pub struct SemanticMatcher {
    embedder: Arc<dyn Embedder>,
}

impl SemanticMatcher {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

/// Char range of one target window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Window {
    start: usize,
    end: usize,
}

/// Fixed-size windows over `len` chars, advancing by `stride`. The last
/// window always ends at `len`.
fn tile(len: usize, size: usize, overlap: f64) -> Vec<Window> {
    if len == 0 {
        return Vec::new();
    }
    let size = size.clamp(1, len);
    let stride = ((size as f64 * (1.0 - overlap)).round() as usize).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(len);
        windows.push(Window { start, end });
        if end == len {
            break;
        }
        start += stride;
    }
    windows
}

/// Windows overlapping `lo..hi`, clipped to it. An empty selection falls
/// back to the whole gap as a single window.
fn candidates(windows: &[Window], lo: usize, hi: usize) -> Vec<Window> {
    if lo >= hi {
        return Vec::new();
    }
    let mut picked: Vec<Window> = windows
        .iter()
        .filter(|w| w.start < hi && w.end > lo)
        .map(|w| Window {
            start: w.start.max(lo),
            end: w.end.min(hi),
        })
        .filter(|w| w.start < w.end)
        .collect();
    picked.dedup();
    if picked.is_empty() {
        picked.push(Window { start: lo, end: hi });
    }
    picked
}

impl SemanticMatcher {
    /// One vector per chunk, `None` where embedding failed. A failed batch
    /// falls back to per-chunk calls.
    async fn embed_chunks(
        &self,
        ctx: &LayerContext<'_>,
        chunks: &[&SourceChunk],
    ) -> Vec<Option<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let limit = ctx.config.capability_timeout;
        match with_timeout(limit, self.embedder.embed_batch(&texts)).await {
            Ok(vectors) if vectors.len() == texts.len() => {
                return vectors.into_iter().map(Some).collect();
            }
            Ok(vectors) => warn!(
                expected = texts.len(),
                got = vectors.len(),
                "embedding_batch_size_mismatch"
            ),
            Err(err) => warn!(error = %err, "embedding_batch_failed"),
        }

        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match with_timeout(limit, self.embedder.embed(&chunk.content)).await {
                Ok(vector) => out.push(Some(vector)),
                Err(err) => {
                    warn!(
                        sequence_index = chunk.sequence_index,
                        error = %err,
                        "chunk_embedding_failed"
                    );
                    out.push(None);
                }
            }
        }
        out
    }

    /// Embed every window in `windows` that `store` does not hold yet.
    async fn embed_windows(
        &self,
        ctx: &LayerContext<'_>,
        store: &mut HashMap<Window, Vec<f32>>,
        windows: &[Window],
    ) -> Result<(), SemanticError> {
        let missing: Vec<Window> = windows
            .iter()
            .filter(|w| !store.contains_key(w))
            .copied()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = missing
            .iter()
            .map(|w| ctx.target.slice(w.start, w.end).to_string())
            .collect();
        let vectors = with_timeout(
            ctx.config.capability_timeout,
            self.embedder.embed_batch(&texts),
        )
        .await?;
        if vectors.len() != missing.len() {
            return Err(SemanticError::MalformedResponse(format!(
                "expected {} window vectors, got {}",
                missing.len(),
                vectors.len()
            )));
        }
        store.extend(missing.into_iter().zip(vectors));
        Ok(())
    }
}

#[async_trait]
impl MatchLayer for SemanticMatcher {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn resolve(&self, ctx: &LayerContext<'_>, pending: &[&SourceChunk]) -> Vec<MatchResult> {
        let chunks: Vec<&SourceChunk> = pending.iter().copied().filter(|c| !c.is_blank()).collect();
        if chunks.is_empty() {
            return Vec::new();
        }

        let len = ctx.target.len_chars();
        let windows = tile(len, ctx.average_chunk_chars, ctx.config.window_overlap_ratio);
        let mut store: HashMap<Window, Vec<f32>> = HashMap::new();
        let chunk_vectors = self.embed_chunks(ctx, &chunks).await;
        let threshold = ctx.config.embedding_similarity_threshold;
        let mut results = Vec::new();

        for (chunk, vector) in chunks.iter().zip(chunk_vectors) {
            let Some(vector) = vector else { continue };
            let started = Instant::now();
            let idx = chunk.sequence_index;
            let lo = ctx.anchors.nearest_before(idx).map_or(0, |a| a.end_offset);
            let hi = ctx.anchors.nearest_after(idx).map_or(len, |a| a.start_offset);
            let local = candidates(&windows, lo.min(len), hi.min(len));
            if local.is_empty() {
                continue;
            }

            if let Err(err) = self.embed_windows(ctx, &mut store, &local).await {
                warn!(sequence_index = idx, error = %err, "window_embedding_failed");
                continue;
            }

            let best = local
                .iter()
                .filter_map(|w| {
                    let v = store.get(w)?;
                    Some((*w, f64::from(cosine_similarity(&vector, v))))
                })
                .fold(None, |best: Option<(Window, f64)>, (w, score)| match best {
                    Some((_, top)) if top >= score => best,
                    _ => Some((w, score)),
                });
            let Some((window, score)) = best else { continue };

            if score < threshold {
                debug!(sequence_index = idx, score, "embedding_below_threshold");
                continue;
            }
            let (start, end) = ctx.boundaries.snap(window.start, window.end);
            debug!(
                sequence_index = idx,
                start_offset = start,
                end_offset = end,
                score,
                elapsed_micros = started.elapsed().as_micros() as u64,
                "embedding_hit"
            );
            results.push(
                MatchResult::located(idx, start, end, ConfidenceTier::Medium, MatchMethod::Embedding)
                    .with_similarity(score),
            );
        }
        results
    }
}
