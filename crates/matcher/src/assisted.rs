//! Layer 3: model-assisted location.
//!
//! A completer is shown the chunk and a bounded window of the target and
//! asked for the chunk's char offsets inside that window. The window is the
//! gap between the chunk's neighbouring anchors when that gap is narrow
//! enough, otherwise a radius around the best positional estimate. Answers
//! are never trusted as given: the span must sit inside the window and its
//! text must be edit-similar to the chunk.

use async_trait::async_trait;
use canonical::{collapse_whitespace, edit_similarity};
use futures::stream::{self, StreamExt};
use semantic::{Completer, LocatePrompt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::layer::{with_timeout, LayerContext, MatchLayer};
use crate::types::{ConfidenceTier, MatchMethod, MatchResult, SourceChunk};

pub struct AssistedMatcher {
    completer: Arc<dyn Completer>,
}

impl AssistedMatcher {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    async fn locate_one(&self, ctx: &LayerContext<'_>, chunk: &SourceChunk) -> Option<MatchResult> {
        let idx = chunk.sequence_index;
        let started = Instant::now();
        let (lo, hi) = search_window(ctx, chunk);
        if lo >= hi {
            return None;
        }
        let prompt = LocatePrompt::new(chunk.content.as_str(), ctx.target.slice(lo, hi));

        let response = match with_timeout(
            ctx.config.capability_timeout,
            self.completer.complete(&prompt),
        )
        .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(sequence_index = idx, error = %err, "assisted_call_failed");
                return None;
            }
        };

        let Some((rel_start, rel_end)) = response.span() else {
            debug!(sequence_index = idx, "assisted_not_found");
            return None;
        };
        if rel_start >= rel_end || rel_end > hi - lo {
            warn!(
                sequence_index = idx,
                rel_start,
                rel_end,
                window_chars = hi - lo,
                "assisted_span_out_of_window"
            );
            return None;
        }

        let (start, end) = (lo + rel_start, lo + rel_end);
        let located = collapse_whitespace(ctx.target.slice(start, end));
        let score = edit_similarity(&located, &collapse_whitespace(&chunk.content));
        if score < ctx.config.assisted_similarity_threshold {
            warn!(sequence_index = idx, score, "assisted_span_rejected");
            return None;
        }

        debug!(
            sequence_index = idx,
            start_offset = start,
            end_offset = end,
            score,
            elapsed_micros = started.elapsed().as_micros() as u64,
            "assisted_hit"
        );
        Some(
            MatchResult::located(idx, start, end, ConfidenceTier::High, MatchMethod::Assisted)
                .with_similarity(score),
        )
    }
}

/// Char range shown to the completer for `chunk`.
fn search_window(ctx: &LayerContext<'_>, chunk: &SourceChunk) -> (usize, usize) {
    let len = ctx.target.len_chars();
    let idx = chunk.sequence_index;
    let before = ctx.anchors.nearest_before(idx);
    let after = ctx.anchors.nearest_after(idx);

    let lo_bound = before.map_or(0, |a| a.end_offset.min(len));
    let hi_bound = after.map_or(len, |a| a.start_offset.min(len));
    let bounded = lo_bound < hi_bound;

    if before.is_some()
        && after.is_some()
        && bounded
        && hi_bound - lo_bound <= ctx.config.assisted_max_window_chars
    {
        return (lo_bound, hi_bound);
    }

    let content_len = chunk.content_chars();
    let estimate = match (before, after) {
        (Some(b), _) => b.end_offset,
        (None, Some(a)) => a.start_offset.saturating_sub(content_len),
        (None, None) => ctx.proportional_offset(idx),
    };
    let radius = ctx.config.assisted_radius_chars;
    let (floor, ceil) = if bounded { (lo_bound, hi_bound) } else { (0, len) };
    let lo = estimate.saturating_sub(radius).max(floor);
    let hi = estimate
        .saturating_add(content_len)
        .saturating_add(radius)
        .min(ceil);
    (lo.min(hi), hi)
}

#[async_trait]
impl MatchLayer for AssistedMatcher {
    fn name(&self) -> &'static str {
        "assisted"
    }

    async fn resolve(&self, ctx: &LayerContext<'_>, pending: &[&SourceChunk]) -> Vec<MatchResult> {
        let width = ctx.config.assisted_max_concurrency.max(1);
        let chunks: Vec<&SourceChunk> = pending.iter().copied().filter(|c| !c.is_blank()).collect();
        let futures: Vec<_> = chunks.into_iter().map(|chunk| self.locate_one(ctx, chunk)).collect();
        stream::iter(futures)
            .buffer_unordered(width)
            .filter_map(futures::future::ready)
            .collect()
            .await
    }
}
