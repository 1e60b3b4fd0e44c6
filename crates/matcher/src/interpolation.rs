//! Layer 4: positional estimation. Always succeeds.

use async_trait::async_trait;
use rayon::prelude::*;

use crate::anchors::Anchor;
use crate::layer::{LayerContext, MatchLayer};
use crate::types::{MatchMethod, MatchResult, SourceChunk};

/// Places every chunk it is given from the anchors around it. Results are
/// `Synthetic` and carry a warning naming how the span was estimated.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpolationResolver;

impl InterpolationResolver {
    pub fn new() -> Self {
        Self
    }

    /// Estimate one chunk. Only earlier-layer anchors are consulted, so
    /// estimates never depend on each other.
    pub fn estimate(&self, ctx: &LayerContext<'_>, chunk: &SourceChunk) -> MatchResult {
        let idx = chunk.sequence_index;
        let len = ctx.target.len_chars();
        let avg = ctx
            .anchors
            .average_len()
            .unwrap_or(ctx.average_chunk_chars as f64)
            .max(1.0);
        let span = match chunk.content_chars() {
            0 => avg.round() as usize,
            n => n,
        }
        .max(1);

        let (start, end, method, warning) =
            match (ctx.anchors.nearest_before(idx), ctx.anchors.nearest_after(idx)) {
                (Some(before), Some(after)) => between(before, after, idx, span),
                (Some(before), None) => forward(before, idx, span, avg),
                (None, Some(after)) => backward(after, idx, span, avg),
                (None, None) => {
                    let start = ctx.proportional_offset(idx);
                    (
                        start,
                        start + span,
                        MatchMethod::Proportional,
                        format!(
                            "no anchors; placed by rank {} of {}",
                            ctx.rank(idx),
                            ctx.total_chunks()
                        ),
                    )
                }
            };

        let (start, end) = clamp_span(start, end, len);
        MatchResult::synthetic(idx, start, end, method, warning)
    }
}

type Estimate = (usize, usize, MatchMethod, String);

/// Gaps of two chars or more keep the estimate off both neighbours' edges.
/// A one-char gap yields exactly that char; with no gap at all the span
/// falls back to one char at `before.end_offset`.
fn between(before: &Anchor, after: &Anchor, idx: usize, span: usize) -> Estimate {
    let steps = (after.sequence_index - before.sequence_index) as f64;
    let fraction = (idx - before.sequence_index) as f64 / steps;
    let gap = after.start_offset.saturating_sub(before.end_offset);
    let offset = (fraction * gap as f64) as usize;
    let offset = if gap >= 2 { offset.clamp(1, gap - 1) } else { 0 };
    let start = before.end_offset + offset;
    let end = (start + span).min(after.start_offset).max(start + 1);
    (
        start,
        end,
        MatchMethod::InterpolatedBetween,
        format!(
            "interpolated between chunks {} and {}",
            before.sequence_index, after.sequence_index
        ),
    )
}

fn forward(before: &Anchor, idx: usize, span: usize, avg: f64) -> Estimate {
    let skipped = (idx - before.sequence_index - 1) as f64;
    let start = before.end_offset + (avg * skipped) as usize;
    (
        start,
        start + span,
        MatchMethod::ExtrapolatedForward,
        format!("extrapolated forward from chunk {}", before.sequence_index),
    )
}

fn backward(after: &Anchor, idx: usize, span: usize, avg: f64) -> Estimate {
    let skipped = (after.sequence_index - idx - 1) as f64;
    let end = after.start_offset.saturating_sub((avg * skipped) as usize);
    let start = end.saturating_sub(span);
    (
        start,
        end.max(start + 1),
        MatchMethod::ExtrapolatedBackward,
        format!("extrapolated backward from chunk {}", after.sequence_index),
    )
}

/// Force `0 <= start < end <= len`. `len` must be non-zero.
fn clamp_span(start: usize, end: usize, len: usize) -> (usize, usize) {
    let start = start.min(len - 1);
    let end = end.clamp(start + 1, len);
    (start, end)
}

#[async_trait]
impl MatchLayer for InterpolationResolver {
    fn name(&self) -> &'static str {
        "interpolation"
    }

    async fn resolve(&self, ctx: &LayerContext<'_>, pending: &[&SourceChunk]) -> Vec<MatchResult> {
        pending
            .par_iter()
            .map(|chunk| self.estimate(ctx, chunk))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::AnchorSet;
    use crate::config::MatchConfig;
    use crate::types::ConfidenceTier;
    use canonical::{BoundaryIndex, TargetText};

    fn anchored(idx: usize, start: usize, end: usize) -> MatchResult {
        MatchResult::located(idx, start, end, ConfidenceTier::Exact, MatchMethod::ExactSubstring)
    }

    fn estimate(
        target_len: usize,
        anchors: &AnchorSet,
        sequence: &[usize],
        chunk: &SourceChunk,
    ) -> MatchResult {
        let target = TargetText::new("a".repeat(target_len));
        let config = MatchConfig::default();
        let boundaries = BoundaryIndex::build(&target);
        let ctx = LayerContext {
            target: &target,
            anchors,
            config: &config,
            boundaries: &boundaries,
            sequence,
            average_chunk_chars: 10,
        };
        InterpolationResolver::new().estimate(&ctx, chunk)
    }

    #[test]
    fn interpolates_between_anchors() {
        let mut anchors = AnchorSet::new();
        anchors.extend(&[anchored(0, 0, 100), anchored(4, 400, 500)]);
        let r = estimate(1000, &anchors, &[0, 1, 2, 3, 4], &SourceChunk::new(2, "x".repeat(50)));

        assert_eq!(r.method, MatchMethod::InterpolatedBetween);
        assert_eq!(r.confidence_tier, ConfidenceTier::Synthetic);
        assert_eq!((r.start_offset, r.end_offset), (250, 300));
        assert!(r.validation_warning.unwrap().contains("between chunks 0 and 4"));
    }

    #[test]
    fn end_is_clamped_to_following_anchor() {
        let mut anchors = AnchorSet::new();
        anchors.extend(&[anchored(0, 0, 100), anchored(2, 120, 200)]);
        let r = estimate(1000, &anchors, &[0, 1, 2], &SourceChunk::new(1, "x".repeat(80)));
        assert_eq!((r.start_offset, r.end_offset), (110, 120));
    }

    #[test]
    fn interpolated_start_clears_preceding_anchor() {
        let mut anchors = AnchorSet::new();
        anchors.extend(&[anchored(0, 0, 100), anchored(10, 105, 200)]);
        // Fraction 0.1 of a 5-char gap would land on the anchor's end.
        let sequence: Vec<usize> = (0..=10).collect();
        let r = estimate(1000, &anchors, &sequence, &SourceChunk::new(1, "x".repeat(30)));
        assert_eq!((r.start_offset, r.end_offset), (101, 105));

        // A 9-char gap near the following anchor still leaves it one char.
        let mut anchors = AnchorSet::new();
        anchors.extend(&[anchored(0, 0, 100), anchored(10, 109, 200)]);
        let r = estimate(1000, &anchors, &sequence, &SourceChunk::new(9, "x".repeat(30)));
        assert!(r.start_offset > 100 && r.end_offset <= 109 && r.start_offset < r.end_offset);

        let mut anchors = AnchorSet::new();
        anchors.extend(&[anchored(0, 0, 100), anchored(2, 101, 200)]);
        let r = estimate(1000, &anchors, &[0, 1, 2], &SourceChunk::new(1, "x".repeat(30)));
        assert_eq!((r.start_offset, r.end_offset), (100, 101));
    }

    #[test]
    fn extrapolates_forward_by_average_length() {
        let mut anchors = AnchorSet::new();
        anchors.extend(&[anchored(0, 0, 40), anchored(1, 40, 60)]);
        // Average anchored length is 30; chunk 3 skips one chunk after 1.
        let r = estimate(1000, &anchors, &[0, 1, 2, 3], &SourceChunk::new(3, "x".repeat(25)));
        assert_eq!(r.method, MatchMethod::ExtrapolatedForward);
        assert_eq!((r.start_offset, r.end_offset), (90, 115));
    }

    #[test]
    fn extrapolates_backward_from_following_anchor() {
        let mut anchors = AnchorSet::new();
        anchors.insert(&anchored(2, 500, 520));
        let r = estimate(1000, &anchors, &[0, 1, 2], &SourceChunk::new(1, "x".repeat(30)));
        assert_eq!(r.method, MatchMethod::ExtrapolatedBackward);
        assert_eq!((r.start_offset, r.end_offset), (470, 500));
    }

    #[test]
    fn proportional_without_anchors() {
        let anchors = AnchorSet::new();
        let r = estimate(1000, &anchors, &[0, 1, 2, 3], &SourceChunk::new(2, "x".repeat(10)));
        assert_eq!(r.method, MatchMethod::Proportional);
        assert_eq!((r.start_offset, r.end_offset), (500, 510));
    }

    #[test]
    fn span_never_leaves_the_text() {
        let mut anchors = AnchorSet::new();
        anchors.insert(&anchored(0, 0, 10));
        let r = estimate(10, &anchors, &[0, 1], &SourceChunk::new(1, "x".repeat(30)));
        assert_eq!((r.start_offset, r.end_offset), (9, 10));

        let r = estimate(5, &AnchorSet::new(), &[0], &SourceChunk::new(0, ""));
        assert!(r.start_offset < r.end_offset && r.end_offset <= 5);
    }

    #[test]
    fn clamp_shifts_start_off_the_end() {
        assert_eq!(clamp_span(10, 12, 10), (9, 10));
        assert_eq!(clamp_span(3, 3, 10), (3, 4));
        assert_eq!(clamp_span(0, 50, 10), (0, 10));
    }

    #[tokio::test]
    async fn resolves_every_pending_chunk() {
        let target = TargetText::new("abcdefghij".repeat(10));
        let anchors = AnchorSet::new();
        let config = MatchConfig::default();
        let boundaries = BoundaryIndex::build(&target);
        let sequence = [0, 1, 2];
        let ctx = LayerContext {
            target: &target,
            anchors: &anchors,
            config: &config,
            boundaries: &boundaries,
            sequence: &sequence,
            average_chunk_chars: 5,
        };
        let chunks = [
            SourceChunk::new(0, "one"),
            SourceChunk::new(1, "   "),
            SourceChunk::new(2, "three"),
        ];
        let pending: Vec<&SourceChunk> = chunks.iter().collect();
        let results = InterpolationResolver::new().resolve(&ctx, &pending).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.method.is_synthetic()));
    }
}
