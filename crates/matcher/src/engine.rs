use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use canonical::{BoundaryIndex, TargetText};
use rayon::prelude::*;
use semantic::{Completer, Embedder};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::anchors::AnchorSet;
use crate::assisted::AssistedMatcher;
use crate::config::MatchConfig;
use crate::deterministic::DeterministicMatcher;
use crate::embedding::SemanticMatcher;
use crate::interpolation::InterpolationResolver;
use crate::layer::{LayerContext, MatchLayer};
use crate::progress::ProgressSink;
use crate::types::{ConfidenceTier, MatchError, MatchResult, SourceChunk};

#[cfg(test)]
mod tests;

/// Optional collaborators for a run. Layers whose capability is absent are
/// skipped; the run still resolves every chunk.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub embedder: Option<Arc<dyn Embedder>>,
    pub completer: Option<Arc<dyn Completer>>,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl Capabilities {
    /// Deterministic and interpolation layers only.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_completer(mut self, completer: Arc<dyn Completer>) -> Self {
        self.completer = Some(completer);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// What one layer did during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStats {
    pub layer: String,
    /// Chunks handed to the layer.
    pub attempted: usize,
    /// Chunks it located.
    pub resolved: usize,
    #[serde(with = "semantic::serde_millis")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub exact: usize,
    pub high: usize,
    pub medium: usize,
    pub synthetic: usize,
}

impl TierCounts {
    pub fn record(&mut self, tier: ConfidenceTier) {
        match tier {
            ConfidenceTier::Exact => self.exact += 1,
            ConfidenceTier::High => self.high += 1,
            ConfidenceTier::Medium => self.medium += 1,
            ConfidenceTier::Synthetic => self.synthetic += 1,
        }
    }

    pub fn get(&self, tier: ConfidenceTier) -> usize {
        match tier {
            ConfidenceTier::Exact => self.exact,
            ConfidenceTier::High => self.high,
            ConfidenceTier::Medium => self.medium,
            ConfidenceTier::Synthetic => self.synthetic,
        }
    }

    pub fn total(&self) -> usize {
        self.exact + self.high + self.medium + self.synthetic
    }
}

/// Per-run summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveStats {
    /// Layers in the order they ran.
    pub layers: Vec<LayerStats>,
    pub tiers: TierCounts,
    /// Results at `Medium` or `Synthetic`.
    pub needs_review: usize,
}

impl ResolveStats {
    /// Share of results at `Exact` or `High`; 0 for an empty run.
    pub fn reliable_ratio(&self) -> f64 {
        let total = self.tiers.total();
        if total == 0 {
            return 0.0;
        }
        (self.tiers.exact + self.tiers.high) as f64 / total as f64
    }

    fn tally(&mut self, results: &[MatchResult]) {
        self.tiers = TierCounts::default();
        for result in results {
            self.tiers.record(result.confidence_tier);
        }
        self.needs_review = results.iter().filter(|r| r.needs_review()).count();
    }
}

/// Outcome of a run that may have been cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveReport {
    /// Located chunks, sorted by `source_ref`.
    pub results: Vec<MatchResult>,
    /// Sequence indices with no result yet, ascending. Empty when `complete`.
    pub unresolved: Vec<usize>,
    pub stats: ResolveStats,
    /// True when every chunk has exactly one result.
    pub complete: bool,
}

/// Drives the cascade: deterministic, semantic, assisted, interpolation.
///
/// Each layer only sees the chunks earlier layers left behind, and every
/// result it produces becomes an anchor for the layers after it. The last
/// layer never fails, so a run that is not cancelled resolves every chunk.
#[derive(Debug, Clone, Default)]
pub struct MatchOrchestrator {
    config: MatchConfig,
}

impl MatchOrchestrator {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Preconditions checked before any layer runs.
    pub fn validate_inputs(
        &self,
        chunks: &[SourceChunk],
        target: &TargetText,
    ) -> Result<(), MatchError> {
        self.config.validate()?;
        if target.is_empty() {
            return Err(MatchError::EmptyTarget);
        }
        let mut seen = HashSet::with_capacity(chunks.len());
        for chunk in chunks {
            if !seen.insert(chunk.sequence_index) {
                return Err(MatchError::DuplicateSequenceIndex(chunk.sequence_index));
            }
            chunk
                .structural_metadata
                .validate()
                .map_err(|reason| MatchError::MalformedMetadata {
                    sequence_index: chunk.sequence_index,
                    reason,
                })?;
        }
        Ok(())
    }

    /// Locate every chunk in `target`. Returns exactly one result per chunk,
    /// sorted by `source_ref`.
    pub async fn resolve(
        &self,
        chunks: &[SourceChunk],
        target: &TargetText,
        capabilities: &Capabilities,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let report = self
            .resolve_with_cancellation(chunks, target, capabilities, &CancellationToken::new())
            .await?;
        Ok(report.results)
    }

    /// Like [`resolve`](Self::resolve), but stops before the next layer once
    /// `cancel` fires. A cancelled report lists what is still unresolved;
    /// hand it to [`force_complete`](Self::force_complete) to finish it.
    pub async fn resolve_with_cancellation(
        &self,
        chunks: &[SourceChunk],
        target: &TargetText,
        capabilities: &Capabilities,
        cancel: &CancellationToken,
    ) -> Result<ResolveReport, MatchError> {
        self.validate_inputs(chunks, target)?;
        let span = info_span!(
            "matcher.resolve",
            chunks = chunks.len(),
            target_chars = target.len_chars()
        );
        self.run(chunks, target, capabilities, cancel)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        chunks: &[SourceChunk],
        target: &TargetText,
        capabilities: &Capabilities,
        cancel: &CancellationToken,
    ) -> Result<ResolveReport, MatchError> {
        let start = Instant::now();
        let mut ordered: Vec<&SourceChunk> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.sequence_index);
        let sequence: Vec<usize> = ordered.iter().map(|c| c.sequence_index).collect();
        let boundaries = BoundaryIndex::build(target);
        let average_chunk_chars = average_chars(&ordered);

        let mut layers: Vec<Box<dyn MatchLayer>> = vec![Box::new(DeterministicMatcher::new())];
        if let Some(embedder) = &capabilities.embedder {
            layers.push(Box::new(SemanticMatcher::new(embedder.clone())));
        }
        if let Some(completer) = &capabilities.completer {
            layers.push(Box::new(AssistedMatcher::new(completer.clone())));
        }
        layers.push(Box::new(InterpolationResolver::new()));

        let mut anchors = AnchorSet::new();
        let mut results: Vec<MatchResult> = Vec::with_capacity(chunks.len());
        let mut pending = ordered;
        let mut stats = ResolveStats::default();

        for layer in &layers {
            if pending.is_empty() {
                break;
            }
            if cancel.is_cancelled() {
                warn!(
                    next_layer = layer.name(),
                    unresolved = pending.len(),
                    "resolve_cancelled"
                );
                break;
            }

            let layer_start = Instant::now();
            let found = {
                let ctx = LayerContext {
                    target,
                    anchors: &anchors,
                    config: &self.config,
                    boundaries: &boundaries,
                    sequence: &sequence,
                    average_chunk_chars,
                };
                layer.resolve(&ctx, &pending).await
            };

            let attempted = pending.len();
            let mut resolved = 0;
            for result in found {
                let known = pending.iter().any(|c| c.sequence_index == result.source_ref);
                if known && anchors.insert(&result) {
                    results.push(result);
                    resolved += 1;
                }
            }
            pending.retain(|c| !anchors.contains(c.sequence_index));

            let elapsed = layer_start.elapsed();
            info!(
                layer = layer.name(),
                attempted,
                resolved,
                remaining = pending.len(),
                elapsed_micros = elapsed.as_micros() as u64,
                "layer_complete"
            );
            if let Some(progress) = &capabilities.progress {
                progress.on_progress(layer.name(), resolved, pending.len());
            }
            stats.layers.push(LayerStats {
                layer: layer.name().to_string(),
                attempted,
                resolved,
                elapsed,
            });
        }

        results.sort_by_key(|r| r.source_ref);
        stats.tally(&results);
        let unresolved: Vec<usize> = pending.iter().map(|c| c.sequence_index).collect();
        let complete = unresolved.is_empty();
        if complete {
            assert_total(&results, chunks);
        }

        info!(
            chunks = chunks.len(),
            exact = stats.tiers.exact,
            high = stats.tiers.high,
            medium = stats.tiers.medium,
            synthetic = stats.tiers.synthetic,
            unresolved = unresolved.len(),
            elapsed_micros = start.elapsed().as_micros() as u64,
            "resolve_complete"
        );

        Ok(ResolveReport {
            results,
            unresolved,
            stats,
            complete,
        })
    }

    /// Place every chunk a cancelled run left behind with the interpolation
    /// layer, using the results it did produce as anchors.
    pub fn force_complete(
        &self,
        mut report: ResolveReport,
        chunks: &[SourceChunk],
        target: &TargetText,
    ) -> ResolveReport {
        if report.complete || target.is_empty() {
            return report;
        }
        let start = Instant::now();
        let mut anchors = AnchorSet::new();
        anchors.extend(&report.results);

        let mut ordered: Vec<&SourceChunk> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.sequence_index);
        let sequence: Vec<usize> = ordered.iter().map(|c| c.sequence_index).collect();
        let average_chunk_chars = average_chars(&ordered);
        let pending: Vec<&SourceChunk> = ordered
            .into_iter()
            .filter(|c| !anchors.contains(c.sequence_index))
            .collect();
        let boundaries = BoundaryIndex::build(target);

        let resolver = InterpolationResolver::new();
        let placed: Vec<MatchResult> = {
            let ctx = LayerContext {
                target,
                anchors: &anchors,
                config: &self.config,
                boundaries: &boundaries,
                sequence: &sequence,
                average_chunk_chars,
            };
            pending
                .par_iter()
                .map(|chunk| resolver.estimate(&ctx, chunk))
                .collect()
        };

        let resolved = placed.len();
        report.results.extend(placed);
        report.results.sort_by_key(|r| r.source_ref);
        report.stats.layers.push(LayerStats {
            layer: resolver.name().to_string(),
            attempted: pending.len(),
            resolved,
            elapsed: start.elapsed(),
        });
        report.stats.tally(&report.results);
        report.unresolved.clear();
        report.complete = true;
        assert_total(&report.results, chunks);

        info!(
            resolved,
            elapsed_micros = start.elapsed().as_micros() as u64,
            "force_complete"
        );
        report
    }
}

fn average_chars(chunks: &[&SourceChunk]) -> usize {
    if chunks.is_empty() {
        return 1;
    }
    let total: usize = chunks.iter().map(|c| c.content_chars()).sum();
    (total / chunks.len()).max(1)
}

/// One result per chunk, no strays.
fn assert_total(results: &[MatchResult], chunks: &[SourceChunk]) {
    assert_eq!(
        results.len(),
        chunks.len(),
        "every chunk must have exactly one result"
    );
    let expected: HashSet<usize> = chunks.iter().map(|c| c.sequence_index).collect();
    assert!(
        results.iter().all(|r| expected.contains(&r.source_ref)),
        "result for unknown chunk"
    );
}
