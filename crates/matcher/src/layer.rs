use async_trait::async_trait;
use canonical::{BoundaryIndex, TargetText};
use semantic::SemanticError;
use std::future::Future;
use std::time::Duration;

use crate::anchors::AnchorSet;
use crate::config::MatchConfig;
use crate::types::{MatchResult, SourceChunk};

/// Read-only view of a run handed to each layer.
pub struct LayerContext<'a> {
    pub target: &'a TargetText,
    /// Results of every earlier layer.
    pub anchors: &'a AnchorSet,
    pub config: &'a MatchConfig,
    pub boundaries: &'a BoundaryIndex,
    /// Sorted sequence indices of every chunk in the run.
    pub sequence: &'a [usize],
    /// Mean content length over all chunks, in chars.
    pub average_chunk_chars: usize,
}

impl LayerContext<'_> {
    pub fn total_chunks(&self) -> usize {
        self.sequence.len()
    }

    /// Position of `sequence_index` in document order.
    pub fn rank(&self, sequence_index: usize) -> usize {
        self.sequence
            .binary_search(&sequence_index)
            .unwrap_or_else(|insert_at| insert_at)
    }

    /// `rank / total × len`: where a chunk would sit if chunks were spread
    /// evenly over the target.
    pub fn proportional_offset(&self, sequence_index: usize) -> usize {
        let total = self.total_chunks().max(1);
        let len = self.target.len_chars();
        let offset = (self.rank(sequence_index) as f64 / total as f64 * len as f64) as usize;
        offset.min(len.saturating_sub(1))
    }
}

/// One stage of the cascade.
///
/// A layer returns results only for the chunks it located; anything it
/// leaves out is handed to the next layer. Layers never fail: capability
/// errors are logged and counted as misses.
#[async_trait]
pub trait MatchLayer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, ctx: &LayerContext<'_>, pending: &[&SourceChunk]) -> Vec<MatchResult>;
}

/// Bound a capability call; an elapsed timer becomes a `Timeout` error.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, SemanticError>>,
) -> Result<T, SemanticError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SemanticError::Timeout(format!(
            "no answer within {}ms",
            limit.as_millis()
        ))),
    }
}
