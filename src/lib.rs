//! # Realign
//!
//! Umbrella crate for the chunk re-anchoring workspace. It re-exports the
//! pieces most callers need and adds the glue around them: YAML file
//! configuration ([`RealignConfig`]) and [`realign_document`], which runs a
//! whole document through the cascade and always comes back with one result
//! per chunk.
//!
//! | Crate | Role |
//! |-------|------|
//! | [`canonical`] | char-indexed target text, normalization, similarity, sentence bounds |
//! | [`semantic`] | embedding and completion capabilities, HTTP clients, resilience |
//! | [`matcher`] | the four-layer cascade and its data model |
//!
//! ```no_run
//! use realign::{realign_document, RealignConfig, SourceChunk};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), realign::RealignError> {
//! let config = RealignConfig::default();
//! let chunks = vec![SourceChunk::new(0, "Paragraph text here.")];
//! let report = realign_document(
//!     &config,
//!     &chunks,
//!     "Chapter 2\n\nParagraph text here.",
//!     None,
//!     &CancellationToken::new(),
//! )
//! .await?;
//! assert!(report.complete);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod config;

pub use canonical;
pub use matcher;
pub use semantic;

pub use crate::config::{
    ConfigLoadError, EmbeddingMode, EmbeddingYamlConfig, LoggingYamlConfig, RealignConfig,
};
pub use canonical::{BoundaryIndex, NormalizeConfig, TargetText, TextError};
pub use matcher::{
    Capabilities, ConfidenceTier, LayerStats, MatchConfig, MatchError, MatchMethod,
    MatchOrchestrator, MatchResult, ProgressSink, ResolveReport, ResolveStats, SourceChunk,
    StructuralMetadata, TierCounts, TracingProgress,
};
pub use semantic::{ApiConfig, ApiProvider, Completer, Embedder, SemanticError, StubEmbedder};

/// Errors from a configured end-to-end run.
#[derive(Debug, Error)]
pub enum RealignError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("failed to parse chunks: {0}")]
    Chunks(#[from] serde_json::Error),
}

/// Parse a JSON array of chunks.
pub fn parse_chunks(json: &str) -> Result<Vec<SourceChunk>, RealignError> {
    Ok(serde_json::from_str(json)?)
}

/// Run `chunks` against `target` with the capabilities `config` describes.
///
/// If `cancel` fires mid-run the cascade stops before its next layer and
/// whatever is left is placed by interpolation, so the returned report is
/// always complete.
pub async fn realign_document(
    config: &RealignConfig,
    chunks: &[SourceChunk],
    target: &str,
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: &CancellationToken,
) -> Result<ResolveReport, RealignError> {
    let start = Instant::now();
    let target = TargetText::new(target);
    let capabilities = config.capabilities(progress)?;
    let orchestrator = MatchOrchestrator::new(config.matcher.clone());

    let report = orchestrator
        .resolve_with_cancellation(chunks, &target, &capabilities, cancel)
        .await?;
    let report = if report.complete {
        report
    } else {
        warn!(
            unresolved = report.unresolved.len(),
            "realign_force_complete"
        );
        orchestrator.force_complete(report, chunks, &target)
    };

    info!(
        chunks = chunks.len(),
        reliable_ratio = report.stats.reliable_ratio(),
        needs_review = report.stats.needs_review,
        elapsed_micros = start.elapsed().as_micros() as u64,
        "realign_document"
    );
    Ok(report)
}
