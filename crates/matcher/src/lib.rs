//! # Realign Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` takes chunks extracted from a source document and finds where
//! each one now lives in a transformed version of that document (reflowed,
//! cleaned up, lightly rewritten). Every chunk gets exactly one
//! [`MatchResult`]: a char span in the target plus a [`ConfidenceTier`] that
//! says how far the span can be trusted.
//!
//! ## The cascade
//!
//! [`MatchOrchestrator`] runs four layers in order. Each layer only sees what
//! the layers before it left unresolved, and each result becomes an anchor
//! that narrows the search for its neighbours:
//!
//! 1. [`DeterministicMatcher`]: exact, normalized, triangulated and
//!    edit-distance search. Pure CPU.
//! 2. [`SemanticMatcher`]: embedding similarity over target windows. Needs an
//!    [`Embedder`](semantic::Embedder).
//! 3. [`AssistedMatcher`]: asks a [`Completer`](semantic::Completer) for the
//!    span inside a bounded window, then validates the answer.
//! 4. [`InterpolationResolver`]: estimates a span from surrounding anchors.
//!    Always succeeds and always reports `Synthetic`.
//!
//! Layers 2 and 3 are skipped when their capability is not supplied.
//! Capability errors and timeouts are misses, never failures; the only errors
//! a run returns are precondition failures ([`MatchError`]).
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use canonical::TargetText;
//! use matcher::{Capabilities, MatchConfig, MatchOrchestrator, SourceChunk};
//! use semantic::StubEmbedder;
//!
//! # async fn run() -> Result<(), matcher::MatchError> {
//! let target = TargetText::new("Chapter 2\n\nParagraph text here.");
//! let chunks = vec![
//!     SourceChunk::new(0, "Chapter 2"),
//!     SourceChunk::new(1, "Paragraph text here."),
//! ];
//!
//! let capabilities = Capabilities::none().with_embedder(Arc::new(StubEmbedder::default()));
//! let orchestrator = MatchOrchestrator::new(MatchConfig::default());
//! for result in orchestrator.resolve(&chunks, &target, &capabilities).await? {
//!     println!(
//!         "{} -> {}..{} ({})",
//!         result.source_ref,
//!         result.start_offset,
//!         result.end_offset,
//!         result.confidence_tier.as_str()
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! Runs emit `tracing` events (`layer_complete`, `resolve_complete`, and
//! per-hit `debug` events) inside a `matcher.resolve` span. Install a
//! [`ProgressSink`] through [`Capabilities`] to receive a report after each
//! layer.

mod anchors;
mod assisted;
mod config;
mod deterministic;
mod embedding;
pub mod engine;
mod interpolation;
mod layer;
mod progress;
pub mod types;

pub use crate::anchors::{Anchor, AnchorSet, SearchHint};
pub use crate::assisted::AssistedMatcher;
pub use crate::config::MatchConfig;
pub use crate::deterministic::DeterministicMatcher;
pub use crate::embedding::SemanticMatcher;
pub use crate::engine::{
    Capabilities, LayerStats, MatchOrchestrator, ResolveReport, ResolveStats, TierCounts,
};
pub use crate::interpolation::InterpolationResolver;
pub use crate::layer::{LayerContext, MatchLayer};
pub use crate::progress::{NoopProgress, ProgressSink, TracingProgress};
pub use crate::types::{
    BoundingBox, ConfidenceTier, MatchError, MatchMethod, MatchResult, SourceChunk,
    StructuralMetadata,
};
