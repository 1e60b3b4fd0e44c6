// Progress hooks for the matching cascade.
//
// Callers hand a `ProgressSink` to `MatchOrchestrator` through
// `Capabilities`; the orchestrator reports once after every layer it runs.
// Sinks are called inline and must not block.

use tracing::info;

/// Observer for cascade progress.
pub trait ProgressSink: Send + Sync {
    /// Record the outcome of one layer.
    ///
    /// `layer` is the layer's name (`deterministic`, `semantic`, `assisted`,
    /// `interpolation`), `resolved` is the number of chunks that layer
    /// located, and `remaining` is what is still pending after it.
    fn on_progress(&self, layer: &str, resolved: usize, remaining: usize);
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _layer: &str, _resolved: usize, _remaining: usize) {}
}

/// Emits each report as an `info` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, layer: &str, resolved: usize, remaining: usize) {
        info!(layer, resolved, remaining, "match_progress");
    }
}
