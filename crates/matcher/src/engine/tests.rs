use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use semantic::{LocatePrompt, LocateResponse, SemanticError, StubEmbedder};

use crate::types::{BoundingBox, MatchMethod, StructuralMetadata};

const CHAPTER: &str = "Chapter 2\n\nParagraph text here.";

/// Records every progress report.
#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<(String, usize, usize)>>,
}

impl RecordingProgress {
    fn snapshot(&self) -> Vec<(String, usize, usize)> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, layer: &str, resolved: usize, remaining: usize) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((layer.to_string(), resolved, remaining));
    }
}

/// Finds the passage by its first word, like a cooperative model would.
struct FirstWordCompleter {
    calls: AtomicUsize,
}

#[async_trait]
impl Completer for FirstWordCompleter {
    async fn complete(&self, prompt: &LocatePrompt) -> Result<LocateResponse, SemanticError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = prompt.content.split_whitespace().next().unwrap_or_default();
        Ok(match prompt.window.find(first) {
            Some(byte) => {
                let start = prompt.window[..byte].chars().count();
                let end = (start + prompt.content.chars().count())
                    .min(prompt.window.chars().count());
                LocateResponse::found(start, end)
            }
            None => LocateResponse::not_found(),
        })
    }
}

struct Offline;

#[async_trait]
impl Embedder for Offline {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, SemanticError> {
        Err(SemanticError::Unavailable("embedding endpoint down".into()))
    }
}

#[async_trait]
impl Completer for Offline {
    async fn complete(&self, _prompt: &LocatePrompt) -> Result<LocateResponse, SemanticError> {
        Err(SemanticError::Status {
            status: 503,
            body: "overloaded".into(),
        })
    }
}

/// Cancels the run the first time it is asked anything.
struct CancellingCompleter {
    token: CancellationToken,
}

#[async_trait]
impl Completer for CancellingCompleter {
    async fn complete(&self, _prompt: &LocatePrompt) -> Result<LocateResponse, SemanticError> {
        self.token.cancel();
        Ok(LocateResponse::not_found())
    }
}

fn orchestrator() -> MatchOrchestrator {
    MatchOrchestrator::new(MatchConfig::default())
}

fn assert_well_formed(results: &[MatchResult], chunks: &[SourceChunk], target: &TargetText) {
    assert_eq!(results.len(), chunks.len());
    for pair in results.windows(2) {
        assert!(pair[0].source_ref < pair[1].source_ref, "results not sorted");
    }
    for r in results {
        assert!(r.start_offset < r.end_offset, "empty span for {}", r.source_ref);
        assert!(r.end_offset <= target.len_chars());
        assert_eq!(r.confidence_tier == ConfidenceTier::Synthetic, r.method.is_synthetic());
        assert_eq!(
            r.validation_warning.is_some(),
            r.confidence_tier == ConfidenceTier::Synthetic
        );
    }
}

#[tokio::test]
async fn exact_chunk_is_found_verbatim() {
    let target = TargetText::new(CHAPTER);
    let chunks = [SourceChunk::new(0, CHAPTER)];
    let results = orchestrator()
        .resolve(&chunks, &target, &Capabilities::none())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].confidence_tier, ConfidenceTier::Exact);
    assert_eq!(results[0].method, MatchMethod::ExactSubstring);
    assert_eq!((results[0].start_offset, results[0].end_offset), (0, 31));
}

#[tokio::test]
async fn reflowed_chunk_is_high_confidence() {
    let target = TargetText::new(CHAPTER);
    let chunks = [SourceChunk::new(0, "Chapter 2 Paragraph text here.")];
    let results = orchestrator()
        .resolve(&chunks, &target, &Capabilities::none())
        .await
        .unwrap();

    assert_eq!(results[0].confidence_tier, ConfidenceTier::High);
    assert_eq!(results[0].method, MatchMethod::NormalizedWhitespace);
    assert_eq!((results[0].start_offset, results[0].end_offset), (0, 31));
}

#[tokio::test]
async fn missing_chunk_is_interpolated_between_neighbours() {
    let target = TargetText::new("First paragraph here. Second paragraph here. Third paragraph here.");
    let chunks = [
        SourceChunk::new(0, "First paragraph here."),
        SourceChunk::new(1, "Something that was cut during rewriting entirely."),
        SourceChunk::new(2, "Third paragraph here."),
    ];
    let results = orchestrator()
        .resolve(&chunks, &target, &Capabilities::none())
        .await
        .unwrap();

    assert_well_formed(&results, &chunks, &target);
    assert_eq!(results[0].confidence_tier, ConfidenceTier::Exact);
    assert_eq!(results[2].confidence_tier, ConfidenceTier::Exact);
    let middle = &results[1];
    assert_eq!(middle.method, MatchMethod::InterpolatedBetween);
    assert_eq!(middle.confidence_tier, ConfidenceTier::Synthetic);
    assert!(middle.start_offset >= results[0].end_offset);
    assert!(middle.end_offset <= results[2].start_offset);
}

#[tokio::test]
async fn unmatched_run_without_anchors_is_proportional() {
    let target = TargetText::new("x".repeat(400));
    let chunks: Vec<SourceChunk> = (0..4)
        .map(|i| SourceChunk::new(i, format!("nothing like the target {i}")))
        .collect();
    let results = orchestrator()
        .resolve(&chunks, &target, &Capabilities::none())
        .await
        .unwrap();

    assert_well_formed(&results, &chunks, &target);
    assert!(results.iter().all(|r| r.method == MatchMethod::Proportional));
    let starts: Vec<usize> = results.iter().map(|r| r.start_offset).collect();
    assert_eq!(starts, vec![0, 100, 200, 300]);
}

#[tokio::test]
async fn input_order_does_not_matter() {
    let target = TargetText::new("Alpha one. Beta two. Gamma three.");
    let chunks = [
        SourceChunk::new(2, "Gamma three."),
        SourceChunk::new(0, "Alpha one."),
        SourceChunk::new(1, "Beta two."),
    ];
    let results = orchestrator()
        .resolve(&chunks, &target, &Capabilities::none())
        .await
        .unwrap();
    let refs: Vec<usize> = results.iter().map(|r| r.source_ref).collect();
    assert_eq!(refs, vec![0, 1, 2]);
    assert!(results.iter().all(|r| r.confidence_tier == ConfidenceTier::Exact));
}

#[tokio::test]
async fn repeated_text_is_matched_in_sequence_order() {
    let target = TargetText::new("Same line.\nSame line.\nSame line.");
    let chunks: Vec<SourceChunk> = (0..3).map(|i| SourceChunk::new(i, "Same line.")).collect();
    let results = orchestrator()
        .resolve(&chunks, &target, &Capabilities::none())
        .await
        .unwrap();
    let starts: Vec<usize> = results.iter().map(|r| r.start_offset).collect();
    assert_eq!(starts, vec![0, 11, 22]);
}

#[tokio::test]
async fn embedder_locates_reworded_chunk() {
    let text = "Alpha beta gamma delta. Copper lantern orchard signal timber. \
                Harbor quill meadow river stone.";
    let target = TargetText::new(text);
    let chunks = [
        SourceChunk::new(0, "Alpha beta gamma delta."),
        SourceChunk::new(1, "timber signal orchard lantern copper"),
        SourceChunk::new(2, "Harbor quill meadow river stone."),
    ];
    let caps = Capabilities::none().with_embedder(Arc::new(StubEmbedder::default()));
    let results = orchestrator().resolve(&chunks, &target, &caps).await.unwrap();

    assert_well_formed(&results, &chunks, &target);
    assert_eq!(results[1].method, MatchMethod::Embedding);
    assert_eq!(results[1].confidence_tier, ConfidenceTier::Medium);
    assert!(results[1].similarity_score.unwrap() >= 0.85);
    assert!(results[1].start_offset >= results[0].end_offset);
    assert!(results[1].end_offset <= results[2].start_offset);
}

#[tokio::test]
async fn completer_locates_what_embeddings_miss() {
    let text = "Intro sentence here. The quick brown fox leaps over a lazy dog. Outro sentence here.";
    let target = TargetText::new(text);
    let chunks = [
        SourceChunk::new(0, "Intro sentence here."),
        SourceChunk::new(1, "The quick brown fox jumps over the lazy dog!!"),
        SourceChunk::new(2, "Outro sentence here."),
    ];
    let completer = Arc::new(FirstWordCompleter {
        calls: AtomicUsize::new(0),
    });
    let config = MatchConfig {
        // Keep the edit-distance strategy out of the way.
        edit_similarity_threshold: 0.99,
        short_content_threshold: 0.99,
        ..Default::default()
    };
    let caps = Capabilities::none().with_completer(completer.clone());
    let results = MatchOrchestrator::new(config)
        .resolve(&chunks, &target, &caps)
        .await
        .unwrap();

    assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(results[1].method, MatchMethod::Assisted);
    assert_eq!(results[1].confidence_tier, ConfidenceTier::High);
    assert_eq!(results[1].start_offset, text.find("The quick").unwrap());
}

#[tokio::test]
async fn capability_failures_fall_through_to_interpolation() {
    let target = TargetText::new("Known opening. Known closing.");
    let chunks = [
        SourceChunk::new(0, "Known opening."),
        SourceChunk::new(1, "absent from the text"),
        SourceChunk::new(2, "Known closing."),
    ];
    let caps = Capabilities::none()
        .with_embedder(Arc::new(Offline))
        .with_completer(Arc::new(Offline));
    let results = orchestrator().resolve(&chunks, &target, &caps).await.unwrap();

    assert_well_formed(&results, &chunks, &target);
    assert_eq!(results[1].method, MatchMethod::InterpolatedBetween);
}

#[tokio::test]
async fn progress_is_reported_after_each_layer() {
    let target = TargetText::new("Known opening. Known closing.");
    let chunks = [
        SourceChunk::new(0, "Known opening."),
        SourceChunk::new(1, "absent from the text"),
    ];
    let progress = Arc::new(RecordingProgress::default());
    let caps = Capabilities::none()
        .with_embedder(Arc::new(Offline))
        .with_progress(progress.clone());
    orchestrator().resolve(&chunks, &target, &caps).await.unwrap();

    assert_eq!(
        progress.snapshot(),
        vec![
            ("deterministic".to_string(), 1, 1),
            ("semantic".to_string(), 0, 1),
            ("interpolation".to_string(), 1, 0),
        ]
    );
}

#[tokio::test]
async fn later_layers_are_skipped_once_everything_resolves() {
    let target = TargetText::new(CHAPTER);
    let chunks = [SourceChunk::new(0, CHAPTER)];
    let caps = Capabilities::none().with_embedder(Arc::new(Offline));
    let report = orchestrator()
        .resolve_with_cancellation(&chunks, &target, &caps, &CancellationToken::new())
        .await
        .unwrap();

    let layers: Vec<&str> = report.stats.layers.iter().map(|l| l.layer.as_str()).collect();
    assert_eq!(layers, vec!["deterministic"]);
    assert!(report.complete);
    assert_eq!(report.stats.tiers.exact, 1);
    assert_eq!(report.stats.reliable_ratio(), 1.0);
}

#[tokio::test]
async fn stats_count_tiers_and_review() {
    let target = TargetText::new("First paragraph here. Second paragraph here.");
    let chunks = [
        SourceChunk::new(0, "First paragraph here."),
        SourceChunk::new(1, "something else entirely, nowhere in the target"),
    ];
    let report = orchestrator()
        .resolve_with_cancellation(&chunks, &target, &Capabilities::none(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.stats.tiers.get(ConfidenceTier::Exact), 1);
    assert_eq!(report.stats.tiers.get(ConfidenceTier::Synthetic), 1);
    assert_eq!(report.stats.needs_review, 1);
    assert_eq!(report.stats.reliable_ratio(), 0.5);
    assert_eq!(report.stats.layers[0].attempted, 2);
    assert_eq!(report.stats.layers[0].resolved, 1);
}

#[tokio::test]
async fn cancelled_before_start_resolves_nothing() {
    let target = TargetText::new(CHAPTER);
    let chunks = [SourceChunk::new(0, CHAPTER), SourceChunk::new(1, "elsewhere")];
    let token = CancellationToken::new();
    token.cancel();
    let report = orchestrator()
        .resolve_with_cancellation(&chunks, &target, &Capabilities::none(), &token)
        .await
        .unwrap();

    assert!(!report.complete);
    assert!(report.results.is_empty());
    assert_eq!(report.unresolved, vec![0, 1]);

    let finished = orchestrator().force_complete(report, &chunks, &target);
    assert!(finished.complete);
    assert_well_formed(&finished.results, &chunks, &target);
    assert!(finished
        .results
        .iter()
        .all(|r| r.confidence_tier == ConfidenceTier::Synthetic));
}

#[tokio::test]
async fn cancellation_between_layers_keeps_earlier_results() {
    let target = TargetText::new("Known opening. Known closing.");
    let chunks = [
        SourceChunk::new(0, "Known opening."),
        SourceChunk::new(1, "absent from the text"),
        SourceChunk::new(2, "Known closing."),
    ];
    let token = CancellationToken::new();
    let caps = Capabilities::none().with_completer(Arc::new(CancellingCompleter {
        token: token.clone(),
    }));
    let report = orchestrator()
        .resolve_with_cancellation(&chunks, &target, &caps, &token)
        .await
        .unwrap();

    assert!(!report.complete);
    assert_eq!(report.unresolved, vec![1]);
    let refs: Vec<usize> = report.results.iter().map(|r| r.source_ref).collect();
    assert_eq!(refs, vec![0, 2]);
    let layers: Vec<&str> = report.stats.layers.iter().map(|l| l.layer.as_str()).collect();
    assert_eq!(layers, vec!["deterministic", "assisted"]);

    let finished = orchestrator().force_complete(report, &chunks, &target);
    assert!(finished.complete);
    assert!(finished.unresolved.is_empty());
    assert_eq!(finished.results[1].method, MatchMethod::InterpolatedBetween);
    assert_eq!(finished.stats.layers.last().unwrap().layer, "interpolation");
    assert_eq!(finished.stats.tiers.total(), 3);
}

#[tokio::test]
async fn force_complete_leaves_complete_report_alone() {
    let target = TargetText::new(CHAPTER);
    let chunks = [SourceChunk::new(0, CHAPTER)];
    let report = orchestrator()
        .resolve_with_cancellation(&chunks, &target, &Capabilities::none(), &CancellationToken::new())
        .await
        .unwrap();
    let again = orchestrator().force_complete(report.clone(), &chunks, &target);
    assert_eq!(again, report);
}

#[tokio::test]
async fn empty_target_is_rejected() {
    let err = orchestrator()
        .resolve(&[SourceChunk::new(0, "x")], &TargetText::new(""), &Capabilities::none())
        .await
        .unwrap_err();
    assert_eq!(err, MatchError::EmptyTarget);
}

#[tokio::test]
async fn duplicate_sequence_index_is_rejected() {
    let chunks = [SourceChunk::new(3, "a"), SourceChunk::new(3, "b")];
    let err = orchestrator()
        .resolve(&chunks, &TargetText::new("a b"), &Capabilities::none())
        .await
        .unwrap_err();
    assert_eq!(err, MatchError::DuplicateSequenceIndex(3));
}

#[tokio::test]
async fn malformed_metadata_is_rejected_before_matching() {
    let progress = Arc::new(RecordingProgress::default());
    let chunk = SourceChunk::new(7, "a").with_metadata(StructuralMetadata {
        bounding_boxes: vec![BoundingBox {
            height: -2.0,
            ..Default::default()
        }],
        ..Default::default()
    });
    let err = orchestrator()
        .resolve(
            &[chunk],
            &TargetText::new("a"),
            &Capabilities::none().with_progress(progress.clone()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::MalformedMetadata { sequence_index: 7, .. }));
    assert!(progress.snapshot().is_empty());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = MatchConfig {
        embedding_similarity_threshold: 2.0,
        ..Default::default()
    };
    let err = MatchOrchestrator::new(config)
        .resolve(&[], &TargetText::new("a"), &Capabilities::none())
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidConfig(_)));
}

#[tokio::test]
async fn no_chunks_is_an_empty_success() {
    let report = orchestrator()
        .resolve_with_cancellation(&[], &TargetText::new("text"), &Capabilities::none(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.results.is_empty());
    assert!(report.complete);
    assert!(report.stats.layers.is_empty());
}

#[tokio::test]
async fn blank_chunk_still_gets_a_result() {
    let target = TargetText::new("Alpha one. Beta two.");
    let chunks = [
        SourceChunk::new(0, "Alpha one."),
        SourceChunk::new(1, "   "),
        SourceChunk::new(2, "Beta two."),
    ];
    let results = orchestrator()
        .resolve(&chunks, &target, &Capabilities::none())
        .await
        .unwrap();
    assert_well_formed(&results, &chunks, &target);
    assert_eq!(results[1].confidence_tier, ConfidenceTier::Synthetic);
}

#[tokio::test]
async fn runs_are_deterministic() {
    let target = TargetText::new(
        "Opening words. A middle sentence that drifted a little. Closing words here.",
    );
    let chunks = [
        SourceChunk::new(0, "Opening words."),
        SourceChunk::new(1, "A middle sentence that drifted slightly."),
        SourceChunk::new(2, "Closing words here."),
        SourceChunk::new(3, "trailing chunk with no home"),
    ];
    let caps = Capabilities::none().with_embedder(Arc::new(StubEmbedder::default()));
    let first = orchestrator().resolve(&chunks, &target, &caps).await.unwrap();
    let second = orchestrator().resolve(&chunks, &target, &caps).await.unwrap();
    assert_eq!(first, second);
    assert_well_formed(&first, &chunks, &target);
}
