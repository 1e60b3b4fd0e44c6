use std::sync::Arc;

use realign::{
    Capabilities, MatchOrchestrator, RealignConfig, SourceChunk, StubEmbedder, TargetText,
    parse_chunks, realign_document,
};
use tokio_util::sync::CancellationToken;

fn fixture() -> (TargetText, Vec<SourceChunk>) {
    let target = TargetText::new(
        "Section one opens the report.\n\nSection   two\nwas reflowed.\n\n\
         Section three was rewritten beyond recognition.\n\nSection four closes it.",
    );
    let chunks = vec![
        SourceChunk::new(0, "Section one opens the report."),
        SourceChunk::new(1, "Section two was reflowed."),
        SourceChunk::new(2, "An entirely different third section."),
        SourceChunk::new(3, "A fourth paragraph that vanished."),
        SourceChunk::new(4, "Section four closes it."),
    ];
    (target, chunks)
}

#[tokio::test]
async fn repeated_runs_produce_identical_results() {
    let (target, chunks) = fixture();
    let caps = Capabilities::none().with_embedder(Arc::new(StubEmbedder::default()));
    let orchestrator = MatchOrchestrator::default();

    let first = orchestrator.resolve(&chunks, &target, &caps).await.unwrap();
    for _ in 0..5 {
        let again = orchestrator.resolve(&chunks, &target, &caps).await.unwrap();
        assert_eq!(first, again);
    }
}

#[tokio::test]
async fn input_order_does_not_change_results() {
    let (target, chunks) = fixture();
    let mut reversed = chunks.clone();
    reversed.reverse();

    let orchestrator = MatchOrchestrator::default();
    let forward = orchestrator
        .resolve(&chunks, &target, &Capabilities::none())
        .await
        .unwrap();
    let backward = orchestrator
        .resolve(&reversed, &target, &Capabilities::none())
        .await
        .unwrap();
    assert_eq!(forward, backward);
}

#[tokio::test]
async fn json_round_trip_gives_same_report_results() {
    let (target, chunks) = fixture();
    let json = serde_json::to_string(&chunks).unwrap();
    let parsed = parse_chunks(&json).unwrap();
    assert_eq!(parsed, chunks);

    let config = RealignConfig::default();
    let cancel = CancellationToken::new();
    let a = realign_document(&config, &chunks, target.as_str(), None, &cancel)
        .await
        .unwrap();
    let b = realign_document(&config, &parsed, target.as_str(), None, &cancel)
        .await
        .unwrap();
    assert_eq!(a.results, b.results);
    assert_eq!(a.stats.tiers, b.stats.tiers);
}
