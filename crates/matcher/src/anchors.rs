//! Resolved results, ordered by sequence index, used as positional evidence
//! for the chunks still pending.

use std::collections::BTreeMap;

use crate::types::{ConfidenceTier, MatchResult};

/// The positional part of a resolved result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub sequence_index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub confidence_tier: ConfidenceTier,
}

impl From<&MatchResult> for Anchor {
    fn from(result: &MatchResult) -> Self {
        Self {
            sequence_index: result.source_ref,
            start_offset: result.start_offset,
            end_offset: result.end_offset,
            confidence_tier: result.confidence_tier,
        }
    }
}

/// Where a chunk's bounded search starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHint {
    /// End offset of the nearest preceding anchor, or 0.
    pub from: usize,
    /// Sequence distance to that anchor; `None` when there is none.
    pub gap: Option<usize>,
}

/// Append-only map from sequence index to anchor.
#[derive(Debug, Clone, Default)]
pub struct AnchorSet {
    anchors: BTreeMap<usize, Anchor>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result. Returns false, leaving the existing anchor untouched,
    /// when the sequence index is already anchored.
    pub fn insert(&mut self, result: &MatchResult) -> bool {
        if self.anchors.contains_key(&result.source_ref) {
            return false;
        }
        self.anchors.insert(result.source_ref, Anchor::from(result));
        true
    }

    pub fn extend<'a>(&mut self, results: impl IntoIterator<Item = &'a MatchResult>) {
        for result in results {
            self.insert(result);
        }
    }

    pub fn contains(&self, sequence_index: usize) -> bool {
        self.anchors.contains_key(&sequence_index)
    }

    pub fn get(&self, sequence_index: usize) -> Option<&Anchor> {
        self.anchors.get(&sequence_index)
    }

    /// Closest anchor with a strictly smaller sequence index.
    pub fn nearest_before(&self, sequence_index: usize) -> Option<&Anchor> {
        self.anchors.range(..sequence_index).next_back().map(|(_, a)| a)
    }

    /// Closest anchor with a strictly larger sequence index.
    pub fn nearest_after(&self, sequence_index: usize) -> Option<&Anchor> {
        self.anchors
            .range(sequence_index.saturating_add(1)..)
            .next()
            .map(|(_, a)| a)
    }

    pub fn search_hint(&self, sequence_index: usize) -> SearchHint {
        match self.nearest_before(sequence_index) {
            Some(anchor) => SearchHint {
                from: anchor.end_offset,
                gap: Some(sequence_index - anchor.sequence_index),
            },
            None => SearchHint { from: 0, gap: None },
        }
    }

    /// Mean anchored span length in chars.
    pub fn average_len(&self) -> Option<f64> {
        if self.anchors.is_empty() {
            return None;
        }
        let total: usize = self
            .anchors
            .values()
            .map(|a| a.end_offset.saturating_sub(a.start_offset))
            .sum();
        Some(total as f64 / self.anchors.len() as f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}
