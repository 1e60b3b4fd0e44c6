//! Sentence and paragraph boundaries, used to tidy up window-shaped matches.

use unicode_segmentation::UnicodeSegmentation;

use crate::text::TargetText;

/// Sorted char offsets where sentences (and paragraphs) start and end.
///
/// Built once per target with UAX #29 sentence segmentation; paragraph breaks
/// are sentence breaks under that algorithm, so both come out of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryIndex {
    starts: Vec<usize>,
    ends: Vec<usize>,
}

impl BoundaryIndex {
    pub fn build(target: &TargetText) -> Self {
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        for (byte, sentence) in target.as_str().split_sentence_bound_indices() {
            let trimmed_start = sentence.len() - sentence.trim_start().len();
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                continue;
            }
            let start_byte = byte + trimmed_start;
            starts.push(target.char_offset(start_byte));
            ends.push(target.char_offset(start_byte + trimmed.len()));
        }
        Self { starts, ends }
    }

    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn ends(&self) -> &[usize] {
        &self.ends
    }

    /// Earliest sentence start in `lo..=hi`.
    pub fn first_start_in(&self, lo: usize, hi: usize) -> Option<usize> {
        let idx = self.starts.partition_point(|&s| s < lo);
        self.starts.get(idx).copied().filter(|&s| s <= hi)
    }

    /// Latest sentence end in `lo..=hi`.
    pub fn last_end_in(&self, lo: usize, hi: usize) -> Option<usize> {
        let idx = self.ends.partition_point(|&e| e <= hi);
        idx.checked_sub(1)
            .map(|i| self.ends[i])
            .filter(|&e| e >= lo)
    }

    /// Shrink `start..end` so it begins at a sentence start in its first half
    /// and finishes at a sentence end in its second half. Sides with no
    /// boundary in range are left alone.
    pub fn snap(&self, start: usize, end: usize) -> (usize, usize) {
        if end <= start {
            return (start, end);
        }
        let half = (end - start) / 2;
        let snapped_start = self.first_start_in(start, start + half).unwrap_or(start);
        let snapped_end = self
            .last_end_in(end - half, end)
            .filter(|&e| e > snapped_start)
            .unwrap_or(end);
        (snapped_start, snapped_end)
    }
}
