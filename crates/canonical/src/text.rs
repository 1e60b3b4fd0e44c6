//! Character-indexed view over the authoritative target text.
//!
//! Every offset that leaves this crate is a character (Unicode scalar value)
//! offset. Rust strings are indexed by bytes, so [`TargetText`] keeps a
//! byte offset per character and converts in both directions.

use crate::config::NormalizeConfig;
use crate::error::TextError;
use crate::whitespace::{fold_chars, NormalizedText};

/// Immutable target text with O(1) char→byte and O(log n) byte→char lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetText {
    text: String,
    /// Byte offset of each char, plus a trailing entry equal to `text.len()`.
    byte_offsets: Vec<usize>,
}

impl TargetText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut byte_offsets: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        byte_offsets.push(text.len());
        Self { text, byte_offsets }
    }

    /// Like [`TargetText::new`] but rejects empty input.
    pub fn try_new(text: impl Into<String>) -> Result<Self, TextError> {
        let target = Self::new(text);
        if target.is_empty() {
            return Err(TextError::EmptyInput);
        }
        Ok(target)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in chars.
    pub fn len_chars(&self) -> usize {
        self.byte_offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Byte offset of `char_idx`, clamped to the end of the text.
    pub fn byte_offset(&self, char_idx: usize) -> usize {
        self.byte_offsets[char_idx.min(self.len_chars())]
    }

    /// Char offset of a byte position. Positions inside a multi-byte char
    /// resolve to that char.
    pub fn char_offset(&self, byte_idx: usize) -> usize {
        match self.byte_offsets.binary_search(&byte_idx) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    /// Substring for a char range; both bounds are clamped.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let end = end.min(self.len_chars());
        let start = start.min(end);
        &self.text[self.byte_offset(start)..self.byte_offset(end)]
    }

    /// Substring for a char range, rejecting out-of-bounds or inverted ranges.
    pub fn try_slice(&self, start: usize, end: usize) -> Result<&str, TextError> {
        if start > end || end > self.len_chars() {
            return Err(TextError::InvalidRange {
                start,
                end,
                len: self.len_chars(),
            });
        }
        Ok(self.slice(start, end))
    }

    /// Find `needle` verbatim, starting at or after char `from` and ending at
    /// or before char `to`. Returns the char offset of the match start.
    pub fn find_in(&self, needle: &str, from: usize, to: usize) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        let to = to.min(self.len_chars());
        if from >= to {
            return None;
        }
        let region = self.slice(from, to);
        region
            .find(needle)
            .map(|byte| self.char_offset(self.byte_offset(from) + byte))
    }

    /// Fold the char range `start..end` for comparison. The returned text maps
    /// every folded char back to absolute offsets in this target.
    pub fn normalized(&self, start: usize, end: usize, cfg: &NormalizeConfig) -> NormalizedText {
        let end = end.min(self.len_chars());
        let start = start.min(end);
        let chars = self.slice(start, end).chars().enumerate().map(|(i, c)| (start + i, c));
        fold_chars(chars, cfg)
    }
}

impl From<&str> for TargetText {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TargetText {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
