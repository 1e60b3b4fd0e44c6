//! Whitespace collapsing and offset-preserving folding.
//!
//! [`collapse_whitespace`] is the plain string form. [`fold_chars`] does the
//! same job (plus the optional punctuation folds from [`NormalizeConfig`])
//! while remembering, for every folded char, which span of the original text
//! produced it. That span map is what lets a match found in folded text be
//! reported as offsets into the authoritative text.
//!
//! ```rust
//! use canonical::{NormalizeConfig, TargetText};
//!
//! let target = TargetText::new("Chapter  2\n\n  Paragraph text");
//! let folded = target.normalized(0, target.len_chars(), &NormalizeConfig::whitespace_only());
//! assert_eq!(folded.as_str(), "Chapter 2 Paragraph text");
//!
//! let (start, end) = folded.find_source_span("2 Paragraph", 0).unwrap();
//! assert_eq!(target.slice(start, end), "2\n\n  Paragraph");
//! ```

use unicode_normalization::UnicodeNormalization;

use crate::config::NormalizeConfig;
use crate::punctuation::{fold_dash, fold_quote, is_soft_hyphen, is_tight_punctuation};

/// Collapses repeated whitespace to single spaces and trims the edges.
///
/// ```rust
/// use canonical::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  hello \t\n world  "), "hello world");
/// assert_eq!(collapse_whitespace("   "), "");
/// ```
pub fn collapse_whitespace(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for segment in text.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(segment);
    }
    normalized
}

/// Fold a standalone string. Same rules as [`fold_chars`] without the map.
pub fn normalize_str(text: &str, cfg: &NormalizeConfig) -> String {
    if !cfg.is_aggressive() {
        return collapse_whitespace(text);
    }
    fold_chars(text.chars().enumerate(), cfg).text
}

/// Folded text plus the original span behind each folded char.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    text: String,
    /// Byte offset of each folded char, plus `text.len()`.
    char_bytes: Vec<usize>,
    /// Original `[start, end)` char span per folded char.
    spans: Vec<(usize, usize)>,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Find `needle` at or after folded char `from`; returns the folded char
    /// offset of the match.
    pub fn find(&self, needle: &str, from: usize) -> Option<usize> {
        if needle.is_empty() || from >= self.len_chars() {
            return None;
        }
        let from_byte = self.char_bytes[from];
        self.text[from_byte..].find(needle).map(|byte| {
            let absolute = from_byte + byte;
            self.char_bytes
                .binary_search(&absolute)
                .unwrap_or_else(|idx| idx.saturating_sub(1))
        })
    }

    /// Original span covered by folded chars `start..end`.
    pub fn source_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end || end > self.len_chars() {
            return None;
        }
        Some((self.spans[start].0, self.spans[end - 1].1))
    }

    /// Find `needle` and translate the hit to an original span.
    pub fn find_source_span(&self, needle: &str, from: usize) -> Option<(usize, usize)> {
        let start = self.find(needle, from)?;
        self.source_span(start, start + needle.chars().count())
    }

    /// First folded char whose original span starts at or after `offset`.
    pub fn folded_index_at(&self, offset: usize) -> usize {
        self.spans.partition_point(|&(start, _)| start < offset)
    }

    fn push(&mut self, c: char, span: (usize, usize)) {
        self.char_bytes.push(self.text.len());
        self.text.push(c);
        self.spans.push(span);
    }

    fn finish(mut self) -> Self {
        self.char_bytes.push(self.text.len());
        self
    }
}

/// Fold `(original_offset, char)` pairs according to `cfg`.
///
/// Offsets must be increasing; they need not start at zero, which lets callers
/// fold a region of a larger text and keep absolute offsets.
pub fn fold_chars<I>(chars: I, cfg: &NormalizeConfig) -> NormalizedText
where
    I: IntoIterator<Item = (usize, char)>,
{
    let input: Vec<(usize, char)> = chars.into_iter().collect();
    let mut out = NormalizedText::default();
    let mut pending_space: Option<(usize, usize)> = None;
    let mut i = 0;

    while i < input.len() {
        let (offset, raw) = input[i];

        if cfg.join_hyphenation && is_soft_hyphen(raw) {
            i += 1;
            continue;
        }

        if raw.is_whitespace() {
            let run_end = whitespace_run_end(&input, i);
            let span = (offset, input[run_end - 1].0 + 1);
            pending_space = Some(match pending_space {
                Some((start, _)) => (start, span.1),
                None => span,
            });
            i = run_end;
            continue;
        }

        let dash_like = raw == '-' || (cfg.fold_dashes && fold_dash(raw) == '-');
        if cfg.join_hyphenation && dash_like && pending_space.is_none() {
            let prev_alnum = i > 0 && input[i - 1].1.is_alphanumeric();
            let run_end = whitespace_run_end(&input, i + 1);
            let next_alnum = run_end > i + 1
                && input.get(run_end).is_some_and(|&(_, c)| c.is_alphanumeric());
            if prev_alnum && next_alnum {
                i = run_end;
                continue;
            }
        }

        if let Some(span) = pending_space.take() {
            let tight = cfg.tighten_punctuation && is_tight_punctuation(raw);
            if !out.is_empty() && !tight {
                out.push(' ', span);
            }
        }

        let mut c = raw;
        if cfg.fold_quotes {
            c = fold_quote(c);
        }
        if cfg.fold_dashes {
            c = fold_dash(c);
        }
        let span = (offset, offset + 1);
        if cfg.unicode_compat {
            for compat in std::iter::once(c).nfkc() {
                push_cased(&mut out, compat, span, cfg.lowercase);
            }
        } else {
            push_cased(&mut out, c, span, cfg.lowercase);
        }
        i += 1;
    }

    out.finish()
}

fn push_cased(out: &mut NormalizedText, c: char, span: (usize, usize), lowercase: bool) {
    if c.is_whitespace() {
        // NFKC can turn e.g. NBSP-like compat chars into plain spaces.
        if !out.is_empty() && !out.text.ends_with(' ') {
            out.push(' ', span);
        }
        return;
    }
    if lowercase {
        for lower in c.to_lowercase() {
            out.push(lower, span);
        }
    } else {
        out.push(c, span);
    }
}

fn whitespace_run_end(input: &[(usize, char)], from: usize) -> usize {
    let mut end = from;
    while end < input.len() && input[end].1.is_whitespace() {
        end += 1;
    }
    end
}
