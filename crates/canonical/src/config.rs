//! Configuration for comparison-only normalization.
//!
//! Normalization never touches the authoritative text. It produces a folded
//! copy plus a map back to the original character offsets, and
//! [`NormalizeConfig`] decides how aggressive that folding is.
//!
//! Two presets cover the matcher's needs:
//!
//! ```rust
//! use canonical::NormalizeConfig;
//!
//! let ws = NormalizeConfig::whitespace_only();
//! assert!(!ws.lowercase);
//!
//! let aggressive = NormalizeConfig::aggressive();
//! assert!(aggressive.fold_quotes && aggressive.join_hyphenation);
//! ```

use serde::{Deserialize, Serialize};

/// Switches for each folding step.
///
/// Whitespace collapsing is always applied: every run of Unicode whitespace
/// becomes one ASCII space and the result is trimmed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizeConfig {
    /// Map every straight, curly and low-9 quote mark to `"`.
    pub fold_quotes: bool,
    /// Map hyphen, en/em dash, horizontal bar and minus sign to `-`.
    pub fold_dashes: bool,
    /// Drop soft hyphens and join words split as `exam-\nple`.
    pub join_hyphenation: bool,
    /// Drop whitespace that sits directly before `, . ! ? ; :`.
    pub tighten_punctuation: bool,
    /// Apply NFKC to each character (ligatures, full-width forms).
    pub unicode_compat: bool,
    /// Locale-free lowercase.
    pub lowercase: bool,
}

impl NormalizeConfig {
    /// Collapse whitespace and nothing else.
    pub const fn whitespace_only() -> Self {
        Self {
            fold_quotes: false,
            fold_dashes: false,
            join_hyphenation: false,
            tighten_punctuation: false,
            unicode_compat: false,
            lowercase: false,
        }
    }

    /// Everything on. Used when a cleanup pass may have rewritten typography.
    pub const fn aggressive() -> Self {
        Self {
            fold_quotes: true,
            fold_dashes: true,
            join_hyphenation: true,
            tighten_punctuation: true,
            unicode_compat: true,
            lowercase: true,
        }
    }

    /// True when the config does more than collapse whitespace.
    pub fn is_aggressive(&self) -> bool {
        *self != Self::whitespace_only()
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self::whitespace_only()
    }
}
