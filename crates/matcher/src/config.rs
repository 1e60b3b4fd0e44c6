use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::MatchError;

/// Every threshold and bound the cascade uses.
///
/// `MatchConfig` is serde-friendly so it can sit in a YAML file; missing
/// fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    // --- Layer 1: deterministic ---
    /// Length of each triangulation fragment, in chars.
    pub fragment_chars: usize,
    /// Fragments (of three) that must be found for triangulation to succeed.
    pub triangulation_min_fragments: usize,
    /// Allowed relative deviation between found and expected fragment spacing.
    pub triangulation_spacing_tolerance: f64,
    /// Edit similarity a window must exceed to be accepted.
    pub edit_similarity_threshold: f64,
    /// Content shorter than this uses `short_content_threshold` instead.
    pub short_content_chars: usize,
    pub short_content_threshold: f64,
    /// Longer content skips the edit-distance strategy.
    pub edit_max_chars: usize,
    /// Upper bound on windows scored per chunk; the step widens to fit.
    pub edit_max_windows: usize,
    /// Region after the hint: `max(min_search_window_chars, factor × len × gap)`.
    pub search_window_factor: f64,
    pub min_search_window_chars: usize,

    // --- Layer 2: embeddings ---
    pub embedding_similarity_threshold: f64,
    /// Share of each window overlapping the next.
    pub window_overlap_ratio: f64,

    // --- Layer 3: assisted ---
    pub assisted_similarity_threshold: f64,
    pub assisted_max_concurrency: usize,
    /// Radius around the proportional estimate when neighbours are missing.
    pub assisted_radius_chars: usize,
    /// Anchor gaps wider than this fall back to the radius window.
    pub assisted_max_window_chars: usize,

    /// Timeout for each embedding or completion call, in milliseconds.
    #[serde(with = "semantic::serde_millis")]
    pub capability_timeout: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            fragment_chars: 100,
            triangulation_min_fragments: 2,
            triangulation_spacing_tolerance: 0.3,
            edit_similarity_threshold: 0.75,
            short_content_chars: 50,
            short_content_threshold: 0.90,
            edit_max_chars: 2000,
            edit_max_windows: 400,
            search_window_factor: 3.0,
            min_search_window_chars: 2000,
            embedding_similarity_threshold: 0.85,
            window_overlap_ratio: 0.5,
            assisted_similarity_threshold: 0.7,
            assisted_max_concurrency: 4,
            assisted_radius_chars: 3000,
            assisted_max_window_chars: 12_000,
            capability_timeout: Duration::from_secs(30),
        }
    }
}

impl MatchConfig {
    /// Reject configurations no run could use.
    pub fn validate(&self) -> Result<(), MatchError> {
        fn unit(name: &str, value: f64) -> Result<(), MatchError> {
            if !(0.0..=1.0).contains(&value) {
                return Err(MatchError::InvalidConfig(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
            Ok(())
        }
        fn positive(name: &str, value: usize) -> Result<(), MatchError> {
            if value == 0 {
                return Err(MatchError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
            Ok(())
        }

        positive("fragment_chars", self.fragment_chars)?;
        if !(1..=3).contains(&self.triangulation_min_fragments) {
            return Err(MatchError::InvalidConfig(
                "triangulation_min_fragments must be 1, 2 or 3".into(),
            ));
        }
        unit(
            "triangulation_spacing_tolerance",
            self.triangulation_spacing_tolerance,
        )?;
        unit("edit_similarity_threshold", self.edit_similarity_threshold)?;
        unit("short_content_threshold", self.short_content_threshold)?;
        positive("edit_max_chars", self.edit_max_chars)?;
        positive("edit_max_windows", self.edit_max_windows)?;
        if !self.search_window_factor.is_finite() || self.search_window_factor < 1.0 {
            return Err(MatchError::InvalidConfig(
                "search_window_factor must be >= 1.0".into(),
            ));
        }
        positive("min_search_window_chars", self.min_search_window_chars)?;
        unit(
            "embedding_similarity_threshold",
            self.embedding_similarity_threshold,
        )?;
        if !(0.0..1.0).contains(&self.window_overlap_ratio) {
            return Err(MatchError::InvalidConfig(
                "window_overlap_ratio must be in [0.0, 1.0)".into(),
            ));
        }
        unit(
            "assisted_similarity_threshold",
            self.assisted_similarity_threshold,
        )?;
        positive("assisted_max_concurrency", self.assisted_max_concurrency)?;
        positive("assisted_radius_chars", self.assisted_radius_chars)?;
        positive("assisted_max_window_chars", self.assisted_max_window_chars)?;
        if self.capability_timeout.is_zero() {
            return Err(MatchError::InvalidConfig(
                "capability_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Threshold for a chunk of `len` chars.
    pub(crate) fn edit_threshold_for(&self, len: usize) -> f64 {
        if len < self.short_content_chars {
            self.edit_similarity_threshold.max(self.short_content_threshold)
        } else {
            self.edit_similarity_threshold
        }
    }

    /// Bounded region length after the search hint.
    pub(crate) fn search_region_len(&self, content_len: usize, gap: usize) -> usize {
        let scaled = self.search_window_factor * content_len as f64 * gap.max(1) as f64;
        (scaled.ceil() as usize).max(self.min_search_window_chars)
    }
}
