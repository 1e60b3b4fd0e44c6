use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One previously extracted segment of the source document.
///
/// Chunks are read-only inputs; `sequence_index` defines document order and
/// must be unique within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceChunk {
    pub sequence_index: usize,
    pub content: String,
    #[serde(default)]
    pub structural_metadata: StructuralMetadata,
}

impl SourceChunk {
    pub fn new(sequence_index: usize, content: impl Into<String>) -> Self {
        Self {
            sequence_index,
            content: content.into(),
            structural_metadata: StructuralMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: StructuralMetadata) -> Self {
        self.structural_metadata = metadata;
        self
    }

    /// Content length in chars.
    pub fn content_chars(&self) -> usize {
        self.content.chars().count()
    }

    /// True when there is nothing to search for.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Structure captured against the original document. Carried through
/// untouched; only validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StructuralMetadata {
    /// Headings from the outermost section down to the chunk's own.
    pub heading_path: Vec<String>,
    pub heading_level: Option<u32>,
    pub page_start: Option<u32>,
    pub page_end: Option<u32>,
    pub bounding_boxes: Vec<BoundingBox>,
    pub section_marker: Option<String>,
}

impl StructuralMetadata {
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.page_start, self.page_end) {
            if start > end {
                return Err(format!("page_start {start} is after page_end {end}"));
            }
        }
        if self.heading_level.is_some() && self.heading_path.is_empty() {
            return Err("heading_level is set but heading_path is empty".into());
        }
        for (i, bbox) in self.bounding_boxes.iter().enumerate() {
            bbox.validate().map_err(|reason| format!("bounding_boxes[{i}]: {reason}"))?;
        }
        Ok(())
    }
}

/// Page-space rectangle, origin at the page's top-left corner.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    fn validate(&self) -> Result<(), String> {
        let fields = [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(format!("{name} is not finite"));
            }
            if value < 0.0 {
                return Err(format!("{name} is negative ({value})"));
            }
        }
        Ok(())
    }
}

/// How much a result can be trusted. Ordered: `Synthetic < Medium < High < Exact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Position estimated from neighbours; the text was not found.
    Synthetic,
    /// Fuzzy evidence (edit distance, embeddings).
    Medium,
    /// Located after normalization, triangulation or assisted validation.
    High,
    /// Verbatim substring.
    Exact,
}

impl ConfidenceTier {
    pub const ALL: [ConfidenceTier; 4] = [
        ConfidenceTier::Exact,
        ConfidenceTier::High,
        ConfidenceTier::Medium,
        ConfidenceTier::Synthetic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Exact => "exact",
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Synthetic => "synthetic",
        }
    }
}

/// Strategy that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExactSubstring,
    NormalizedWhitespace,
    NormalizedAggressive,
    MultiAnchor,
    EditDistance,
    Embedding,
    Assisted,
    InterpolatedBetween,
    ExtrapolatedForward,
    ExtrapolatedBackward,
    Proportional,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::ExactSubstring => "exact_substring",
            MatchMethod::NormalizedWhitespace => "normalized_whitespace",
            MatchMethod::NormalizedAggressive => "normalized_aggressive",
            MatchMethod::MultiAnchor => "multi_anchor",
            MatchMethod::EditDistance => "edit_distance",
            MatchMethod::Embedding => "embedding",
            MatchMethod::Assisted => "assisted",
            MatchMethod::InterpolatedBetween => "interpolated_between",
            MatchMethod::ExtrapolatedForward => "extrapolated_forward",
            MatchMethod::ExtrapolatedBackward => "extrapolated_backward",
            MatchMethod::Proportional => "proportional",
        }
    }

    /// True for the Layer 4 estimators.
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            MatchMethod::InterpolatedBetween
                | MatchMethod::ExtrapolatedForward
                | MatchMethod::ExtrapolatedBackward
                | MatchMethod::Proportional
        )
    }
}

/// Where one chunk landed in the target text. Offsets are chars, end exclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    /// `sequence_index` of the chunk this result belongs to.
    pub source_ref: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub confidence_tier: ConfidenceTier,
    pub method: MatchMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    /// Set only on `Synthetic` results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_warning: Option<String>,
}

impl MatchResult {
    pub fn located(
        source_ref: usize,
        start_offset: usize,
        end_offset: usize,
        confidence_tier: ConfidenceTier,
        method: MatchMethod,
    ) -> Self {
        Self {
            source_ref,
            start_offset,
            end_offset,
            confidence_tier,
            method,
            similarity_score: None,
            validation_warning: None,
        }
    }

    pub fn synthetic(
        source_ref: usize,
        start_offset: usize,
        end_offset: usize,
        method: MatchMethod,
        warning: impl Into<String>,
    ) -> Self {
        Self {
            source_ref,
            start_offset,
            end_offset,
            confidence_tier: ConfidenceTier::Synthetic,
            method,
            similarity_score: None,
            validation_warning: Some(warning.into()),
        }
    }

    pub fn with_similarity(mut self, score: f64) -> Self {
        self.similarity_score = Some(score);
        self
    }

    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Medium` and `Synthetic` results should be looked at by a person.
    pub fn needs_review(&self) -> bool {
        self.confidence_tier <= ConfidenceTier::Medium
    }
}

/// Errors produced by the matching layer. All of them are raised before any
/// layer runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("target text is empty")]
    EmptyTarget,
    #[error("duplicate sequence_index {0}")]
    DuplicateSequenceIndex(usize),
    #[error("malformed metadata on chunk {sequence_index}: {reason}")]
    MalformedMetadata { sequence_index: usize, reason: String },
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
}
