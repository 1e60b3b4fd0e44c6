//! Realign text preprocessing layer.
//!
//! Every matching layer compares a source chunk against the authoritative
//! target text. This crate owns everything about that text that is not
//! matching itself:
//!
//! - a char-indexed view ([`TargetText`]) so offsets are Unicode scalar
//!   offsets, never bytes
//! - comparison-only normalization that folds whitespace and, optionally,
//!   typography, while keeping a map back to the original offsets
//! - edit-distance similarity used for fuzzy acceptance
//! - sentence and paragraph boundaries for tidying up window-shaped matches
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock calls, no locale dependence. The same text and config
//! give the same folded output and offset map on any machine.
//!
//! ## Invariants worth knowing
//!
//! - The authoritative text is never rewritten; folding produces a copy.
//! - Any span reported from folded text maps back to `0 <= start < end <= len`
//!   in the original.

mod boundary;
mod config;
mod error;
mod punctuation;
mod similarity;
mod text;
mod whitespace;

pub use crate::boundary::BoundaryIndex;
pub use crate::config::NormalizeConfig;
pub use crate::error::TextError;
pub use crate::similarity::{edit_similarity, edit_similarity_at_least};
pub use crate::text::TargetText;
pub use crate::whitespace::{collapse_whitespace, fold_chars, normalize_str, NormalizedText};
