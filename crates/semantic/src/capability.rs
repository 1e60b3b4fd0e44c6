//! Injected capabilities consumed by the matching cascade.
//!
//! The matcher never constructs an HTTP client itself. Callers hand it
//! trait objects; a missing capability simply disables the layer that
//! needs it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::SemanticError;

/// Produces a fixed-dimension vector for a piece of text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError>;

    /// Embed several texts, preserving order. The default issues one
    /// request per text; HTTP clients override it with a single call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Answers "where inside this window does this content appear?".
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &LocatePrompt) -> Result<LocateResponse, SemanticError>;
}

/// A locate request: the chunk content and the bounded target window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatePrompt {
    pub content: String,
    pub window: String,
}

impl LocatePrompt {
    pub fn new(content: impl Into<String>, window: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            window: window.into(),
        }
    }

    pub fn system_message(&self) -> &'static str {
        "You locate passages inside a document. The passage may have been \
         lightly rewritten: whitespace, punctuation and wording can differ. \
         Offsets are character offsets into the WINDOW text, counted from 0, \
         end exclusive. Reply with JSON only: \
         {\"found\": bool, \"start_offset\": int|null, \"end_offset\": int|null}."
    }

    pub fn user_message(&self) -> String {
        format!(
            "PASSAGE:\n<<<\n{}\n>>>\n\nWINDOW ({} characters):\n<<<\n{}\n>>>\n\n\
             Does the passage appear in the window? If so, give its start and end offsets.",
            self.content,
            self.window.chars().count(),
            self.window
        )
    }
}

/// Completer answer. Offsets are window-relative chars.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocateResponse {
    pub found: bool,
    #[serde(default)]
    pub start_offset: Option<usize>,
    #[serde(default)]
    pub end_offset: Option<usize>,
}

impl LocateResponse {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn found(start: usize, end: usize) -> Self {
        Self {
            found: true,
            start_offset: Some(start),
            end_offset: Some(end),
        }
    }

    /// `(start, end)` when the answer claims a hit with both offsets.
    pub fn span(&self) -> Option<(usize, usize)> {
        if !self.found {
            return None;
        }
        Some((self.start_offset?, self.end_offset?))
    }
}
