use thiserror::Error;

/// Errors raised by the text preprocessing layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("target text is empty")]
    EmptyInput,
    #[error("char range {start}..{end} is invalid for text of {len} chars")]
    InvalidRange { start: usize, end: usize, len: usize },
}
