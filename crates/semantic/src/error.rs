use thiserror::Error;

/// Errors surfaced by embedding and completion capabilities.
///
/// The matcher treats every variant as a miss for the chunk in question;
/// none of them abort a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SemanticError {
    /// Configuration is inconsistent (missing URL, zero timeout, ...).
    #[error("invalid semantic config: {0}")]
    InvalidConfig(String),
    /// Transport-level failure: DNS, connect, reset.
    #[error("http request failed: {0}")]
    Http(String),
    /// The service answered with a non-success status.
    #[error("http error {status}: {body}")]
    Status { status: u16, body: String },
    /// The request did not finish in time.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The body parsed but did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Requests are being short-circuited after repeated failures.
    #[error("circuit breaker is open for '{0}'")]
    CircuitOpen(String),
    /// The capability cannot serve this request at all.
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

impl SemanticError {
    /// Transient failures worth another attempt: timeouts, transport errors,
    /// 429 and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            SemanticError::Timeout(_) | SemanticError::Http(_) => true,
            SemanticError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SemanticError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SemanticError::Timeout(err.to_string())
        } else if err.is_decode() {
            SemanticError::MalformedResponse(err.to_string())
        } else {
            SemanticError::Http(err.to_string())
        }
    }
}
