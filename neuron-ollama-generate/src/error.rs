//! Error taxonomy for generate calls, plus helpers mapping HTTP/reqwest
//! failures into it.

use std::time::Duration;

use thiserror::Error;

/// Every way a generate call can terminate abnormally.
///
/// All variants are terminal for the in-flight call; the client never retries.
/// Use [`is_retryable`](GenerateError::is_retryable) to decide whether a fresh
/// call is worth attempting.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Request {
        /// Response status.
        status: reqwest::StatusCode,
        /// Response body, as text.
        body: String,
    },

    /// A line of the response body was not a valid frame.
    #[error("invalid frame {line:?}: {source}")]
    Protocol {
        /// The offending line, lossily decoded.
        line: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The server reported an error in a frame.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The body ended before a frame with `done: true` arrived.
    #[error("stream ended after {frames} frame(s) without completing{}", reason_suffix(.reason))]
    IncompleteStream {
        /// Frames decoded before the stream ended.
        frames: usize,
        /// Read failure that closed the stream, if it did not end cleanly.
        reason: Option<String>,
    },

    /// The request could not be sent or no response headers arrived.
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The configured request timeout fired before response headers arrived.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The call was rejected before any I/O.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GenerateError {
    /// Whether a fresh call might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerateError::Request { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            GenerateError::IncompleteStream { .. }
            | GenerateError::Network(_)
            | GenerateError::Timeout(_) => true,
            GenerateError::Protocol { .. }
            | GenerateError::Generation(_)
            | GenerateError::InvalidRequest(_) => false,
        }
    }

    /// Whether the server rejected the request because the model is unknown.
    pub fn is_model_not_found(&self) -> bool {
        matches!(self, GenerateError::Request { status, .. } if *status == reqwest::StatusCode::NOT_FOUND)
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

/// Map a non-success HTTP status (from the Ollama API) to a [`GenerateError`].
///
/// Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md>
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> GenerateError {
    GenerateError::Request {
        status,
        body: body.to_string(),
    }
}

/// Map a [`reqwest::Error`] raised before response headers arrived.
pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Option<Duration>) -> GenerateError {
    match timeout {
        Some(limit) if err.is_timeout() => GenerateError::Timeout(limit),
        _ => GenerateError::Network(Box::new(err)),
    }
}
