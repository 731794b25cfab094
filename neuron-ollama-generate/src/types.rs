//! Ollama `/api/generate` request/response types.
//!
//! Key differences from `/api/chat`:
//! - A single `prompt` string instead of a message list
//! - Conversation state is an opaque `context` array returned on the final
//!   frame and sent back verbatim on the next request
//! - Each streamed frame carries its text in `response`, not `message.content`

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GenerateOptions;

/// Opaque conversation state returned by the server on completion.
///
/// The client never interprets the values. Pass it unchanged into the next
/// request to continue the conversation, or drop it to start over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Vec<i64>);

impl Context {
    /// An empty context, used for a fresh conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this context carries no history.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of entries in the context.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Borrow the raw values.
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Consume the context, returning the raw values.
    pub fn into_inner(self) -> Vec<i64> {
        self.0
    }
}

impl From<Vec<i64>> for Context {
    fn from(values: Vec<i64>) -> Self {
        Self(values)
    }
}

/// Ollama `/api/generate` request body.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "mistral:7b-instruct").
    pub model: String,
    /// Prompt text. Never empty.
    pub prompt: String,
    /// Context from a previous completion. Always serialized, `[]` when empty.
    pub context: Context,
    /// Whether to stream the response. Always `true` for this client.
    pub stream: bool,
    /// System prompt overriding the one defined in the model file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// How long to keep the model loaded in memory (e.g. "5m", "0").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
    /// Sampling and runtime options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// One decoded line of the `/api/generate` NDJSON stream.
///
/// ```text
/// {"model":"llama3.2","response":"Hel","done":false}
/// {"model":"llama3.2","response":"","done":true,"context":[1,2,3],"eval_count":2}
/// {"error":"model 'foo' not found"}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateFrame {
    /// Model that produced the frame.
    #[serde(default)]
    pub model: Option<String>,
    /// Text generated since the previous frame. May be empty.
    #[serde(default)]
    pub response: String,
    /// Whether this is the terminal frame.
    #[serde(default)]
    pub done: bool,
    /// Why generation stopped (e.g. "stop", "length"). Terminal frame only.
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Conversation context. Terminal frame only.
    #[serde(default)]
    pub context: Option<Context>,
    /// Server-reported failure.
    #[serde(default)]
    pub error: Option<String>,
    /// Total time spent on the request in nanoseconds.
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Time spent loading the model in nanoseconds.
    #[serde(default)]
    pub load_duration: Option<u64>,
    /// Number of tokens in the prompt.
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Time spent evaluating the prompt in nanoseconds.
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    /// Number of tokens generated.
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Time spent generating in nanoseconds.
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

impl GenerateFrame {
    /// The server error message, if present and non-empty.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|m| !m.is_empty())
    }

    pub(crate) fn stats(&self) -> GenerateStats {
        GenerateStats {
            total_duration: self.total_duration.map(Duration::from_nanos),
            load_duration: self.load_duration.map(Duration::from_nanos),
            prompt_eval_count: self.prompt_eval_count,
            prompt_eval_duration: self.prompt_eval_duration.map(Duration::from_nanos),
            eval_count: self.eval_count,
            eval_duration: self.eval_duration.map(Duration::from_nanos),
        }
    }
}

/// Timing and token counts reported on the terminal frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateStats {
    /// Wall time for the whole request.
    pub total_duration: Option<Duration>,
    /// Time spent loading the model.
    pub load_duration: Option<Duration>,
    /// Prompt tokens evaluated.
    pub prompt_eval_count: Option<u64>,
    /// Time spent evaluating the prompt.
    pub prompt_eval_duration: Option<Duration>,
    /// Tokens generated.
    pub eval_count: Option<u64>,
    /// Time spent generating.
    pub eval_duration: Option<Duration>,
}

impl GenerateStats {
    /// Generation throughput, when the server reported both count and duration.
    pub fn tokens_per_second(&self) -> Option<f64> {
        let count = self.eval_count?;
        let secs = self.eval_duration?.as_secs_f64();
        (secs > 0.0).then(|| count as f64 / secs)
    }
}

/// Final state of a successfully completed generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Context to thread into the next request. Empty if the server sent none.
    pub context: Context,
    /// All increments concatenated in arrival order.
    pub response: String,
    /// Model name reported by the server, if any.
    pub model: Option<String>,
    /// Why generation stopped.
    pub done_reason: Option<String>,
    /// Timing and token counts.
    pub stats: GenerateStats,
}

/// An item produced by a [`GenerateStream`](crate::GenerateStream).
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateEvent {
    /// Newly generated text not yet seen by the caller. Never empty.
    Increment(String),
    /// The terminal frame arrived. Always the last event.
    Complete(Completion),
}
