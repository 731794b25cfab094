//! Configuration for [`GenerateClient`](crate::GenerateClient).

use std::time::Duration;

use serde::Serialize;

/// Default model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default Ollama API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Static configuration for a generate client.
///
/// Owned by the client and read on every call; there is no process-wide state.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// API base URL, without the `/api/generate` path.
    pub base_url: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Optional system prompt overriding the model file's.
    pub system: Option<String>,

    /// Optional keep_alive duration string (e.g. "5m", "0" to unload).
    pub keep_alive: Option<String>,

    /// Sampling and runtime options forwarded as `options`.
    pub options: Option<GenerateOptions>,

    /// Upper bound on a whole call, body included.
    ///
    /// When it fires before headers arrive the call fails with
    /// [`GenerateError::Timeout`](crate::GenerateError::Timeout); mid-body it
    /// surfaces as [`GenerateError::IncompleteStream`](crate::GenerateError::IncompleteStream).
    pub request_timeout: Option<Duration>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            system: None,
            keep_alive: None,
            options: None,
            request_timeout: None,
        }
    }
}

impl GenerateConfig {
    /// Build the generate endpoint URL.
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

/// Sampling and runtime options for Ollama.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateOptions {
    /// Sampling temperature (0.0 - 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Top-p (nucleus sampling).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    /// Context window size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}
