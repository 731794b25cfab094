//! Ollama generate client struct and builder.

use std::time::Duration;

use crate::config::{GenerateConfig, GenerateOptions};
use crate::error::{GenerateError, map_http_status, map_reqwest_error};
use crate::streaming::{GenerateStream, stream_generation};
use crate::types::{Context, GenerateRequest};

/// Client for the Ollama Generate API.
///
/// Holds only immutable configuration and a shared HTTP client, so one
/// instance can serve concurrent calls. Conversation state is never stored
/// here: each call takes the prior [`Context`] and the caller threads the
/// returned one into the next call.
///
/// # Example
///
/// ```no_run
/// use neuron_ollama_generate::{Context, GenerateClient};
///
/// # async fn run() -> Result<(), neuron_ollama_generate::GenerateError> {
/// let client = GenerateClient::new()
///     .model("mistral:7b-instruct")
///     .base_url("http://localhost:11434");
///
/// let context = client
///     .generate("Why is the sky blue?", &Context::new(), |text| print!("{text}"))
///     .await?;
/// let _follow_up = client
///     .generate("Explain it to a child.", &context, |text| print!("{text}"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GenerateClient {
    config: GenerateConfig,
    client: reqwest::Client,
}

impl GenerateClient {
    /// Create a new client with sensible defaults.
    ///
    /// Default model: `llama3.2`.
    /// Default base URL: `http://localhost:11434`.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(GenerateConfig::default())
    }

    /// Create a client from a prepared configuration.
    #[must_use]
    pub fn from_config(config: GenerateConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Override the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Override the API base URL.
    ///
    /// Useful for testing with a local mock server or a remote Ollama instance.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set a system prompt for every request.
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.config.system = Some(system.into());
        self
    }

    /// Set the keep_alive duration for model memory residency.
    ///
    /// Examples: `"5m"` (keep for 5 minutes), `"0"` (unload immediately after request).
    /// When not set, Ollama uses its server default.
    #[must_use]
    pub fn keep_alive(mut self, duration: impl Into<String>) -> Self {
        self.config.keep_alive = Some(duration.into());
        self
    }

    /// Set sampling and runtime options.
    #[must_use]
    pub fn options(mut self, options: GenerateOptions) -> Self {
        self.config.options = Some(options);
        self
    }

    /// Bound the whole call, response body included.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Use a caller-supplied HTTP client (shared pools, proxies, TLS setup).
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    /// Build the request body for a prompt and prior context.
    pub fn build_request(
        &self,
        prompt: &str,
        context: &Context,
    ) -> Result<GenerateRequest, GenerateError> {
        if prompt.trim().is_empty() {
            return Err(GenerateError::InvalidRequest("prompt must not be empty".into()));
        }

        Ok(GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            context: context.clone(),
            stream: true,
            system: self.config.system.clone(),
            keep_alive: self.config.keep_alive.clone(),
            options: self.config.options.clone(),
        })
    }

    /// Send a generate request and return once response headers arrive.
    ///
    /// The returned [`GenerateStream`] emits text increments as the model
    /// produces them and ends with the [`Completion`](crate::Completion).
    /// Ollama uses NDJSON (newline-delimited JSON) rather than SSE for
    /// streaming.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        context: &Context,
    ) -> Result<GenerateStream, GenerateError> {
        let body = self.build_request(prompt, context)?;
        let url = self.config.generate_url();
        let timeout = self.config.request_timeout;

        tracing::debug!(
            url = %url,
            model = %body.model,
            context_len = body.context.len(),
            "sending generate request to Ollama"
        );

        let mut request = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(limit) = timeout {
            request = request.timeout(limit);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<body unreadable: {e}>"));
            tracing::debug!(status = %status, "generate request rejected");
            return Err(map_http_status(status, &body_text));
        }

        Ok(stream_generation(response))
    }

    /// Generate a completion, handing each text increment to `on_increment`
    /// as it arrives, and return the context to thread into the next call.
    pub async fn generate<F>(
        &self,
        prompt: &str,
        context: &Context,
        on_increment: F,
    ) -> Result<Context, GenerateError>
    where
        F: FnMut(&str),
    {
        let stream = self.generate_stream(prompt, context).await?;
        let completion = stream.drive(on_increment).await?;
        Ok(completion.context)
    }
}

impl Default for GenerateClient {
    fn default() -> Self {
        Self::new()
    }
}
