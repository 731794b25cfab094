#![deny(missing_docs)]
//! Streaming client for the Ollama Generate API.
//!
//! Sends one prompt to a local Ollama server's `/api/generate` endpoint,
//! surfaces generated text as it streams in, and returns the opaque
//! conversation [`Context`] the caller can pass into the next request.
//!
//! # Usage
//!
//! ```no_run
//! use futures::StreamExt;
//! use neuron_ollama_generate::{Context, GenerateClient, GenerateEvent};
//!
//! # async fn run() -> Result<(), neuron_ollama_generate::GenerateError> {
//! let client = GenerateClient::new().model("llama3.2");
//!
//! let mut stream = client.generate_stream("Hello", &Context::new()).await?;
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         GenerateEvent::Increment(text) => print!("{text}"),
//!         GenerateEvent::Complete(done) => println!("\n{} context entries", done.context.len()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - NDJSON streaming (Ollama uses newline-delimited JSON, not SSE)
//! - Explicit context threading; the client keeps no conversation state
//! - Typed failures via [`GenerateError`]: HTTP status, malformed frame,
//!   server-reported error, stream closed before completion
//! - `keep_alive`, system prompt and sampling options

pub mod client;
pub mod config;
pub mod error;
pub mod streaming;
pub mod types;

pub use client::GenerateClient;
pub use config::{GenerateConfig, GenerateOptions};
pub use error::GenerateError;
pub use streaming::GenerateStream;
pub use types::{Completion, Context, GenerateEvent, GenerateFrame, GenerateRequest, GenerateStats};
