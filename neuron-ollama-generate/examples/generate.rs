//! Stream one answer from a local Ollama server.
//!
//! Make sure Ollama is running locally (`ollama serve`) and run:
//!   cargo run --example generate -- "Write a haiku about borrow checking"
//!
//! Set `OLLAMA_MODEL` to pick a model and `RUST_LOG=debug` to see request logs.

use std::io::Write;

use neuron_ollama_generate::{Context, GenerateClient};
use tracing_subscriber::EnvFilter;

const DEFAULT_PROMPT: &str = "generate more basic programming problems/challenges together with unit tests for their solutions' verification";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let prompt = if prompt.trim().is_empty() {
        DEFAULT_PROMPT.to_string()
    } else {
        prompt
    };

    let mut client = GenerateClient::new();
    if let Ok(model) = std::env::var("OLLAMA_MODEL") {
        client = client.model(model);
    }

    println!("{prompt}");

    let mut stdout = std::io::stdout();
    let context = client
        .generate(&prompt, &Context::new(), |text| {
            // Ignore stdout write failures.
            let _ = write!(stdout, "{text}");
            let _ = stdout.flush();
        })
        .await?;
    println!();

    tracing::info!(context_len = context.len(), "generation complete");
    Ok(())
}
