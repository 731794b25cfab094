//! NDJSON streaming support for the Ollama Generate API.
//!
//! Ollama emits one JSON object per line:
//! ```text
//! {"model":"llama3.2","response":"Hel","done":false}
//! {"model":"llama3.2","response":"lo","done":false}
//! {"model":"llama3.2","response":"","done":true,"done_reason":"stop","context":[1,2,3],"eval_count":2}
//! ```
//!
//! Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-completion>

use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use futures::{Stream, StreamExt};

use crate::error::GenerateError;
use crate::types::{Completion, GenerateEvent, GenerateFrame};

/// Incremental output of a single generate call.
///
/// Yields zero or more [`GenerateEvent::Increment`]s followed by exactly one
/// terminal item: [`GenerateEvent::Complete`] or an `Err`. After that it
/// yields `None`. The stream is not restartable.
///
/// Dropping the stream closes the underlying connection.
pub struct GenerateStream {
    receiver: Pin<Box<dyn Stream<Item = Result<GenerateEvent, GenerateError>> + Send>>,
}

impl GenerateStream {
    /// Build a stream over any chunked NDJSON byte source.
    ///
    /// Chunk boundaries need not line up with lines or UTF-8 characters. A
    /// source error ends the stream with [`GenerateError::IncompleteStream`].
    pub fn from_byte_stream<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        Self {
            receiver: Box::pin(parse_ndjson_stream(byte_stream)),
        }
    }

    /// Consume the stream, handing each increment to `on_increment` as it
    /// arrives, and return the completion.
    ///
    /// Increments delivered before a failure are not retracted.
    pub async fn drive<F>(mut self, mut on_increment: F) -> Result<Completion, GenerateError>
    where
        F: FnMut(&str),
    {
        while let Some(item) = self.next().await {
            match item? {
                GenerateEvent::Increment(text) => on_increment(&text),
                GenerateEvent::Complete(completion) => return Ok(completion),
            }
        }
        // Only reachable when the terminal item was already consumed.
        Err(GenerateError::IncompleteStream {
            frames: 0,
            reason: Some("stream already exhausted".into()),
        })
    }
}

impl Stream for GenerateStream {
    type Item = Result<GenerateEvent, GenerateError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for GenerateStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateStream").finish_non_exhaustive()
    }
}

/// Wrap an HTTP response body into a [`GenerateStream`].
pub(crate) fn stream_generation(response: reqwest::Response) -> GenerateStream {
    GenerateStream::from_byte_stream(response.bytes_stream())
}

/// Parse a raw byte stream into generate events.
///
/// Partial lines are buffered as bytes across chunks so multi-byte characters
/// split by the transport decode correctly. The source is dropped as soon as a
/// terminal item has been produced.
fn parse_ndjson_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<GenerateEvent, GenerateError>> + Send + 'static
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut state = FrameState::new();
        let mut bytes_stream = Box::pin(byte_stream);
        let mut line_buf: Vec<u8> = Vec::new();
        // Bytes before this offset hold no newline.
        let mut scan_from = 0;

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    yield Err(state.incomplete(Some(format!("stream read error: {e}"))));
                    return;
                }
            };

            line_buf.extend_from_slice(&chunk);

            while let Some(offset) = line_buf[scan_from..].iter().position(|b| *b == b'\n') {
                let newline_pos = scan_from + offset;
                let line: Vec<u8> = line_buf.drain(..=newline_pos).collect();
                scan_from = 0;
                match state.process_line(&line) {
                    Ok(events) => {
                        for event in events {
                            let terminal = matches!(event, GenerateEvent::Complete(_));
                            yield Ok(event);
                            if terminal {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
            scan_from = line_buf.len();
        }

        // Last line may lack a trailing newline
        match state.process_line(&line_buf) {
            Ok(events) => {
                for event in events {
                    let terminal = matches!(event, GenerateEvent::Complete(_));
                    yield Ok(event);
                    if terminal {
                        return;
                    }
                }
            }
            Err(e) => {
                yield Err(e);
                return;
            }
        }

        tracing::warn!(frames = state.frames, "generate stream closed before a done frame");
        yield Err(state.incomplete(None));
    }
}

/// Tracks in-progress streaming state across NDJSON lines.
struct FrameState {
    /// Frames decoded so far.
    frames: usize,
    /// Accumulated text across increments.
    text_buf: String,
}

impl FrameState {
    fn new() -> Self {
        Self {
            frames: 0,
            text_buf: String::new(),
        }
    }

    /// Process a single NDJSON line and return the events it produces.
    ///
    /// Blank lines produce nothing. An error field takes precedence over every
    /// other field of the same frame.
    fn process_line(&mut self, line: &[u8]) -> Result<Vec<GenerateEvent>, GenerateError> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(Vec::new());
        }

        let frame: GenerateFrame =
            serde_json::from_slice(line).map_err(|source| GenerateError::Protocol {
                line: String::from_utf8_lossy(line).into_owned(),
                source,
            })?;
        self.frames += 1;

        tracing::trace!(
            frame = self.frames,
            done = frame.done,
            len = frame.response.len(),
            "generate frame"
        );

        if let Some(message) = frame.error_message() {
            tracing::warn!(error = %message, "server reported generation error");
            return Err(GenerateError::Generation(message.to_string()));
        }

        let mut events = Vec::new();

        if !frame.response.is_empty() {
            self.text_buf.push_str(&frame.response);
            events.push(GenerateEvent::Increment(frame.response.clone()));
        }

        if frame.done {
            let stats = frame.stats();
            tracing::debug!(
                frames = self.frames,
                done_reason = ?frame.done_reason,
                eval_count = ?stats.eval_count,
                prompt_eval_count = ?stats.prompt_eval_count,
                "generate stream complete"
            );
            events.push(GenerateEvent::Complete(Completion {
                context: frame.context.unwrap_or_default(),
                response: std::mem::take(&mut self.text_buf),
                model: frame.model,
                done_reason: frame.done_reason,
                stats,
            }));
        }

        Ok(events)
    }

    fn incomplete(&self, reason: Option<String>) -> GenerateError {
        GenerateError::IncompleteStream {
            frames: self.frames,
            reason,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
