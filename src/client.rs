//! Streaming completion client.
//!
//! One request per invocation: POST the prompt to the configured endpoint
//! and write decoded text fragments to the output as they arrive. Lines are
//! processed strictly in arrival order with no buffering beyond one line.

use std::io::Write;

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::decoder::{decode_line, LineBuffer, StreamEvent};

/// Request body for the legacy completions API.
#[derive(Debug, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl CompletionRequest {
    /// Build the single request this invocation will send.
    pub fn new(model: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            max_tokens: 200,
            temperature: 0.7,
            stream: true,
        }
    }
}

/// Client for a local streaming completions endpoint.
pub struct CompletionClient {
    config: Config,
    client: Client,
}

impl CompletionClient {
    /// Create a new client. The HTTP client carries no timeout: the caller
    /// may wait indefinitely for the next token.
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    /// Send the prompt and stream fragments into `out` as they arrive.
    ///
    /// Returns once the server sends `[DONE]` or closes the stream. Any
    /// non-success status aborts before streaming begins; fragments already
    /// written stay written.
    pub async fn stream_completion(&self, prompt: &str, out: &mut impl Write) -> Result<()> {
        let request = CompletionRequest::new(&self.config.model, prompt);

        debug!(url = %self.config.url, model = %request.model, "sending completion request");

        let mut builder = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.with_context(|| {
            format!(
                "Failed to connect to {} - is the server running?",
                self.config.url
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Completion request failed with status {}: {}",
                status,
                body
            ));
        }

        debug!(%status, "streaming response body");

        let mut stream = response.bytes_stream();
        let mut buffer = LineBuffer::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read response chunk")?;
            for line in buffer.push(&chunk) {
                match decode_line(&line) {
                    StreamEvent::Fragment(text) => write_fragment(out, &text)?,
                    StreamEvent::Done => {
                        debug!("received [DONE] sentinel");
                        return Ok(());
                    }
                    StreamEvent::Skip => {}
                }
            }
        }

        // Server closed without [DONE]; a trailing unterminated line may
        // still carry a fragment.
        if let Some(line) = buffer.finish() {
            if let StreamEvent::Fragment(text) = decode_line(&line) {
                write_fragment(out, &text)?;
            }
        }

        debug!("stream ended without [DONE] sentinel");
        Ok(())
    }
}

/// Write one fragment with no delimiter and flush so partial tokens show up
/// in real time.
fn write_fragment(out: &mut impl Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .context("Failed to write fragment to output")
}
