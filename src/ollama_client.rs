//! Client for a local Ollama-compatible inference server.
//!
//! - `POST {base}/api/generate` with `stream=true`, relayed as plain text
//! - `GET  {base}/api/tags` for the model catalog, best effort
//!
//! The generation relay walks `CONNECTING -> STREAMING -> COMPLETE | STREAM_ERROR`.
//! Once the downstream response has started there is no way to signal failure
//! other than in the payload, so any error is written as a final text chunk and
//! the stream then ends normally.

use std::collections::VecDeque;
use std::fmt::{self, Display};
use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::errors::AppError;

/// Prefix of the chunk emitted when the relay fails mid-stream.
pub const STREAM_ERROR_PREFIX: &str = "\n\n**Error evaluating AI response:** ";

/// Renders the in-band error chunk.
pub fn format_stream_error(message: impl Display) -> String {
    format!("{}{}", STREAM_ERROR_PREFIX, message)
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Thin client for the inference server.
#[derive(Clone)]
pub struct OllamaClient {
    /// Used for generation; its timeout bounds the whole stream.
    client: reqwest::Client,
    /// Used for the catalog lookup with a short timeout.
    catalog_client: reqwest::Client,
    base_url: String,
    default_model: String,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        stream_timeout: Duration,
        catalog_timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(stream_timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create Ollama client: {}", e))
            })?;
        let catalog_client = reqwest::Client::builder()
            .timeout(catalog_timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create Ollama catalog client: {}", e))
            })?;

        Ok(Self {
            client,
            catalog_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.ollama_base_url.clone(),
            config.ollama_default_model.clone(),
            Duration::from_secs(config.ollama_timeout_secs),
            Duration::from_secs(config.ollama_models_timeout_secs),
        )
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Lists installed model names.
    ///
    /// Never fails: any error yields a single-element list with the default model.
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) => {
                tracing::debug!("Ollama reports {} model(s)", models.len());
                models
            }
            Err(e) => {
                tracing::warn!(
                    "Model catalog unavailable ({}), falling back to {}",
                    e,
                    self.default_model
                );
                vec![self.default_model.clone()]
            }
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>, AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.catalog_client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Ollama catalog returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Starts a streamed generation and relays the text of each frame.
    ///
    /// Nothing is sent upstream until the returned stream is first polled.
    pub fn stream_generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> impl Stream<Item = String> + Send + 'static {
        let url = format!("{}/api/generate", self.base_url);
        let request = self.client.post(&url).json(&GenerateRequest {
            model,
            prompt,
            stream: true,
        });
        tracing::info!("Streaming generation from {} with model {}", url, model);

        let connect = async move {
            let response = request.send().await.map_err(|e| {
                AppError::ExternalApiError(format!("Ollama request failed: {}", e))
            })?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AppError::ExternalApiError(format!(
                    "Ollama returned status {}: {}",
                    status,
                    snippet(&error_text)
                )));
            }

            Ok(response.bytes_stream().boxed())
        };

        relay(connect)
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

/// Longest unterminated frame the decoder buffers before giving up.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// An upstream frame grew past the decoder's limit without a newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTooLarge {
    pub limit: usize,
}

impl Display for FrameTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream frame exceeds {} bytes without a newline", self.limit)
    }
}

/// Splits a byte stream into newline-delimited frames.
///
/// Bytes are buffered until a `\n` arrives, so frames and multi-byte characters
/// split across transport reads are reassembled. Bytes already searched for a
/// newline are not searched again.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    scanned: usize,
    max_frame: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_frame: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_frame,
        }
    }

    /// Appends a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.buffer[cursor..].iter().position(|&b| b == b'\n') {
            let end = cursor + offset;
            frames.push(strip_cr(&self.buffer[start..end]).to_vec());
            start = end + 1;
            cursor = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        frames
    }

    /// Fails once the unterminated tail is longer than the frame limit.
    pub fn check_limit(&self) -> Result<(), FrameTooLarge> {
        if self.buffer.len() > self.max_frame {
            Err(FrameTooLarge {
                limit: self.max_frame,
            })
        } else {
            Ok(())
        }
    }

    /// Returns the unterminated tail, if any, once the body has ended.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            None
        } else {
            let tail = std::mem::take(&mut self.buffer);
            Some(strip_cr(&tail).to_vec())
        }
    }
}

fn strip_cr(frame: &[u8]) -> &[u8] {
    frame.strip_suffix(b"\r").unwrap_or(frame)
}

/// Meaning of a single upstream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text to forward downstream.
    Text(String),
    /// Blank, unparseable, or carrying no text.
    Skip,
}

/// Interprets one frame. Anything that is not a JSON object is skipped, as is
/// an object without a non-empty `response` string.
pub fn parse_frame(line: &[u8]) -> Frame {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Frame::Skip;
    }
    let Ok(Value::Object(record)) = serde_json::from_slice::<Value>(line) else {
        return Frame::Skip;
    };
    match record.get("response").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Frame::Text(text.to_string()),
        _ => {
            if let Some(message) = record.get("error").and_then(Value::as_str) {
                tracing::warn!("Upstream frame carried an error, skipping: {}", message);
            }
            Frame::Skip
        }
    }
}

enum Upstream {
    Open,
    Closed,
    Failed(String),
}

enum RelayState<F, S> {
    Connecting(F),
    Streaming {
        body: S,
        decoder: FrameDecoder,
        pending: VecDeque<String>,
        upstream: Upstream,
    },
    Done,
}

fn queue_frames(frames: Vec<Vec<u8>>, pending: &mut VecDeque<String>) {
    for frame in frames {
        if let Frame::Text(text) = parse_frame(&frame) {
            pending.push_back(text);
        }
    }
}

/// Relays the body produced by `connect` as a stream of text chunks.
///
/// The stream is pull based: the next upstream read is only issued after the
/// previous chunk has been taken by the consumer. Connection and read errors,
/// including an oversized frame, end the stream with a single
/// [`format_stream_error`] chunk. Frames that are not text are skipped.
pub fn relay<F, S, C, E>(connect: F) -> impl Stream<Item = String> + Send + 'static
where
    F: Future<Output = Result<S, C>> + Send + 'static,
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    C: Display + Send + 'static,
    E: Display + Send + 'static,
{
    stream::unfold(RelayState::Connecting(connect), |mut state| async move {
        loop {
            state = match state {
                RelayState::Connecting(connect) => match connect.await {
                    Ok(body) => {
                        tracing::debug!("Upstream connected, relaying frames");
                        RelayState::Streaming {
                            body,
                            decoder: FrameDecoder::new(),
                            pending: VecDeque::new(),
                            upstream: Upstream::Open,
                        }
                    }
                    Err(e) => {
                        tracing::error!("Upstream connection failed: {}", e);
                        return Some((format_stream_error(e), RelayState::Done));
                    }
                },
                RelayState::Streaming {
                    mut body,
                    mut decoder,
                    mut pending,
                    upstream,
                } => {
                    if let Some(text) = pending.pop_front() {
                        let next = RelayState::Streaming {
                            body,
                            decoder,
                            pending,
                            upstream,
                        };
                        return Some((text, next));
                    }

                    match upstream {
                        Upstream::Closed => {
                            tracing::debug!("Upstream stream complete");
                            return None;
                        }
                        Upstream::Failed(message) => {
                            return Some((format_stream_error(message), RelayState::Done));
                        }
                        Upstream::Open => {}
                    }

                    let upstream = match body.next().await {
                        Some(Ok(chunk)) => {
                            queue_frames(decoder.push(&chunk), &mut pending);
                            match decoder.check_limit() {
                                Ok(()) => Upstream::Open,
                                Err(e) => {
                                    tracing::error!("Upstream read failed: {}", e);
                                    Upstream::Failed(e.to_string())
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!("Upstream read failed: {}", e);
                            Upstream::Failed(e.to_string())
                        }
                        None => {
                            queue_frames(decoder.finish().into_iter().collect(), &mut pending);
                            Upstream::Closed
                        }
                    };

                    RelayState::Streaming {
                        body,
                        decoder,
                        pending,
                        upstream,
                    }
                }
                RelayState::Done => return None,
            };
        }
    })
}
