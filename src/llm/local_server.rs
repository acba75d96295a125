//! Engine adapter for a locally hosted llama.cpp server.
//!
//! The server owns tokenization and sampling. We check the bundled artifact,
//! confirm the server is up, and stream `/completion` over SSE.

use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::engine::{InferenceEngine, ModelContext, Step};
use crate::error::EngineError;

/// First bytes of every GGUF model file.
const GGUF_MAGIC: &[u8; 4] = b"GGUF";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

/// `InferenceEngine` backed by llama.cpp's HTTP server.
pub struct LlamaServerEngine {
    client: reqwest::Client,
    base_url: String,
    max_tokens: u32,
}

impl LlamaServerEngine {
    pub fn new(base_url: impl Into<String>, max_tokens: u32) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            max_tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check_health(&self) -> Result<(), EngineError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| EngineError::Unavailable {
                reason: format!("{url}: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(EngineError::Unavailable {
                reason: format!("{url} returned {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Reject anything that is not a readable GGUF file.
async fn check_artifact(path: &Path) -> Result<(), EngineError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| EngineError::ArtifactMissing {
            path: path.to_path_buf(),
        })?;
    if !metadata.is_file() {
        return Err(EngineError::ArtifactRejected {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    let mut header = [0u8; 4];
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| EngineError::ArtifactRejected {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if file.read_exact(&mut header).await.is_err() || &header != GGUF_MAGIC {
        return Err(EngineError::ArtifactRejected {
            path: path.to_path_buf(),
            reason: "missing GGUF header".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl InferenceEngine for LlamaServerEngine {
    fn name(&self) -> &str {
        "llama-server"
    }

    async fn load(&self, artifact: &Path) -> Result<Box<dyn ModelContext>, EngineError> {
        check_artifact(artifact).await?;
        self.check_health().await?;

        info!(
            artifact = %artifact.display(),
            url = %self.base_url,
            "Model context ready"
        );
        Ok(Box::new(LlamaServerContext {
            client: self.client.clone(),
            completion_url: format!("{}/completion", self.base_url),
            max_tokens: self.max_tokens,
            stream: None,
            decoder: SseDecoder::default(),
            finished: false,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionEvent {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
}

/// Splits an SSE byte stream into `data:` payloads.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete `data:` payload, if a full line is buffered.
    fn next_data(&mut self) -> Option<String> {
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                return Some(data.trim_start().to_string());
            }
        }
        None
    }

    /// Whatever is left once the stream has ended without a trailing newline.
    fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        self.buffer.push(b'\n');
        self.next_data()
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

fn parse_event(data: &str) -> Result<CompletionEvent, EngineError> {
    if data == "[DONE]" {
        return Ok(CompletionEvent {
            content: String::new(),
            stop: true,
        });
    }
    serde_json::from_str(data).map_err(|e| EngineError::InvalidResponse {
        reason: format!("bad completion event: {e}"),
    })
}

struct LlamaServerContext {
    client: reqwest::Client,
    completion_url: String,
    max_tokens: u32,
    stream: Option<ByteStream>,
    decoder: SseDecoder,
    finished: bool,
}

impl LlamaServerContext {
    /// Turn one decoded payload into a step, or `None` for empty keep-alive events.
    fn step_from(&mut self, data: &str) -> Result<Option<Step>, EngineError> {
        let event = parse_event(data)?;
        if event.stop {
            self.finished = true;
        }
        if !event.content.is_empty() {
            return Ok(Some(Step::Fragment(event.content)));
        }
        if self.finished {
            return Ok(Some(Step::Done));
        }
        Ok(None)
    }
}

#[async_trait]
impl ModelContext for LlamaServerContext {
    async fn completion_init(&mut self, prompt: &str) -> Result<(), EngineError> {
        self.clear().await;

        let body = serde_json::json!({
            "prompt": prompt,
            "n_predict": self.max_tokens,
            "stream": true,
            "cache_prompt": false,
        });

        let response = self
            .client
            .post(&self.completion_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Request {
                reason: format!("{status}: {text}"),
            });
        }

        debug!(prompt_len = prompt.len(), "Completion started");
        let stream: ByteStream =
            Box::pin(response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())));
        self.stream = Some(stream);
        Ok(())
    }

    async fn completion_step(&mut self) -> Result<Step, EngineError> {
        loop {
            if self.finished {
                return Ok(Step::Done);
            }

            if let Some(data) = self.decoder.next_data() {
                if let Some(step) = self.step_from(&data)? {
                    return Ok(step);
                }
                continue;
            }

            let Some(stream) = self.stream.as_mut() else {
                return Err(EngineError::Request {
                    reason: "no completion in progress".to_string(),
                });
            };

            match stream.next().await {
                Some(Ok(bytes)) => self.decoder.push(&bytes),
                Some(Err(e)) => {
                    return Err(EngineError::Request {
                        reason: format!("stream error: {e}"),
                    });
                }
                None => {
                    self.stream = None;
                    self.finished = true;
                    let tail = match self.decoder.take_remainder() {
                        Some(data) => self.step_from(&data)?,
                        None => None,
                    };
                    return Ok(tail.unwrap_or(Step::Done));
                }
            }
        }
    }

    async fn clear(&mut self) {
        self.stream = None;
        self.decoder.clear();
        self.finished = false;
    }
}
