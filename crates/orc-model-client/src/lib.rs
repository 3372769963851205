//! Stateful façade over a local Ollama-compatible model host.
//!
//! Wire protocol per §6: `GET /api/tags`, `POST /api/pull`, `POST
//! /api/generate` streaming newline-delimited JSON. Grounded in
//! `examples/original_source/app/llm/ollama_client.py` for the protocol
//! shape and in the teacher's `agentic::llm_client`/`anthropic_client`
//! for the Rust client idiom (`async_trait`, `Self::from_env`,
//! `reqwest::Client`).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ModelClientError {
    #[error("listing models failed: {0}")]
    List(String),
    #[error("pulling model {model} failed: {source}")]
    Pull { model: String, source: String },
    #[error("generate request failed: {0}")]
    Generate(String),
    #[error("model {0} is not available and autopull is disabled")]
    ModelUnavailable(String),
}

#[derive(Debug, Clone, Deserialize)]
struct TagsResponseModel {
    #[serde(alias = "name")]
    model: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsResponseModel>,
}

#[derive(Debug, Clone, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// One parsed line of the `/api/generate` NDJSON stream.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
}

impl GenerateChunk {
    pub fn final_meta(&self) -> Option<(Option<u64>, Option<u64>)> {
        if self.done {
            Some((self.prompt_eval_count, self.eval_count))
        } else {
            None
        }
    }
}

/// The façade every worker strategy talks to; a trait so tests can
/// inject a fake without touching the network.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn tags(&self) -> Result<HashSet<String>, ModelClientError>;
    async fn ensure(&self, model: &str) -> Result<(), ModelClientError>;
    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<
        std::pin::Pin<Box<dyn Stream<Item = GenerateChunk> + Send>>,
        ModelClientError,
    >;
}

struct TagCache {
    fetched_at: Instant,
    tags: HashSet<String>,
}

pub struct OllamaClient {
    http: reqwest::Client,
    host: String,
    autopull: bool,
    tag_cache_ttl: Duration,
    cache: Mutex<Option<TagCache>>,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, autopull: bool, tag_cache_ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.into(),
            autopull,
            tag_cache_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Construct from the same environment variables the Python
    /// predecessor reads: `OLLAMA_HOST`, `OLLAMA_AUTOPULL`,
    /// `OLLAMA_TAG_CACHE_TTL`.
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST")
            .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
        let autopull = std::env::var("OLLAMA_AUTOPULL")
            .map(|v| matches!(v.trim(), "1" | "true" | "True"))
            .unwrap_or(false);
        let ttl = std::env::var("OLLAMA_TAG_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30u64);
        Self::new(host, autopull, Duration::from_secs(ttl))
    }

    async fn fetch_tags(&self) -> Result<HashSet<String>, ModelClientError> {
        let url = format!("{}/api/tags", self.host);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ModelClientError::List(e.to_string()))?;
        let body: TagsResponse = resp
            .json()
            .await
            .map_err(|e| ModelClientError::List(e.to_string()))?;
        Ok(body.models.into_iter().map(|m| m.model).collect())
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn tags(&self) -> Result<HashSet<String>, ModelClientError> {
        {
            let guard = self.cache.lock().await;
            if let Some(cache) = guard.as_ref() {
                if cache.fetched_at.elapsed() < self.tag_cache_ttl {
                    return Ok(cache.tags.clone());
                }
            }
        }

        match self.fetch_tags().await {
            Ok(tags) => {
                let mut guard = self.cache.lock().await;
                *guard = Some(TagCache {
                    fetched_at: Instant::now(),
                    tags: tags.clone(),
                });
                Ok(tags)
            }
            Err(e) => {
                // Stale-fallback-on-error, matching the Python client:
                // prefer last-known tags over surfacing a transport
                // failure if we have something to fall back on.
                let guard = self.cache.lock().await;
                if let Some(cache) = guard.as_ref() {
                    tracing::warn!(error = %e, "tags refresh failed, serving stale cache");
                    Ok(cache.tags.clone())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn ensure(&self, model: &str) -> Result<(), ModelClientError> {
        let tags = self.tags().await?;
        if tags.contains(model) {
            return Ok(());
        }
        if !self.autopull {
            return Err(ModelClientError::ModelUnavailable(model.to_string()));
        }

        let url = format!("{}/api/pull", self.host);
        self.http
            .post(&url)
            .json(&PullRequest {
                model,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| ModelClientError::Pull {
                model: model.to_string(),
                source: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| ModelClientError::Pull {
                model: model.to_string(),
                source: e.to_string(),
            })?;

        let mut guard = self.cache.lock().await;
        *guard = None;
        Ok(())
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<std::pin::Pin<Box<dyn Stream<Item = GenerateChunk> + Send>>, ModelClientError>
    {
        let url = format!("{}/api/generate", self.host);
        let req = GenerateRequest {
            model,
            prompt,
            stream: true,
            options,
        };
        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ModelClientError::Generate(e.to_string()))?
            .error_for_status()
            .map_err(|e| ModelClientError::Generate(e.to_string()))?;

        struct NdjsonState {
            byte_stream: std::pin::Pin<
                Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>,
            >,
            buf: Vec<u8>,
            pending: std::collections::VecDeque<GenerateChunk>,
        }

        let byte_stream = resp.bytes_stream();
        let state = NdjsonState {
            byte_stream: Box::pin(byte_stream),
            buf: Vec::new(),
            pending: std::collections::VecDeque::new(),
        };

        // Hand-rolled NDJSON line splitter over the byte stream: pull
        // more bytes only once every complete buffered line has been
        // yielded, silently skipping malformed lines per the wire
        // contract.
        let line_stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(chunk) = state.pending.pop_front() {
                    return Some((chunk, state));
                }

                while let Some(pos) = state.buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = state.buf.drain(..=pos).collect();
                    let line = &line[..line.len().saturating_sub(1)];
                    if line.iter().all(|b| b.is_ascii_whitespace()) {
                        continue;
                    }
                    if let Ok(parsed) = serde_json::from_slice::<GenerateChunk>(line) {
                        state.pending.push_back(parsed);
                    }
                }
                if !state.pending.is_empty() {
                    continue;
                }

                use futures::StreamExt;
                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => state.buf.extend_from_slice(&bytes),
                    Some(Err(_)) | None => return None,
                }
            }
        });

        Ok(Box::pin(line_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_meta_only_on_done() {
        let chunk = GenerateChunk {
            response: "hi".into(),
            done: false,
            eval_count: None,
            prompt_eval_count: None,
        };
        assert!(chunk.final_meta().is_none());

        let done = GenerateChunk {
            response: String::new(),
            done: true,
            eval_count: Some(5),
            prompt_eval_count: Some(10),
        };
        assert_eq!(done.final_meta(), Some((Some(10), Some(5))));
    }

    #[test]
    fn generate_options_skip_unset_fields() {
        let opts = GenerateOptions::default();
        let json = serde_json::to_string(&opts).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn from_env_defaults_when_unset() {
        let client = OllamaClient::from_env();
        assert!(!client.host.is_empty());
    }
}
