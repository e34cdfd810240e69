//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and one implementation per backend:
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAiEmbedder`]**: calls the OpenAI `/v1/embeddings` endpoint.
//! - **[`GeminiEmbedder`]**: calls the Gemini `batchEmbedContents` endpoint.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the backend named by the
//! configuration. [`embed_texts`] splits input into provider-sized batches
//! and returns exactly one vector per input, in input order.
//!
//! # Failure Handling
//!
//! Requests are made once. Any transport error, non-2xx status, malformed
//! body or vector count mismatch fails the whole call with an
//! [`EmbeddingError`]; no partial result is returned.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::error::{ConfigError, EmbeddingError};
use crate::http::truncate_body;

/// A backend that turns text into dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Maximum number of texts sent in one request.
    fn batch_size(&self) -> usize;

    /// Embed one request's worth of texts. Implementations return one
    /// vector per input in input order or an error.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Check that the backend is usable before the pipeline starts.
    async fn preflight(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Embed `texts` in batches of [`Embedder::batch_size`].
///
/// The result has exactly `texts.len()` vectors, in input order, whatever
/// the batch size.
pub async fn embed_texts(
    embedder: &dyn Embedder,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let batch_size = embedder.batch_size().max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for (i, batch) in texts.chunks(batch_size).enumerate() {
        debug!(
            provider = embedder.provider().name(),
            batch = i,
            size = batch.len(),
            "embedding batch"
        );
        let embedded = embedder.embed_batch(batch).await?;
        if embedded.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                provider: embedder.provider().name().to_string(),
                expected: batch.len(),
                actual: embedded.len(),
            });
        }
        vectors.extend(embedded);
    }

    Ok(vectors)
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut vectors = embed_texts(embedder, &[text.to_string()]).await?;
    vectors.pop().ok_or_else(|| EmbeddingError::CountMismatch {
        provider: embedder.provider().name().to_string(),
        expected: 1,
        actual: 0,
    })
}

/// Create the embedder named by `config`.
pub fn create_embedder(config: &EmbeddingConfig, client: &reqwest::Client) -> Box<dyn Embedder> {
    let api_key = config.api_key.clone().unwrap_or_default();
    match config.provider {
        ProviderKind::Ollama => Box::new(OllamaEmbedder {
            client: client.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            batch_size: config.batch_size,
        }),
        ProviderKind::OpenAi => Box::new(OpenAiEmbedder {
            client: client.clone(),
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            batch_size: config.batch_size,
        }),
        ProviderKind::Gemini => Box::new(GeminiEmbedder {
            client: client.clone(),
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            batch_size: config.batch_size,
        }),
    }
}

/// Send a prepared request and decode a JSON reply.
async fn send_json(
    provider: ProviderKind,
    req: reqwest::RequestBuilder,
) -> Result<Value, EmbeddingError> {
    let response = req.send().await.map_err(|e| EmbeddingError::Request {
        provider: provider.name().to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::Api {
            provider: provider.name().to_string(),
            status: status.as_u16(),
            body: truncate_body(&body_text),
        });
    }

    response.json().await.map_err(|e| EmbeddingError::Malformed {
        provider: provider.name().to_string(),
        message: e.to_string(),
    })
}

/// Decode a JSON array of numbers into a vector.
fn parse_vector(value: &Value) -> Result<Vec<f32>, String> {
    value
        .as_array()
        .ok_or_else(|| "embedding is not an array".to_string())?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| format!("non-numeric embedding component: {}", v))
        })
        .collect()
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured Ollama URL (default: `http://localhost:11434`).
/// Requires the embedding model to be pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    batch_size: usize,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Ollama
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let req = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body);
        let json = send_json(ProviderKind::Ollama, req).await?;
        parse_ollama_response(&json).map_err(|message| EmbeddingError::Malformed {
            provider: ProviderKind::Ollama.name().to_string(),
            message,
        })
    }

    async fn preflight(&self) -> Result<(), ConfigError> {
        crate::ollama::check_model(&self.client, &self.base_url, &self.model).await
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>, String> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| "missing embeddings array".to_string())?
        .iter()
        .map(parse_vector)
        .collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with bearer authentication. Vectors are
/// reordered by their `index` field, since the API does not promise to
/// return them in input order.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let req = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = send_json(ProviderKind::OpenAi, req).await?;
        parse_openai_response(&json).map_err(|message| EmbeddingError::Malformed {
            provider: ProviderKind::OpenAi.name().to_string(),
            message,
        })
    }
}

/// Extract `data[].embedding`, ordered by `data[].index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>, String> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| "missing data array".to_string())?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| "missing embedding".to_string())?;
        indexed.push((index, parse_vector(embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Gemini Provider ============

/// Embedding provider using the Gemini API.
///
/// Calls `POST /v1beta/models/{model}:batchEmbedContents`. The key is sent
/// in the `x-goog-api-key` header so it never appears in a URL.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model_path = format!("models/{}", self.model);
        let requests: Vec<Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": model_path,
                    "content": { "parts": [{ "text": t }] },
                })
            })
            .collect();
        let req = self
            .client
            .post(format!(
                "{}/v1beta/{}:batchEmbedContents",
                self.base_url, model_path
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&serde_json::json!({ "requests": requests }));
        let json = send_json(ProviderKind::Gemini, req).await?;
        parse_gemini_response(&json).map_err(|message| EmbeddingError::Malformed {
            provider: ProviderKind::Gemini.name().to_string(),
            message,
        })
    }
}

fn parse_gemini_response(json: &Value) -> Result<Vec<Vec<f32>>, String> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| "missing embeddings array".to_string())?
        .iter()
        .map(|e| {
            e.get("values")
                .ok_or_else(|| "missing values".to_string())
                .and_then(parse_vector)
        })
        .collect()
}
