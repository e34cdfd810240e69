//! Chat model abstraction and implementations.
//!
//! A [`ChatModel`] receives a [`ChatPrompt`] (system instruction, user
//! request and retrieved context) and returns the model's free text. One
//! implementation exists per backend; [`create_chat_model`] picks it from
//! the configuration.
//!
//! | Backend | Endpoint |
//! |---------|----------|
//! | Ollama | `POST /api/chat` with `stream: false` |
//! | OpenAI | `POST /v1/chat/completions` |
//! | Gemini | `POST /v1beta/models/{model}:generateContent` |
//!
//! Requests are made once. An answer that is empty, or contains nothing but
//! a reasoning block, is a [`GenerationError::Empty`].

use async_trait::async_trait;
use paperweek_core::ranking::strip_reasoning;
use serde_json::Value;
use tracing::debug;

use crate::config::{ChatConfig, ProviderKind};
use crate::error::{ConfigError, GenerationError};
use crate::http::truncate_body;

/// Everything the model sees for one generation.
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
    /// Retrieved context blocks, already joined.
    pub context: String,
}

impl ChatPrompt {
    /// The user turn: the request followed by the retrieved context.
    pub fn user_message(&self) -> String {
        format!("{}\n\nRETRIEVED CONTEXT:\n\n{}", self.user, self.context)
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn provider(&self) -> ProviderKind;
    fn model_name(&self) -> &str;

    /// Generate a reply to `prompt`.
    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, GenerationError>;

    /// Check that the backend is usable before the pipeline starts.
    async fn preflight(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Create the chat model named by `config`.
pub fn create_chat_model(config: &ChatConfig, client: &reqwest::Client) -> Box<dyn ChatModel> {
    let backend = Backend {
        client: client.clone(),
        base_url: config.base_url.clone(),
        api_key: config.api_key.clone().unwrap_or_default(),
        model: config.model.clone(),
        temperature: config.temperature,
    };
    match config.provider {
        ProviderKind::Ollama => Box::new(OllamaChat(backend)),
        ProviderKind::OpenAi => Box::new(OpenAiChat(backend)),
        ProviderKind::Gemini => Box::new(GeminiChat(backend)),
    }
}

/// Connection settings shared by every backend.
struct Backend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

async fn send_json(
    provider: ProviderKind,
    req: reqwest::RequestBuilder,
) -> Result<Value, GenerationError> {
    let response = req.send().await.map_err(|e| GenerationError::Request {
        provider: provider.name().to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(GenerationError::Api {
            provider: provider.name().to_string(),
            status: status.as_u16(),
            body: truncate_body(&body_text),
        });
    }

    response.json().await.map_err(|e| GenerationError::Malformed {
        provider: provider.name().to_string(),
        message: e.to_string(),
    })
}

/// Turn an extracted reply into the final result, rejecting empty answers.
fn finish(provider: ProviderKind, text: Option<String>) -> Result<String, GenerationError> {
    let text = text.ok_or_else(|| GenerationError::Malformed {
        provider: provider.name().to_string(),
        message: "no message content in response".to_string(),
    })?;
    if strip_reasoning(&text).is_empty() {
        return Err(GenerationError::Empty {
            provider: provider.name().to_string(),
        });
    }
    debug!(provider = provider.name(), chars = text.len(), "generation finished");
    Ok(text)
}

// ============ Ollama ============

struct OllamaChat(Backend);

#[async_trait]
impl ChatModel for OllamaChat {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Ollama
    }
    fn model_name(&self) -> &str {
        &self.0.model
    }

    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, GenerationError> {
        let b = &self.0;
        let body = serde_json::json!({
            "model": b.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user_message() },
            ],
            "options": { "temperature": b.temperature },
        });
        let req = b.client.post(format!("{}/api/chat", b.base_url)).json(&body);
        let json = send_json(ProviderKind::Ollama, req).await?;
        finish(ProviderKind::Ollama, parse_ollama_reply(&json))
    }

    async fn preflight(&self) -> Result<(), ConfigError> {
        crate::ollama::check_model(&self.0.client, &self.0.base_url, &self.0.model).await
    }
}

fn parse_ollama_reply(json: &Value) -> Option<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

// ============ OpenAI ============

struct OpenAiChat(Backend);

#[async_trait]
impl ChatModel for OpenAiChat {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
    fn model_name(&self) -> &str {
        &self.0.model
    }

    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, GenerationError> {
        let b = &self.0;
        let body = serde_json::json!({
            "model": b.model,
            "temperature": b.temperature,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user_message() },
            ],
        });
        let req = b
            .client
            .post(format!("{}/v1/chat/completions", b.base_url))
            .bearer_auth(&b.api_key)
            .json(&body);
        let json = send_json(ProviderKind::OpenAi, req).await?;
        finish(ProviderKind::OpenAi, parse_openai_reply(&json))
    }
}

fn parse_openai_reply(json: &Value) -> Option<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

// ============ Gemini ============

struct GeminiChat(Backend);

#[async_trait]
impl ChatModel for GeminiChat {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
    fn model_name(&self) -> &str {
        &self.0.model
    }

    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, GenerationError> {
        let b = &self.0;
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt.user_message() }] }],
            "generationConfig": { "temperature": b.temperature },
        });
        let req = b
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                b.base_url, b.model
            ))
            .header("x-goog-api-key", &b.api_key)
            .json(&body);
        let json = send_json(ProviderKind::Gemini, req).await?;
        finish(ProviderKind::Gemini, parse_gemini_reply(&json))
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_reply(json: &Value) -> Option<String> {
    let parts = json.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Some(text)
}
