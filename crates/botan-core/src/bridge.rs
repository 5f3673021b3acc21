//! Generation collaborator bridge.
//!
//! The core never parses model output optimistically at call sites: structured
//! results come back as [`Parsed`]: either the expected structure or the raw
//! text, so every caller constructs an explicit fallback instead of guessing.
//!
//! `OllamaBridge` is the production implementation (Ollama-compatible
//! `/api/chat` and `/api/generate`); tests substitute the [`GenerationBridge`]
//! trait with a canned implementation.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// One role-tagged entry in the rolling exchange log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Collaborator output where structure was expected. `Unstructured` carries
/// the raw text for diagnostics; callers turn it into an explicit fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Structured(T),
    Unstructured(String),
}

impl<T: DeserializeOwned> Parsed<T> {
    /// Extracts the first `{ ... }` block from free-form model output and
    /// tries to deserialize it. Anything that does not parse lands in
    /// `Unstructured` with the full raw text.
    pub fn from_completion(raw: &str) -> Self {
        if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<T>(&raw[start..=end]) {
                    return Parsed::Structured(value);
                }
            }
        }
        Parsed::Unstructured(raw.to_string())
    }
}

/// Opaque generation collaborator: prompt in, completion text out.
/// May fail or time out; callers own the degradation policy.
#[async_trait]
pub trait GenerationBridge: Send + Sync {
    /// Multi-turn completion over the full role-tagged exchange log.
    async fn chat(&self, messages: &[ChatMessage]) -> CoreResult<String>;

    /// Single-prompt completion (used by the reflect/reason stages).
    async fn complete(&self, prompt: &str) -> CoreResult<String>;
}

// Ollama wire types (chat + generate)
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatMessage>,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama-backed generation bridge. Conversation turns go through `/api/chat`
/// with the full exchange log; analysis prompts go through `/api/generate`
/// with a low temperature.
pub struct OllamaBridge {
    host: String,
    model: String,
    analysis_model: String,
    client: reqwest::Client,
}

impl OllamaBridge {
    pub fn new(host: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let model = model.into();
        Self {
            host: host.into(),
            analysis_model: model.clone(),
            model,
            client,
        }
    }

    /// Set the lightweight model used for reflect/reason prompts.
    pub fn with_analysis_model(mut self, model: &str) -> Self {
        self.analysis_model = model.to_string();
        self
    }
}

#[async_trait]
impl GenerationBridge for OllamaBridge {
    async fn chat(&self, messages: &[ChatMessage]) -> CoreResult<String> {
        let url = format!("{}/api/chat", self.host);
        let body = OllamaChatRequest { model: &self.model, messages, stream: false };

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Bridge(format!("chat request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Bridge(format!("chat API error {}: {}", status, body)));
        }

        let parsed: OllamaChatResponse = res
            .json()
            .await
            .map_err(|e| CoreError::Bridge(format!("chat response parse failed: {}", e)))?;

        parsed
            .message
            .map(|m| m.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CoreError::Bridge("chat response was empty".to_string()))
    }

    async fn complete(&self, prompt: &str) -> CoreResult<String> {
        let url = format!("{}/api/generate", self.host);
        let body = OllamaGenerateRequest {
            model: &self.analysis_model,
            prompt,
            stream: false,
            options: GenerateOptions { num_predict: 500, temperature: 0.3 },
        };

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Bridge(format!("generate request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Bridge(format!("generate API error {}: {}", status, body)));
        }

        let parsed: OllamaGenerateResponse = res
            .json()
            .await
            .map_err(|e| CoreError::Bridge(format!("generate response parse failed: {}", e)))?;

        Ok(parsed.response)
    }
}
