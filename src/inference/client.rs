//! Model inference over an OpenAI-compatible chat completions API
//! (Ollama, vLLM, OpenAI, ...).

use super::{GenerativeModel, ModelError};
use crate::config::ReagentConfig;
use crate::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Inference client for a single configured model.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    api_key: String,
    model: String,
    system_role: String,
    temperature: f64,
    max_tokens: u32,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            system_role: "You are a helpful assistant.".into(),
            temperature: 0.7,
            max_tokens: 4096,
            http: reqwest::Client::new(),
        }
    }

    /// Build a client from config, with the request timeout applied.
    pub fn from_config(config: &ReagentConfig) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            system_role: config.system_role.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            http,
            ..Self::new(
                &config.inference_api_url,
                &config.inference_api_key,
                &config.inference_model,
            )
        })
    }

    pub fn with_system_role(mut self, role: impl Into<String>) -> Self {
        self.system_role = role.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one chat completion with the configured system role.
    pub async fn chat(&self, prompt: &str) -> Result<Generation, ModelError> {
        self.chat_as(&self.system_role, prompt, self.temperature).await
    }

    /// Run one chat completion with an explicit system role and temperature.
    pub async fn chat_as(
        &self,
        system_role: &str,
        prompt: &str,
        temperature: f64,
    ) -> Result<Generation, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let messages = [
            ChatMessage {
                role: ChatRole::System,
                content: system_role.to_string(),
            },
            ChatMessage {
                role: ChatRole::User,
                content: prompt.to_string(),
            },
        ];

        let request = ChatRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: self.max_tokens,
            temperature,
        };

        debug!("Inference request to model {}: {} prompt chars", self.model, prompt.len());

        let started = Instant::now();
        let mut builder = self.http.post(&url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = resp.json().await?;
        let latency = started.elapsed();

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)?;

        let usage = body.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        if let Some(ref u) = usage {
            let secs = latency.as_secs_f64();
            let rate = if secs > 0.0 { u.total_tokens as f64 / secs } else { 0.0 };
            debug!(
                "Inference done in {:.2}s: {} prompt + {} completion tokens ({:.1} tok/s)",
                secs, u.prompt_tokens, u.completion_tokens, rate
            );
        }

        Ok(Generation {
            content,
            usage,
            latency: Some(latency),
        })
    }
}

#[async_trait]
impl GenerativeModel for InferenceClient {
    async fn generate(&self, prompt: &str) -> Result<Generation, ModelError> {
        self.chat(prompt).await
    }

    async fn generate_as(
        &self,
        persona: &str,
        prompt: &str,
        temperature: Option<f64>,
    ) -> Result<Generation, ModelError> {
        self.chat_as(persona, prompt, temperature.unwrap_or(self.temperature))
            .await
    }
}
