//! Chat model clients implementing [`regdoc_core::answer::ChatModel`].
//!
//! - [`OpenAiChat`]: any OpenAI-compatible `/chat/completions` endpoint.
//!   Defaults target Groq with `llama-3.1-8b-instant`.
//! - [`OllamaChat`]: a local Ollama `/api/chat` endpoint.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use regdoc_core::answer::{ChatModel, Prompt};
use regdoc_core::CoreError;

use crate::config::LlmConfig;
use crate::http;

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn messages(prompt: &Prompt) -> [ApiMessage<'_>; 2] {
    [
        ApiMessage {
            role: "system",
            content: &prompt.system,
        },
        ApiMessage {
            role: "user",
            content: &prompt.user,
        },
    ]
}

fn llm_err(e: anyhow::Error) -> CoreError {
    CoreError::Llm(format!("{e:#}"))
}

// ============ OpenAI-compatible ============

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            api_key,
            base_url: config.base_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    async fn send(&self, prompt: &Prompt) -> Result<String> {
        let msgs = messages(prompt);
        let body = serde_json::to_value(ChatRequest {
            model: &self.model,
            messages: &msgs,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        })?;
        let json = http::post_json(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            Some(&self.api_key),
            &body,
            self.max_retries,
            "Chat API",
        )
        .await?;
        parse_chat_response(json)
    }
}

fn parse_chat_response(json: serde_json::Value) -> Result<String> {
    let resp: ChatResponse = serde_json::from_value(json)?;
    resp.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| anyhow::anyhow!("Chat API returned no choices"))
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> regdoc_core::Result<String> {
        self.send(prompt).await.map_err(llm_err)
    }
}

// ============ Ollama ============

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: ChatMessage,
}

#[derive(Debug)]
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config.base_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    async fn send(&self, prompt: &Prompt) -> Result<String> {
        let msgs = messages(prompt);
        let body = serde_json::to_value(OllamaRequest {
            model: &self.model,
            messages: &msgs,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        })?;
        let json = http::post_json(
            &self.client,
            &format!("{}/api/chat", self.base_url),
            None,
            &body,
            self.max_retries,
            "Ollama API",
        )
        .await?;
        let resp: OllamaResponse = serde_json::from_value(json)?;
        Ok(resp.message.content)
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> regdoc_core::Result<String> {
        self.send(prompt).await.map_err(llm_err)
    }
}

/// Create the [`ChatModel`] named by `config.provider`.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
