use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::detection::AiConfig;
use crate::detection::prompt::Prompt;
use crate::errors::DetectionBackendError;

/// Anything that turns a prompt into free-form reply text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, DetectionBackendError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

/// Client for an Ollama-compatible `/api/chat` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    api_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &AiConfig) -> Result<Self, DetectionBackendError> {
        let client = Client::builder()
            .user_agent(concat!("candle_signal_relay/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, DetectionBackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: 0.1,
                top_p: 0.9,
            },
        };

        debug!("Sending chat request to {} ({})", self.api_url, self.model);
        let resp = self.client.post(&self.api_url).json(&request).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            error!("Language model request failed ({}): {}", status, body);
            return Err(DetectionBackendError::Status { status, body });
        }

        let chat = resp.json::<ChatResponse>().await?;
        Ok(chat.message.map(|m| m.content).unwrap_or_default())
    }
}
