//! Groq chat completions client (OpenAI-compatible)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatModel, ChatRequest, GatewayError, Role, Turn};
use crate::config::StoryConfig;

const SERVICE: &str = "Groq";

/// Chat message on the wire
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<Turn> for WireMessage {
    fn from(turn: Turn) -> Self {
        let role = match turn.role {
            Role::System => "system",
            Role::Human => "user",
        };
        Self {
            role: role.to_string(),
            content: turn.content,
        }
    }
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

impl From<ChatRequest> for WireRequest {
    fn from(request: ChatRequest) -> Self {
        Self {
            model: request.model,
            messages: request.turns.into_iter().map(WireMessage::from).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

/// Groq API client
#[derive(Debug)]
pub struct GroqClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GroqClient {
    /// Create a client from story settings
    pub fn new(config: &StoryConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GatewayError::Request {
                service: SERVICE,
                source,
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, GatewayError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(GatewayError::NotConfigured(SERVICE))?;

        let body = WireRequest::from(request);
        debug!("Sending chat request to Groq: {}", body.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| GatewayError::Request {
                service: SERVICE,
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Groq API error: {} - {}", status, body);
            return Err(GatewayError::Api {
                service: SERVICE,
                status,
            });
        }

        let chat_response: WireResponse =
            response.json().await.map_err(|e| GatewayError::Decode {
                service: SERVICE,
                detail: e.to_string(),
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(GatewayError::EmptyResponse(SERVICE))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
