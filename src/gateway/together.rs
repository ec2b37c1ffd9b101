//! Together image generation client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GatewayError, ImageModel, ImageRequest, ImageResult};
use crate::config::ImageConfig;

const SERVICE: &str = "Together";

/// Image generation request body
#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    prompt: String,
    steps: u32,
    n: u32,
}

impl From<ImageRequest> for WireRequest {
    fn from(request: ImageRequest) -> Self {
        Self {
            model: request.model,
            prompt: request.prompt,
            steps: request.steps,
            n: 1,
        }
    }
}

/// Image generation response body
#[derive(Debug, Deserialize)]
struct WireResponse {
    data: Vec<ImageResult>,
}

/// Together API client
#[derive(Debug)]
pub struct TogetherClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl TogetherClient {
    /// Create a client from image settings
    pub fn new(config: &ImageConfig, timeout: Duration) -> Result<Self, GatewayError> {
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
impl ImageModel for TogetherClient {
    async fn generate(&self, request: ImageRequest) -> Result<Vec<ImageResult>, GatewayError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(GatewayError::NotConfigured(SERVICE))?;

        let body = WireRequest::from(request);
        debug!("Sending image generation request to Together: {}", body.model);

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
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
            warn!("Together API error: {} - {}", status, body);
            return Err(GatewayError::Api {
                service: SERVICE,
                status,
            });
        }

        let image_response: WireResponse =
            response.json().await.map_err(|e| GatewayError::Decode {
                service: SERVICE,
                detail: e.to_string(),
            })?;

        Ok(image_response.data)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
