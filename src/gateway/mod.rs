//! Generation gateway
//!
//! Provides:
//! - Story generation via a hosted chat model
//! - Manga illustration generation via a hosted text-to-image model
//! - Provider traits so the HTTP clients can be swapped for stubs
//!
//! Both operations return `Result<_, GatewayError>`; callers decide whether a
//! failure is shown as a blocking error or a warning.

mod groq;
mod together;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ImageConfig, StoryConfig};
use crate::genre::Genre;

pub use groq::GroqClient;
pub use together::TogetherClient;

/// Prefix of every illustration prompt
pub const ILLUSTRATION_PREFIX: &str = "Manga-style illustration:";

/// Fixed style qualifier appended to every illustration prompt
pub const MANGA_QUALIFIER: &str = "monochrome, clean line art, dynamic pose, expressive facial features, \
sharp details, screentone shading, speech bubble with dialogue, \
high contrast, professional manga panel style.";

/// Structural constraints embedded in every story instruction
pub const STORY_CONSTRAINTS: [&str; 4] = [
    "3-5 panels",
    "Expressive character dialogues (e.g., *shouting*, *gasping*)",
    "Action descriptions in [brackets]",
    "Maintain manga pacing and page flow.",
];

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0} API key not configured")]
    NotConfigured(&'static str),

    #[error("request to {service} failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} API error: {status}")]
    Api {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("failed to parse {service} response: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },

    #[error("no result from {0}")]
    EmptyResponse(&'static str),
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
}

/// One turn of a chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }
}

/// Request sent to the language model
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub turns: Vec<Turn>,
}

/// Request sent to the image model
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub steps: u32,
}

/// One generated image as returned by the image model
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageResult {
    pub url: String,
}

/// Hosted language model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run a chat completion and return the generated text
    async fn complete(&self, request: ChatRequest) -> Result<String, GatewayError>;

    /// Whether credentials are present
    fn is_configured(&self) -> bool {
        true
    }
}

/// Hosted text-to-image model
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Generate images for a prompt
    async fn generate(&self, request: ImageRequest) -> Result<Vec<ImageResult>, GatewayError>;

    /// Whether credentials are present
    fn is_configured(&self) -> bool {
        true
    }
}

/// Generated story text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryResult {
    pub text: String,
    pub genre: Genre,
}

/// Reference (URL) to a generated image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the system instruction for a story in the given genre
pub fn story_instruction(genre: Genre) -> String {
    let mut instruction = format!(
        "You're a manga storytelling AI. Create a {} manga with:",
        genre.name()
    );
    for constraint in STORY_CONSTRAINTS {
        instruction.push_str("\n- ");
        instruction.push_str(constraint);
    }
    instruction
}

/// Wrap a description in the manga illustration template
pub fn illustration_prompt(description: &str) -> String {
    format!("{} {}, {}", ILLUSTRATION_PREFIX, description, MANGA_QUALIFIER)
}

/// Story and illustration generation in front of the two providers
pub struct Gateway {
    chat: Arc<dyn ChatModel>,
    images: Arc<dyn ImageModel>,
    story: StoryConfig,
    image: ImageConfig,
}

impl Gateway {
    /// Create a gateway over the given providers
    pub fn new(
        chat: Arc<dyn ChatModel>,
        images: Arc<dyn ImageModel>,
        story: StoryConfig,
        image: ImageConfig,
    ) -> Self {
        Self {
            chat,
            images,
            story,
            image,
        }
    }

    /// Whether the language model has credentials
    pub fn story_configured(&self) -> bool {
        self.chat.is_configured()
    }

    /// Whether the image model has credentials
    pub fn image_configured(&self) -> bool {
        self.images.is_configured()
    }

    /// Generate a manga script for the prompt
    ///
    /// The model output is returned verbatim.
    pub async fn generate_story(
        &self,
        prompt: &str,
        genre: Genre,
    ) -> Result<StoryResult, GatewayError> {
        let request = ChatRequest {
            model: self.story.model.clone(),
            temperature: self.story.temperature,
            max_tokens: self.story.max_tokens,
            turns: vec![Turn::system(story_instruction(genre)), Turn::human(prompt)],
        };

        debug!("Requesting {} story from {}", genre, request.model);
        match self.chat.complete(request).await {
            Ok(text) => {
                info!("Generated {} story ({} chars)", genre, text.len());
                Ok(StoryResult { text, genre })
            }
            Err(e) => {
                warn!("Story generation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Generate a manga illustration for the description
    ///
    /// Callers reject blank descriptions before calling this.
    pub async fn generate_illustration(&self, description: &str) -> Result<ImageRef, GatewayError> {
        let request = ImageRequest {
            model: self.image.model.clone(),
            prompt: illustration_prompt(description),
            steps: self.image.steps,
        };

        debug!("Requesting illustration from {}", request.model);
        let result = self
            .images
            .generate(request)
            .await
            .and_then(|results| {
                results
                    .into_iter()
                    .next()
                    .map(|r| ImageRef::new(r.url))
                    .ok_or(GatewayError::EmptyResponse("image model"))
            });

        match result {
            Ok(image) => {
                info!("Generated illustration at {}", image);
                Ok(image)
            }
            Err(e) => {
                warn!("Image generation failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub providers that record what they were sent

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct StubChat {
        pub requests: Mutex<Vec<ChatRequest>>,
        pub fail: bool,
    }

    #[async_trait]
    impl ChatModel for StubChat {
        async fn complete(&self, request: ChatRequest) -> Result<String, GatewayError> {
            let reply = format!("[Panel 1] story for: {}", request.turns[1].content);
            self.requests.lock().push(request);
            if self.fail {
                return Err(GatewayError::Api {
                    service: "stub",
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                });
            }
            Ok(reply)
        }
    }

    #[derive(Default)]
    pub struct StubImages {
        pub requests: Mutex<Vec<ImageRequest>>,
        pub fail: bool,
        pub empty: bool,
    }

    #[async_trait]
    impl ImageModel for StubImages {
        async fn generate(&self, request: ImageRequest) -> Result<Vec<ImageResult>, GatewayError> {
            let n = {
                let mut requests = self.requests.lock();
                requests.push(request);
                requests.len()
            };
            if self.fail {
                return Err(GatewayError::Api {
                    service: "stub",
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            if self.empty {
                return Ok(Vec::new());
            }
            Ok(vec![
                ImageResult {
                    url: format!("https://img.test/{}.png", n),
                },
                ImageResult {
                    url: "https://img.test/ignored.png".to_string(),
                },
            ])
        }
    }

    pub fn gateway(chat: Arc<StubChat>, images: Arc<StubImages>) -> Gateway {
        Gateway::new(chat, images, StoryConfig::default(), ImageConfig::default())
    }
}
