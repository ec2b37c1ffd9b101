//! Common test utilities - MangaTest harness for end-to-end testing
//!
//! Starts a real mangad server on a random port with stub language and
//! image models that record every request they receive.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mangad::config::{ImageConfig, StoryConfig};
use mangad::gateway::{
    ChatModel, ChatRequest, Gateway, GatewayError, ImageModel, ImageRequest, ImageResult,
};
use mangad::{Config, Server};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;

/// Blocks a stub call until the test releases it
pub struct Gate {
    entered: Notify,
    release: Semaphore,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        })
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }

    /// Wait until a call is blocked on the gate
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let one blocked call continue
    pub fn open(&self) {
        self.release.add_permits(1);
    }
}

/// Language model stub replying with the prompt it was given
#[derive(Default)]
pub struct StubChat {
    pub requests: Mutex<Vec<ChatRequest>>,
    pub fail: AtomicBool,
    pub gate: Mutex<Option<Arc<Gate>>>,
}

impl StubChat {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatModel for StubChat {
    async fn complete(&self, request: ChatRequest) -> Result<String, GatewayError> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let reply = format!(
            "[Panel 1] {}",
            request.turns.last().map(|t| t.content.as_str()).unwrap_or("")
        );
        self.requests.lock().push(request);

        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                service: "stub",
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(reply)
    }
}

/// Image model stub returning numbered URLs
#[derive(Default)]
pub struct StubImages {
    pub requests: Mutex<Vec<ImageRequest>>,
    pub fail: AtomicBool,
}

impl StubImages {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ImageModel for StubImages {
    async fn generate(&self, request: ImageRequest) -> Result<Vec<ImageResult>, GatewayError> {
        let n = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len()
        };

        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                service: "stub",
                status: StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        Ok(vec![ImageResult {
            url: format!("https://images.test/{}.png", n),
        }])
    }
}

/// Test harness that spawns a real mangad server on a random port
pub struct MangaTest {
    pub addr: SocketAddr,
    pub client: Client,
    pub chat: Arc<StubChat>,
    pub images: Arc<StubImages>,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl MangaTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Start a test server with adjusted configuration
    pub async fn start_with(configure: impl FnOnce(&mut Config)) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let mut config = Config {
            bind_addr: addr,
            ..Default::default()
        };
        configure(&mut config);

        let chat = Arc::new(StubChat::default());
        let images = Arc::new(StubImages::default());
        let gateway = Gateway::new(
            chat.clone(),
            images.clone(),
            StoryConfig::default(),
            ImageConfig::default(),
        );

        let server = Arc::new(Server::with_gateway(config, gateway)?);
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Self::new_client()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            chat,
            images,
            server,
            _handle: handle,
        })
    }

    /// A client with its own cookie jar, i.e. its own session
    pub fn new_client() -> Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(5))
            .cookie_store(true)
            .build()?)
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with a form body
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<reqwest::Response> {
        post_form_with(&self.client, &self.base_url(), path, form).await
    }

    /// Fetch the session JSON view
    pub async fn session(&self) -> Result<serde_json::Value> {
        Ok(self.get("/api/session").await?.json().await?)
    }

    /// Get the running server
    pub fn server(&self) -> Arc<Server> {
        self.server.clone()
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

/// POST a form with an arbitrary client
pub async fn post_form_with(
    client: &Client,
    base_url: &str,
    path: &str,
    form: &[(&str, &str)],
) -> Result<reqwest::Response> {
    Ok(client
        .post(format!("{}{}", base_url, path))
        .form(form)
        .send()
        .await?)
}

/// HTML with minijinja's `/` escaping undone
pub async fn page_text(resp: reqwest::Response) -> Result<String> {
    Ok(resp.text().await?.replace("&#x2f;", "/"))
}

impl Drop for MangaTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
