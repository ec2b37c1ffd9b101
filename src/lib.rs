//! mangad - manga story and storyboard generation server
//!
//! Turns a prompt and a genre into a short manga script and matching
//! illustrations using hosted language and image models.

pub mod api;
pub mod config;
pub mod gateway;
pub mod genre;
pub mod render;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub use config::Config;

use api::AppState;
use gateway::{Gateway, GroqClient, TogetherClient};
use render::Renderer;
use session::SessionStore;

/// The mangad server instance
pub struct Server {
    config: Config,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a server talking to the configured Groq and Together endpoints
    pub fn new(config: Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let chat = GroqClient::new(&config.story, timeout)?;
        let images = TogetherClient::new(&config.image, timeout)?;

        let gateway = Gateway::new(
            Arc::new(chat),
            Arc::new(images),
            config.story.clone(),
            config.image.clone(),
        );

        Self::with_gateway(config, gateway)
    }

    /// Create a server around an existing gateway
    pub fn with_gateway(config: Config, gateway: Gateway) -> Result<Self> {
        if !gateway.story_configured() {
            warn!("GROQ_API_KEY not set; story generation will fail");
        }
        if !gateway.image_configured() {
            warn!("TOGETHER_API_KEY not set; image generation will fail");
        }

        let state = AppState {
            sessions: Arc::new(SessionStore::new()),
            gateway: Arc::new(gateway),
            renderer: Arc::new(Renderer::new()?),
            defaults: Arc::new(config.defaults.clone()),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the session store
    pub fn sessions(&self) -> Arc<SessionStore> {
        self.state.sessions.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("mangad listening on {}", local_addr);

        if self.config.session_idle_secs > 0 {
            let max_idle = Duration::from_secs(self.config.session_idle_secs);
            let every = Duration::from_secs(self.config.session_sweep_secs.max(1));
            info!("Sessions idle for {:?} are evicted every {:?}", max_idle, every);
            tokio::spawn(self.sessions().run_sweeper(
                max_idle,
                every,
                self.shutdown_rx.clone(),
            ));
        }

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("mangad shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
