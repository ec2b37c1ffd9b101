//! HTTP API module - HTML page, generation actions and JSON endpoints

mod pages;
mod session;

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::FormDefaults;
use crate::gateway::Gateway;
use crate::render::Renderer;
use crate::session::SessionStore;

pub use pages::GenerateForm;
pub use session::{SessionCookie, SessionResponse, SESSION_COOKIE};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub gateway: Arc<Gateway>,
    pub renderer: Arc<Renderer>,
    pub defaults: Arc<FormDefaults>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(pages::router())
        .merge(session::router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        story_model: state.gateway.story_configured(),
        image_model: state.gateway.image_configured(),
        sessions: state.sessions.len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    story_model: bool,
    image_model: bool,
    sessions: usize,
}
