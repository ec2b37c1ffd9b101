//! Session cookie and JSON session endpoint
//!
//! GET /api/session - Current session state with derived panel numbers

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::AppState;
use crate::gateway::{ImageRef, StoryResult};

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "mangad_session";

/// Build the session router
pub fn router() -> Router<AppState> {
    Router::new().route("/api/session", get(get_session))
}

/// Session id taken from the request cookie, or freshly issued
#[derive(Debug, Clone, Copy)]
pub struct SessionCookie {
    pub id: Uuid,
    pub is_new: bool,
}

impl SessionCookie {
    /// Attach a `Set-Cookie` header if the session was just issued
    pub fn attach(&self, mut response: Response) -> Response {
        if self.is_new {
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                SESSION_COOKIE, self.id
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        response
    }
}

impl<S> FromRequestParts<S> for SessionCookie
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session_id_from_headers(&parts.headers) {
            Some(id) => Ok(Self { id, is_new: false }),
            None => {
                let id = Uuid::new_v4();
                debug!("Issuing new session {}", id);
                Ok(Self { id, is_new: true })
            }
        }
    }
}

/// Find a valid session id among the request's cookies
fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// Panel in the JSON view
#[derive(Debug, Serialize)]
pub struct PanelResponse {
    pub number: usize,
    pub description: String,
    pub image: ImageRef,
    pub created_at: DateTime<Utc>,
}

/// JSON view of a session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub story: Option<StoryResult>,
    pub cover_image: Option<ImageRef>,
    pub panels: Vec<PanelResponse>,
}

/// Return the caller's session state
///
/// Read only: an unknown session id is shown as empty and not stored.
async fn get_session(State(state): State<AppState>, session: SessionCookie) -> Response {
    let snapshot = state.sessions.snapshot(session.id);

    let body = SessionResponse {
        session_id: session.id,
        story: snapshot.story().cloned(),
        cover_image: snapshot.cover_image().cloned(),
        panels: snapshot
            .panels()
            .map(|(number, entry)| PanelResponse {
                number,
                description: entry.description.clone(),
                image: entry.image.clone(),
                created_at: entry.created_at,
            })
            .collect(),
    };

    session.attach(Json(body).into_response())
}
