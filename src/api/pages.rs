//! HTML page and generation actions
//!
//! GET  /            - Render the caller's session
//! POST /story       - Generate a story and its cover illustration
//! POST /storyboard  - Generate one storyboard panel

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tracing::{error, info};

use super::session::SessionCookie;
use super::AppState;
use crate::genre::Genre;
use crate::render::{FormValues, Notice};

/// Build the page router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/story", post(generate_story))
        .route("/storyboard", post(generate_storyboard))
}

/// Submitted form fields
///
/// Every action posts the whole form so its values can be echoed back.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub description: String,
}

/// Render the page with the given status and notices
fn render_page(
    state: &AppState,
    session: &SessionCookie,
    status: StatusCode,
    form: &FormValues,
    notices: &[Notice],
) -> Response {
    let snapshot = state.sessions.snapshot(session.id);

    let response = match state.renderer.render(&snapshot, form, notices) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    };

    session.attach(response)
}

/// Resolve submitted values, falling back to the configured genre
fn form_values(state: &AppState, form: &GenerateForm) -> (FormValues, Option<Genre>) {
    let genre = Genre::from_str(&form.genre);
    let values = FormValues {
        prompt: form.prompt.clone(),
        genre: genre.unwrap_or(state.defaults.genre),
        description: form.description.clone(),
    };
    (values, genre)
}

fn busy_notice() -> Notice {
    Notice::error("A generation is already in progress for this session. Please wait for it to finish.")
}

/// Render the caller's page with default form values
async fn index(State(state): State<AppState>, session: SessionCookie) -> Response {
    let form = FormValues {
        prompt: state.defaults.prompt.clone(),
        genre: state.defaults.genre,
        description: String::new(),
    };
    render_page(&state, &session, StatusCode::OK, &form, &[])
}

/// Generate the manga story and the cover illustration for the prompt
async fn generate_story(
    State(state): State<AppState>,
    session: SessionCookie,
    Form(form): Form<GenerateForm>,
) -> Response {
    let (values, genre) = form_values(&state, &form);

    let Some(genre) = genre else {
        let notice = Notice::warning(format!("Unknown genre: {}", form.genre));
        return render_page(&state, &session, StatusCode::UNPROCESSABLE_ENTITY, &values, &[notice]);
    };

    let Some(_guard) = state.sessions.begin_generation(session.id) else {
        return render_page(&state, &session, StatusCode::CONFLICT, &values, &[busy_notice()]);
    };

    let prompt = values.prompt.as_str();
    let cover_wanted = !prompt.trim().is_empty();

    info!("Session {} requested a {} story", session.id, genre);
    let (story, cover) = tokio::join!(state.gateway.generate_story(prompt, genre), async {
        if cover_wanted {
            Some(state.gateway.generate_illustration(prompt).await)
        } else {
            None
        }
    });

    let mut notices = Vec::new();
    let mut status = StatusCode::OK;

    // The cover belongs to the story; a failed story keeps the previous pair
    let story_ok = match story {
        Ok(story) => {
            state.sessions.update(session.id, |s| s.record_story(story));
            true
        }
        Err(e) => {
            status = StatusCode::BAD_GATEWAY;
            notices.push(Notice::error(format!("Story generation failed: {}", e)));
            false
        }
    };

    match cover {
        Some(Ok(image)) if story_ok => state
            .sessions
            .update(session.id, |s| s.record_cover_image(image)),
        Some(Ok(_)) => info!("Session {} discarded a cover without a story", session.id),
        Some(Err(e)) => notices.push(Notice::warning(format!("Image generation failed: {}", e))),
        None => notices.push(Notice::warning(
            "Please provide a prompt to generate a manga illustration.",
        )),
    }

    render_page(&state, &session, status, &values, &notices)
}

/// Generate one storyboard panel from the description
async fn generate_storyboard(
    State(state): State<AppState>,
    session: SessionCookie,
    Form(form): Form<GenerateForm>,
) -> Response {
    let (values, _) = form_values(&state, &form);
    if values.description.trim().is_empty() {
        let notice = Notice::warning("Please provide a description for the storyboard image.");
        return render_page(&state, &session, StatusCode::UNPROCESSABLE_ENTITY, &values, &[notice]);
    }

    let Some(_guard) = state.sessions.begin_generation(session.id) else {
        return render_page(&state, &session, StatusCode::CONFLICT, &values, &[busy_notice()]);
    };

    info!("Session {} requested a storyboard panel", session.id);
    match state.gateway.generate_illustration(&values.description).await {
        Ok(image) => {
            let number = state.sessions.update(session.id, |s| {
                s.append_storyboard_entry(values.description.clone(), image)
            });
            info!("Session {} now has {} storyboard panels", session.id, number);
            render_page(&state, &session, StatusCode::OK, &values, &[])
        }
        Err(e) => {
            let notice = Notice::warning(format!("Image generation failed: {}", e));
            render_page(&state, &session, StatusCode::BAD_GATEWAY, &values, &[notice])
        }
    }
}
