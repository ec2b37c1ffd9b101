//! HTML rendering of a session
//!
//! A pure read of `SessionState`: the input form, the story / cover block
//! and one row per storyboard panel. All text goes through minijinja's HTML
//! auto-escaping.

use minijinja::Environment;
use serde::Serialize;

use crate::genre::Genre;
use crate::session::SessionState;

const PAGE_TEMPLATE_NAME: &str = "page.html";
const PAGE_TEMPLATE: &str = include_str!("page.html");

/// Severity of an inline notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// Message shown near the form controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Current values of the input form
#[derive(Debug, Clone, PartialEq)]
pub struct FormValues {
    pub prompt: String,
    pub genre: Genre,
    pub description: String,
}

#[derive(Serialize)]
struct GenreOption {
    name: &'static str,
    selected: bool,
}

#[derive(Serialize)]
struct StoryView<'a> {
    text: &'a str,
    genre: &'static str,
}

#[derive(Serialize)]
struct PanelView<'a> {
    number: usize,
    description: &'a str,
    image_url: &'a str,
}

#[derive(Serialize)]
struct PageContext<'a> {
    prompt: &'a str,
    description: &'a str,
    genres: Vec<GenreOption>,
    notices: &'a [Notice],
    show_results: bool,
    story: Option<StoryView<'a>>,
    cover_image: Option<&'a str>,
    panels: Vec<PanelView<'a>>,
}

/// Page renderer with the compiled template
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(PAGE_TEMPLATE_NAME, PAGE_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Render the page for a session
    pub fn render(
        &self,
        state: &SessionState,
        form: &FormValues,
        notices: &[Notice],
    ) -> Result<String, minijinja::Error> {
        let context = PageContext {
            prompt: &form.prompt,
            description: &form.description,
            genres: Genre::ALL
                .iter()
                .map(|g| GenreOption {
                    name: g.name(),
                    selected: *g == form.genre,
                })
                .collect(),
            notices,
            show_results: !state.is_empty(),
            story: state.story().map(|s| StoryView {
                text: &s.text,
                genre: s.genre.name(),
            }),
            cover_image: state.cover_image().map(|i| i.url()),
            panels: state
                .panels()
                .map(|(number, entry)| PanelView {
                    number,
                    description: &entry.description,
                    image_url: entry.image.url(),
                })
                .collect(),
        };

        self.env.get_template(PAGE_TEMPLATE_NAME)?.render(context)
    }
}
