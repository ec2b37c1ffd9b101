//! Manga genres offered in the genre selector

use std::fmt;

use serde::{Deserialize, Serialize};

/// Genre of a generated manga story
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Genre {
    #[default]
    Romance,
    Action,
    Fantasy,
    #[serde(rename = "Sci-Fi")]
    SciFi,
    Horror,
}

impl Genre {
    /// All genres, in selector order
    pub const ALL: [Genre; 5] = [
        Genre::Romance,
        Genre::Action,
        Genre::Fantasy,
        Genre::SciFi,
        Genre::Horror,
    ];

    /// Display name, as embedded in prompts and shown in the selector
    pub fn name(&self) -> &'static str {
        match self {
            Genre::Romance => "Romance",
            Genre::Action => "Action",
            Genre::Fantasy => "Fantasy",
            Genre::SciFi => "Sci-Fi",
            Genre::Horror => "Horror",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Genre> {
        match s.trim().to_lowercase().as_str() {
            "romance" => Some(Genre::Romance),
            "action" => Some(Genre::Action),
            "fantasy" => Some(Genre::Fantasy),
            "sci-fi" | "scifi" | "sci fi" => Some(Genre::SciFi),
            "horror" => Some(Genre::Horror),
            _ => None,
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
