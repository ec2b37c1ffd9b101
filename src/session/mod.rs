//! Session state
//!
//! Each browser session gets a `SessionState` holding:
//! - The last generated story (overwritten on each generation)
//! - The last generated cover illustration (overwritten likewise)
//! - The storyboard, an append-only list of panels
//!
//! Panel numbers are the 1-based position in the storyboard and are never
//! stored.

mod store;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gateway::{ImageRef, StoryResult};

pub use store::{GenerationGuard, SessionStore};

/// One illustrated storyboard panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryboardEntry {
    pub description: String,
    pub image: ImageRef,
    pub created_at: DateTime<Utc>,
}

/// Generated artifacts of one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    story: Option<StoryResult>,
    cover_image: Option<ImageRef>,
    storyboard: Vec<StoryboardEntry>,
}

impl SessionState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn story(&self) -> Option<&StoryResult> {
        self.story.as_ref()
    }

    pub fn cover_image(&self) -> Option<&ImageRef> {
        self.cover_image.as_ref()
    }

    pub fn storyboard(&self) -> &[StoryboardEntry] {
        &self.storyboard
    }

    /// True until something has been generated
    pub fn is_empty(&self) -> bool {
        self.story.is_none() && self.cover_image.is_none() && self.storyboard.is_empty()
    }

    /// Replace the story
    pub fn record_story(&mut self, story: StoryResult) {
        self.story = Some(story);
    }

    /// Replace the cover illustration
    pub fn record_cover_image(&mut self, image: ImageRef) {
        self.cover_image = Some(image);
    }

    /// Add a panel at the end of the storyboard, returning its panel number
    pub fn append_storyboard_entry(&mut self, description: impl Into<String>, image: ImageRef) -> usize {
        self.storyboard.push(StoryboardEntry {
            description: description.into(),
            image,
            created_at: Utc::now(),
        });
        self.storyboard.len()
    }

    /// Panels with their numbers, in display order
    pub fn panels(&self) -> impl Iterator<Item = (usize, &StoryboardEntry)> {
        self.storyboard.iter().enumerate().map(|(i, e)| (i + 1, e))
    }

    /// Panel by its 1-based number
    pub fn panel(&self, number: usize) -> Option<&StoryboardEntry> {
        number.checked_sub(1).and_then(|i| self.storyboard.get(i))
    }
}
