//! Note entity
//!
//! Notes are edited continuously (title, content) and therefore saved
//! through the debounced path; pin, color and tag changes are direct
//! actions applied optimistically.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::Color;
use super::record::{null_as_default, Entity, Table};

/// Title written when the user leaves a note untitled
pub const UNTITLED: &str = "Untitled";

/// A free-form note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Note title; empty means "Untitled"
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Body text
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    /// Background color
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: Color,
    /// Tags in insertion order, without duplicates
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Whether the note is pinned to the top of the list
    #[serde(default, deserialize_with = "null_as_default")]
    pub pinned: bool,
}

impl Note {
    /// Creates an unpinned white note with the given title and content
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            color: Color::default(),
            tags: Vec::new(),
            pinned: false,
        }
    }

    /// Sets the color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Adds tags, skipping duplicates
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.add_tag(tag);
        }
        self
    }

    /// Marks the note pinned
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Returns true if the note carries `tag`
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Adds `tag` if absent; returns true if it was added
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        let tag = tag.trim();
        if tag.is_empty() || self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Adds `tag` if absent, removes it otherwise
    pub fn toggle_tag(&mut self, tag: &str) {
        if self.has_tag(tag) {
            self.tags.retain(|t| t != tag);
        } else {
            self.add_tag(tag);
        }
    }

    /// Returns true if `query` occurs (case-insensitively) in the title,
    /// the content or any tag
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query)
            || self.content.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new(UNTITLED, "")
    }
}

impl Entity for Note {
    const TABLE: Table = Table::Notes;
    const LABEL: &'static str = "note";

    fn validate(&self) -> Result<(), DomainError> {
        let mut seen = std::collections::HashSet::new();
        for tag in &self.tags {
            if tag.trim().is_empty() {
                return Err(DomainError::ValidationFailed(
                    "note tags cannot be blank".into(),
                ));
            }
            if !seen.insert(tag.as_str()) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate note tag: {tag}"
                )));
            }
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        if self.title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            self.title.clone()
        }
    }

    fn normalized(&self) -> Self {
        let mut note = self.clone();
        if note.title.trim().is_empty() {
            note.title = UNTITLED.to_string();
        }
        let mut tags = Vec::with_capacity(note.tags.len());
        for tag in note.tags.drain(..) {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        note.tags = tags;
        note
    }
}
