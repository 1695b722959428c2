//! Note list filtering
//!
//! Pure view logic over the local note collection: a free-text query, a tag
//! filter and the pinned/others split used by the notes screen.

use serde::{Deserialize, Serialize};

use crate::domain::{EditableRecord, Note};

/// Tag filter value that matches every note
pub const ALL_TAGS: &str = "All";

/// Query and tag selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFilter {
    /// Case-insensitive text searched in title, content and tags
    pub query: String,
    /// Selected tag, or [`ALL_TAGS`]
    pub tag: String,
}

impl Default for NoteFilter {
    fn default() -> Self {
        Self {
            query: String::new(),
            tag: ALL_TAGS.to_string(),
        }
    }
}

/// Filtered notes split into the pinned section and the rest
#[derive(Debug, Clone, PartialEq)]
pub struct NoteListView<'a> {
    pub pinned: Vec<&'a EditableRecord<Note>>,
    pub others: Vec<&'a EditableRecord<Note>>,
}

impl NoteListView<'_> {
    /// Returns true if no note passed the filter
    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty() && self.others.is_empty()
    }

    /// Total number of notes in both sections
    pub fn len(&self) -> usize {
        self.pinned.len() + self.others.len()
    }
}

impl NoteFilter {
    /// Creates a filter
    pub fn new(query: impl Into<String>, tag: Option<String>) -> Self {
        Self {
            query: query.into(),
            tag: tag.unwrap_or_else(|| ALL_TAGS.to_string()),
        }
    }

    /// Returns true if `note` passes both the query and the tag filter
    pub fn matches(&self, note: &Note) -> bool {
        let tag_ok = self.tag == ALL_TAGS || note.has_tag(&self.tag);
        tag_ok && note.matches_query(&self.query)
    }

    /// Applies the filter, keeping the input order within each section
    pub fn apply<'a>(&self, notes: &'a [EditableRecord<Note>]) -> NoteListView<'a> {
        let (pinned, others) = notes
            .iter()
            .filter(|r| self.matches(r.value()))
            .partition(|r| r.value().pinned);
        NoteListView { pinned, others }
    }
}

/// Tag choices for the filter bar: [`ALL_TAGS`] first, then every tag in
/// first-seen order
pub fn all_tags(notes: &[EditableRecord<Note>]) -> Vec<String> {
    let mut tags = vec![ALL_TAGS.to_string()];
    for tag in notes.iter().flat_map(|r| r.value().tags.iter()) {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}
