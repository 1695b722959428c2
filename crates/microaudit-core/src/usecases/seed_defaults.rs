//! Seed default notes use case
//!
//! A new account starts with two notes: a pinned welcome note and a short
//! how-to. The how-to is stamped one second earlier so the welcome note
//! sorts first in the newest-first list.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::domain::record::build_payload;
use crate::domain::{Color, EditableRecord, Entity, Note, OwnerId};
use crate::ports::IRemoteStore;

const WELCOME_TITLE: &str = "Welcome to MicroAudit! 👋";
const WELCOME_BODY: &str = "We're thrilled to have you on board! 🎉\n\n\
MicroAudit is your personal space to keep everything organized and accessible.\n\n\
Here's what you can do:\n\
• 📝 Capture Thoughts: jot down ideas, lists, and important info.\n\
• 📂 Manage Documents: upload and store your files securely.\n\
• 🔍 Find Fast: use search and tags to locate anything in seconds.\n\n\
Make yourself at home! 🏠";
const WELCOME_COLOR: &str = "#DBEAFE";

const HOWTO_TITLE: &str = "How to use MicroAudit 📝";
const HOWTO_BODY: &str = "A few quick tips:\n\n\
1. Create a Note ➕\n   Tap the + button to start writing.\n\n\
2. Organize with Tags 🏷️\n   Add tags like 'Work', 'Personal', or 'Ideas'.\n\n\
3. Color Code 🌈\n   Change the note color for visual organization.\n\n\
4. Pin Important Notes 📌\n   Pinned notes stay at the top of the list.\n\n\
Happy auditing! 🚀";
const HOWTO_COLOR: &str = "#FCE7F3";

/// Returns the default notes with their timestamps, newest first
///
/// # Errors
///
/// Returns an error only if the built-in colors fail to parse
pub fn default_notes(now: DateTime<Utc>) -> Result<Vec<(Note, DateTime<Utc>)>> {
    let welcome = Note::new(WELCOME_TITLE, WELCOME_BODY)
        .with_color(Color::new(WELCOME_COLOR)?)
        .pinned();
    let howto = Note::new(HOWTO_TITLE, HOWTO_BODY).with_color(Color::new(HOWTO_COLOR)?);
    Ok(vec![(welcome, now), (howto, now - Duration::seconds(1))])
}

/// Use case for seeding a new account's notes
pub struct SeedDefaultsUseCase {
    store: Arc<dyn IRemoteStore + Send + Sync>,
}

impl SeedDefaultsUseCase {
    /// Creates the use case
    pub fn new(store: Arc<dyn IRemoteStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// Creates the default notes for `owner`
    ///
    /// # Errors
    ///
    /// Returns an error if any create fails; notes created before the
    /// failure are kept in the store.
    pub async fn execute(&self, owner: &OwnerId) -> Result<Vec<EditableRecord<Note>>> {
        let mut created = Vec::new();
        for (note, at) in default_notes(Utc::now())? {
            let payload = build_payload(&note, owner, at)?;
            let row = self
                .store
                .create(Note::TABLE, payload)
                .await
                .with_context(|| format!("Failed to create default note '{}'", note.title))?;
            created.push(EditableRecord::from_row(&row)?);
        }
        info!(owner = %owner, count = created.len(), "Seeded default notes");
        Ok(created)
    }
}
