//! Notes commands
//!
//! `list` shows pinned notes first, filtered by text and tag. `new` and
//! `edit` go through the autosave path and flush right away; `pin`, `tag`,
//! `color` and `delete` are direct actions.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use microaudit_core::config::Config;
use microaudit_core::domain::{Color, EditableRecord, Entity, Note};
use microaudit_core::usecases::{all_tags, NoteFilter};
use microaudit_sync::SyncController;

use super::session::{describe_mutation, describe_save, key_for, AppSession};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum NotesCommand {
    /// List notes, pinned first
    List {
        /// Only notes whose title, content or tags contain this text
        #[arg(long, short)]
        query: Option<String>,
        /// Only notes carrying this tag
        #[arg(long, short)]
        tag: Option<String>,
    },
    /// Create a note
    New {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
    },
    /// Change a note's title or content
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Pin or unpin a note
    Pin { id: String },
    /// Add a tag to a note, or remove it if present
    Tag { id: String, tag: String },
    /// Set a note's color (#RRGGBB)
    Color { id: String, color: String },
    /// Delete a note
    Delete { id: String },
}

impl NotesCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let app = AppSession::connect(config)?;
        app.require_user().await?;
        let notes: SyncController<Note> = app.controller().await?;

        let result = self.run(&notes, &*fmt, format).await;
        app.report(&*fmt);
        result
    }

    async fn run(
        &self,
        notes: &SyncController<Note>,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        match self {
            NotesCommand::List { query, tag } => {
                let records = notes.records().await;
                let filter = NoteFilter::new(query.clone().unwrap_or_default(), tag.clone());
                let view = filter.apply(&records);
                if format == OutputFormat::Json {
                    let pinned: Vec<_> = view.pinned.iter().map(|r| note_json(r)).collect();
                    let others: Vec<_> = view.others.iter().map(|r| note_json(r)).collect();
                    fmt.print_json(&serde_json::json!({
                        "pinned": pinned,
                        "others": others,
                        "tags": all_tags(&records),
                    }));
                    return Ok(());
                }
                if view.is_empty() {
                    fmt.info("No notes");
                    return Ok(());
                }
                if !view.pinned.is_empty() {
                    fmt.success("Pinned");
                    for record in &view.pinned {
                        fmt.info(&note_line(record));
                    }
                }
                if !view.others.is_empty() {
                    fmt.success("Notes");
                    for record in &view.others {
                        fmt.info(&note_line(record));
                    }
                }
                Ok(())
            }
            NotesCommand::New { title, content } => {
                let key = notes.open_new(Note::new(title.as_str(), content.as_str())).await;
                notes.schedule_save(key).await?;
                let outcome = notes.flush(key).await;
                let message = describe_save(Note::LABEL, &outcome)?;
                info!(outcome = ?outcome, "Note created");
                fmt.success(&message);
                Ok(())
            }
            NotesCommand::Edit { id, title, content } => {
                if title.is_none() && content.is_none() {
                    fmt.info("Nothing to change; pass --title or --content");
                    return Ok(());
                }
                let key = key_for(notes, id).await?;
                notes
                    .edit(key, |note| {
                        if let Some(title) = title {
                            note.title = title.clone();
                        }
                        if let Some(content) = content {
                            note.content = content.clone();
                        }
                    })
                    .await?;
                let outcome = notes.flush(key).await;
                fmt.success(&describe_save(Note::LABEL, &outcome)?);
                Ok(())
            }
            NotesCommand::Pin { id } => {
                let key = key_for(notes, id).await?;
                let outcome = notes.toggle_pinned(key).await?;
                let pinned = notes
                    .get(key)
                    .await
                    .map(|r| r.value().pinned)
                    .unwrap_or(false);
                let verb = if pinned { "Pinned" } else { "Unpinned" };
                fmt.success(&describe_mutation(Note::LABEL, verb, &outcome)?);
                Ok(())
            }
            NotesCommand::Tag { id, tag } => {
                let key = key_for(notes, id).await?;
                let outcome = notes.toggle_tag(key, tag).await?;
                fmt.success(&describe_mutation(Note::LABEL, "Tagged", &outcome)?);
                Ok(())
            }
            NotesCommand::Color { id, color } => {
                let color = Color::new(color.as_str()).context("Invalid color")?;
                let key = key_for(notes, id).await?;
                let outcome = notes.set_color(key, color).await?;
                fmt.success(&describe_mutation(Note::LABEL, "Recolored", &outcome)?);
                Ok(())
            }
            NotesCommand::Delete { id } => {
                let key = key_for(notes, id).await?;
                let outcome = notes.delete(key).await?;
                fmt.success(&describe_mutation(Note::LABEL, "Deleted", &outcome)?);
                Ok(())
            }
        }
    }
}

fn note_json(record: &EditableRecord<Note>) -> serde_json::Value {
    let note = record.value();
    serde_json::json!({
        "id": record.id().map(|id| id.as_str()),
        "title": note.title,
        "content": note.content,
        "color": note.color.as_str(),
        "tags": note.tags,
        "pinned": note.pinned,
        "updated_at": record.updated_at().to_rfc3339(),
    })
}

fn note_line(record: &EditableRecord<Note>) -> String {
    let note = record.value();
    let id = record.id().map(|id| id.as_str()).unwrap_or("-");
    let mut line = format!("{id}  {}", note.display_name());
    if !note.tags.is_empty() {
        line.push_str(&format!("  [{}]", note.tags.join(", ")));
    }
    line
}
