//! Workspace and resource entities
//!
//! A workspace groups notes, tasks and resources (saved links and images).
//! Renaming a workspace or changing its icon or color is a direct action;
//! the list view offers a title search and a task progress figure.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{Color, RecordId};
use super::record::{null_as_default, Entity, Table};
use super::task::Task;

/// Icon used when a workspace does not carry one
pub const DEFAULT_ICON: &str = "🗂️";

// ============================================================================
// Workspace
// ============================================================================

/// A named collection of notes, tasks and resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Workspace title, never blank
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Emoji icon
    #[serde(default = "default_icon", deserialize_with = "icon_or_default")]
    pub icon: String,
    /// Card color
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: Color,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn icon_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let icon: Option<String> = Option::deserialize(deserializer)?;
    Ok(icon.filter(|i| !i.trim().is_empty()).unwrap_or_else(default_icon))
}

impl Workspace {
    /// Creates a workspace with the default icon and white color
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            icon: default_icon(),
            color: Color::default(),
        }
    }

    /// Sets the icon
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Sets the color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Case-insensitive title search; an empty query matches everything
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty() || self.title.to_lowercase().contains(&query)
    }
}

impl Entity for Workspace {
    const TABLE: Table = Table::Workspaces;
    const LABEL: &'static str = "workspace";

    fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "workspace title cannot be empty".into(),
            ));
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        self.title.clone()
    }

    fn normalized(&self) -> Self {
        let mut workspace = self.clone();
        workspace.title = workspace.title.trim().to_string();
        workspace
    }
}

/// Completion percentage of a set of tasks: `round(done * 100 / total)`
///
/// Returns 0 when there are no tasks.
pub fn task_progress<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> u8 {
    let (done, total) = tasks.into_iter().fold((0usize, 0usize), |(d, t), task| {
        (d + usize::from(task.done), t + 1)
    });
    if total == 0 {
        return 0;
    }
    let percent = (done as f64 * 100.0 / total as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

// ============================================================================
// Resource
// ============================================================================

/// Kind of saved resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Uploaded image
    Image,
    /// Web link
    Link,
}

/// A link or image attached to a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Owning workspace
    pub workspace_id: RecordId,
    /// Resource kind, stored in the `type` column
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Display title
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Target URL (links) or storage URL (images)
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

impl Resource {
    /// Creates a link resource
    ///
    /// URLs without a scheme get `https://`; a blank title falls back to
    /// the URL.
    ///
    /// # Errors
    /// Returns [`DomainError::ValidationFailed`] if the URL is blank
    pub fn link(
        workspace_id: RecordId,
        title: &str,
        url: &str,
    ) -> Result<Self, DomainError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DomainError::ValidationFailed("link URL cannot be empty".into()));
        }
        let lower = url.to_ascii_lowercase();
        let url = if lower.starts_with("http://") || lower.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };
        let title = match title.trim() {
            "" => url.clone(),
            t => t.to_string(),
        };
        Ok(Self {
            workspace_id,
            kind: ResourceKind::Link,
            title,
            url,
        })
    }

    /// Creates an image resource
    pub fn image(workspace_id: RecordId, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            workspace_id,
            kind: ResourceKind::Image,
            title: title.into(),
            url: url.into(),
        }
    }
}

impl Entity for Resource {
    const TABLE: Table = Table::Resources;
    const LABEL: &'static str = "resource";

    fn validate(&self) -> Result<(), DomainError> {
        if self.url.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "resource URL cannot be empty".into(),
            ));
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        if self.title.is_empty() {
            self.url.clone()
        } else {
            self.title.clone()
        }
    }
}
