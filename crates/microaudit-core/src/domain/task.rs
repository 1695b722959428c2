//! Task entity

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RecordId;
use super::record::{null_as_default, Entity, Table};

/// A to-do item, optionally attached to a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task title, never blank
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Completion flag
    #[serde(default, deserialize_with = "null_as_default")]
    pub done: bool,
    /// Owning workspace, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<RecordId>,
}

impl Task {
    /// Creates an open task
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            done: false,
            workspace_id: None,
        }
    }

    /// Attaches the task to a workspace
    pub fn in_workspace(mut self, workspace_id: RecordId) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }
}

impl Entity for Task {
    const TABLE: Table = Table::Tasks;
    const LABEL: &'static str = "task";

    fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "task title cannot be empty".into(),
            ));
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        self.title.clone()
    }

    fn normalized(&self) -> Self {
        let mut task = self.clone();
        task.title = task.title.trim().to_string();
        task
    }
}
