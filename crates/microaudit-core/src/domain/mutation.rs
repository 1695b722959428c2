//! Optimistic mutation descriptions
//!
//! A direct action (toggle, rename, update, delete) is applied to local
//! state before the remote call. [`FieldSnapshot`] keeps the pre-action
//! values of exactly the fields the action changed, so a failed remote call
//! can put those fields back without clobbering anything else the user did
//! in the meantime.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::record::{Entity, Fields};

/// A direct user action on a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationAction {
    /// Flip a boolean field
    Toggle { field: String },
    /// Change the record's title
    Rename,
    /// Set a field to a new value
    Update { field: String },
    /// Remove the record
    Delete,
}

impl MutationAction {
    /// Convenience constructor for [`MutationAction::Toggle`]
    pub fn toggle(field: impl Into<String>) -> Self {
        Self::Toggle {
            field: field.into(),
        }
    }

    /// Convenience constructor for [`MutationAction::Update`]
    pub fn update(field: impl Into<String>) -> Self {
        Self::Update {
            field: field.into(),
        }
    }

    /// Verb used in notifications, e.g. "update" in "Could not update note"
    pub fn verb(&self) -> &'static str {
        match self {
            MutationAction::Toggle { .. } | MutationAction::Update { .. } => "update",
            MutationAction::Rename => "rename",
            MutationAction::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationAction::Toggle { field } => write!(f, "toggle {field}"),
            MutationAction::Rename => write!(f, "rename"),
            MutationAction::Update { field } => write!(f, "update {field}"),
            MutationAction::Delete => write!(f, "delete"),
        }
    }
}

// ============================================================================
// FieldSnapshot
// ============================================================================

/// Pre-mutation values of the fields an action changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSnapshot {
    before: Fields,
    after: Fields,
}

impl FieldSnapshot {
    /// Compares two entity values and keeps the fields that differ
    ///
    /// # Errors
    /// Propagates serialization failures from [`Entity::to_fields`]
    pub fn capture<T: Entity>(before: &T, after: &T) -> Result<Self, DomainError> {
        let before = before.to_fields()?;
        let after = after.to_fields()?;

        let mut snapshot = Self::default();
        let keys = before.keys().chain(after.keys().filter(|k| !before.contains_key(*k)));
        for key in keys {
            let old = before.get(key).cloned().unwrap_or(Value::Null);
            let new = after.get(key).cloned().unwrap_or(Value::Null);
            if old != new {
                snapshot.before.insert(key.clone(), old);
                snapshot.after.insert(key.clone(), new);
            }
        }
        Ok(snapshot)
    }

    /// Returns true if the action changed nothing
    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
    }

    /// Names of the changed fields
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.before.keys().map(String::as_str)
    }

    /// Values before the action
    pub fn before(&self) -> &Fields {
        &self.before
    }

    /// Values after the action; this is the remote update payload
    pub fn after(&self) -> &Fields {
        &self.after
    }

    /// Writes the pre-action values onto `current`, leaving other fields as
    /// they are
    ///
    /// # Errors
    /// Returns an error if the merged field map no longer describes a valid
    /// entity
    pub fn restore_onto<T: Entity>(&self, current: &T) -> Result<T, DomainError> {
        let mut fields = serde_json::to_value(current)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .ok_or_else(|| DomainError::MalformedRecord(format!("{} is not an object", T::LABEL)))?;
        for (key, value) in &self.before {
            if value.is_null() {
                fields.remove(key);
            } else {
                fields.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| DomainError::MalformedRecord(format!("{}: {e}", T::LABEL)))
    }
}

/// A direct action paired with the snapshot needed to undo it
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticMutation {
    /// What the user did
    pub action: MutationAction,
    /// Pre-action values of the touched fields
    pub snapshot: FieldSnapshot,
}

impl OptimisticMutation {
    /// Builds the mutation by diffing the value before and after the action
    ///
    /// # Errors
    /// Propagates serialization failures from [`FieldSnapshot::capture`]
    pub fn capture<T: Entity>(
        action: MutationAction,
        before: &T,
        after: &T,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            action,
            snapshot: FieldSnapshot::capture(before, after)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::newtypes::{Color, RecordId};
    use crate::domain::note::Note;
    use crate::domain::task::Task;

    #[test]
    fn test_capture_keeps_only_changed_fields() {
        let before = Task::new("Groceries");
        let mut after = before.clone();
        after.done = true;

        let snapshot = FieldSnapshot::capture(&before, &after).unwrap();
        assert_eq!(snapshot.fields().collect::<Vec<_>>(), vec!["done"]);
        assert_eq!(snapshot.before()["done"], json!(false));
        assert_eq!(snapshot.after()["done"], json!(true));
    }

    #[test]
    fn test_restore_preserves_concurrent_edits() {
        let before = Note::new("Plan", "draft");
        let mut after = before.clone();
        after.pinned = true;
        let snapshot = FieldSnapshot::capture(&before, &after).unwrap();

        // The user kept typing while the pin request was in flight
        let mut current = after.clone();
        current.content = "draft, extended".into();

        let restored = snapshot.restore_onto(&current).unwrap();
        assert!(!restored.pinned);
        assert_eq!(restored.content, "draft, extended");
    }

    #[test]
    fn test_restore_removes_fields_absent_before() {
        let before = Task::new("x");
        let after = before.clone().in_workspace(RecordId::new("w1").unwrap());
        let snapshot = FieldSnapshot::capture(&before, &after).unwrap();
        assert_eq!(snapshot.before()["workspace_id"], Value::Null);

        let restored = snapshot.restore_onto(&after).unwrap();
        assert!(restored.workspace_id.is_none());
    }

    #[test]
    fn test_noop_action_is_empty() {
        let note = Note::default().with_color(Color::new("#FDE68A").unwrap());
        let snapshot = FieldSnapshot::capture(&note, &note.clone()).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_action_verbs() {
        assert_eq!(MutationAction::toggle("done").verb(), "update");
        assert_eq!(MutationAction::Rename.verb(), "rename");
        assert_eq!(MutationAction::Delete.to_string(), "delete");
    }
}
