//! Per-record save state and pending writes
//!
//! ## State Machine
//!
//! ```text
//! Clean ──edit──► Dirty ──timer──► Saving ──ok──► Clean
//!                   ▲                 │
//!                   │                 ├──edit──► Dirty
//!                   │                 │
//!                   └──edit── DirtyWithError ◄──error──┘
//! ```
//!
//! A failed save never reverts the user's text; the record stays dirty and
//! the next edit schedules a new attempt. When an edit lands during a write
//! the state is already `Dirty` by the time the write finishes, so a failure
//! moves `Dirty → DirtyWithError` directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{LocalKey, OwnerId, RecordId};
use super::record::{build_payload, Entity, Fields};

/// Save lifecycle of one editable record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum SaveState {
    /// Local value equals the last confirmed write
    #[default]
    Clean,
    /// Local edits are waiting for the debounce timer
    Dirty,
    /// A write is in flight
    Saving,
    /// The last write failed; local edits are kept
    DirtyWithError(String),
}

impl SaveState {
    /// Returns true if local edits have not been confirmed
    pub fn is_dirty(&self) -> bool {
        !matches!(self, SaveState::Clean)
    }

    /// Returns true while a write is in flight
    pub fn is_saving(&self) -> bool {
        matches!(self, SaveState::Saving)
    }

    /// Returns true if the last write failed
    pub fn is_error(&self) -> bool {
        matches!(self, SaveState::DirtyWithError(_))
    }

    /// Short status text shown next to the editor
    pub fn indicator(&self) -> &'static str {
        match self {
            SaveState::Clean => "Saved",
            SaveState::Dirty => "Unsaved",
            SaveState::Saving => "Saving…",
            SaveState::DirtyWithError(_) => "Save failed",
        }
    }

    /// Name of the state, used in transition errors
    pub fn name(&self) -> &'static str {
        match self {
            SaveState::Clean => "Clean",
            SaveState::Dirty => "Dirty",
            SaveState::Saving => "Saving",
            SaveState::DirtyWithError(_) => "DirtyWithError",
        }
    }

    /// Checks whether a transition to `target` is valid
    pub fn can_transition_to(&self, target: &SaveState) -> bool {
        use SaveState::*;
        matches!(
            (self, target),
            (Clean, Dirty)
                | (Dirty, Dirty)
                | (Dirty, Saving)
                | (Dirty, DirtyWithError(_))
                | (Saving, Clean)
                | (Saving, Dirty)
                | (Saving, DirtyWithError(_))
                | (DirtyWithError(_), Dirty)
                | (DirtyWithError(_), Saving)
        )
    }

    /// Performs a transition, validating it first
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidState`] if the transition is not allowed
    pub fn transition_to(&mut self, target: SaveState) -> Result<(), DomainError> {
        if !self.can_transition_to(&target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl std::fmt::Display for SaveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveState::DirtyWithError(e) => write!(f, "{}: {}", self.indicator(), e),
            _ => write!(f, "{}", self.indicator()),
        }
    }
}

// ============================================================================
// PendingWrite
// ============================================================================

/// A write about to be sent for one record
///
/// Built when the debounce timer fires (or on an explicit flush) from the
/// record's value at that moment.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite<T> {
    /// Local key of the record
    pub key: LocalKey,
    /// Target identifier; `None` means the write is a create
    pub id: Option<RecordId>,
    /// Full value to write
    pub snapshot: T,
    /// When the write was due
    pub scheduled_for: DateTime<Utc>,
}

impl<T: Entity> PendingWrite<T> {
    /// Returns true if this write creates the record
    pub fn is_create(&self) -> bool {
        self.id.is_none()
    }

    /// Payload sent to the store
    ///
    /// # Errors
    /// Propagates serialization failures from [`Entity::to_fields`]
    pub fn payload(&self, owner: &OwnerId, at: DateTime<Utc>) -> Result<Fields, DomainError> {
        build_payload(&self.snapshot, owner, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::note::Note;

    #[test]
    fn test_happy_path() {
        let mut state = SaveState::Clean;
        state.transition_to(SaveState::Dirty).unwrap();
        state.transition_to(SaveState::Saving).unwrap();
        state.transition_to(SaveState::Clean).unwrap();
        assert_eq!(state.indicator(), "Saved");
    }

    #[test]
    fn test_failure_then_edit() {
        let mut state = SaveState::Saving;
        state
            .transition_to(SaveState::DirtyWithError("timeout".into()))
            .unwrap();
        assert!(state.is_error());
        assert_eq!(state.indicator(), "Save failed");
        assert_eq!(state.to_string(), "Save failed: timeout");

        state.transition_to(SaveState::Dirty).unwrap();
        assert_eq!(state.indicator(), "Unsaved");
    }

    #[test]
    fn test_edit_during_save() {
        let mut state = SaveState::Saving;
        assert_eq!(state.indicator(), "Saving…");
        assert!(state.transition_to(SaveState::Dirty).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut state = SaveState::Clean;
        let err = state.transition_to(SaveState::Saving).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidState {
                from: "Clean".into(),
                to: "Saving".into()
            }
        );
        assert!(!SaveState::Dirty.can_transition_to(&SaveState::Clean));
    }

    #[test]
    fn test_pending_write_is_create_without_id() {
        let write = PendingWrite {
            key: LocalKey::new(),
            id: None,
            snapshot: Note::new("", ""),
            scheduled_for: Utc::now(),
        };
        assert!(write.is_create());

        let owner = OwnerId::new("u1").unwrap();
        let payload = write.payload(&owner, Utc::now()).unwrap();
        assert_eq!(payload["title"], serde_json::json!("Untitled"));
        assert_eq!(payload["user_id"], serde_json::json!("u1"));
    }
}
