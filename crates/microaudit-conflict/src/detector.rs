//! Field-level conflict detection
//!
//! Compares the entity fields of a local record with the row fetched for the
//! same identifier. Bookkeeping columns (`id`, `user_id`, `updated_at`) are
//! never part of an entity's field map, so they never conflict.

use serde_json::Value;
use tracing::trace;

use microaudit_core::domain::{EditableRecord, Entity, Table};

use crate::error::ConflictError;

/// One field whose local and fetched values differ
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConflict {
    pub table: Table,
    pub field: String,
    pub local: Value,
    pub remote: Value,
}

impl FieldConflict {
    /// `"{table}.{field}"`, the key policy rules match against
    pub fn path(&self) -> String {
        format!("{}.{}", self.table, self.field)
    }
}

/// Detects differing fields between local and fetched records
pub struct ConflictDetector;

impl ConflictDetector {
    /// Returns every entity field whose values differ
    ///
    /// A field missing on one side is compared as `null`.
    pub fn detect<T: Entity>(
        local: &EditableRecord<T>,
        remote: &EditableRecord<T>,
    ) -> Result<Vec<FieldConflict>, ConflictError> {
        let local_fields = local.fields()?;
        let remote_fields = remote.fields()?;

        let mut conflicts = Vec::new();
        let keys = local_fields
            .keys()
            .chain(remote_fields.keys().filter(|k| !local_fields.contains_key(*k)));
        for key in keys {
            let l = local_fields.get(key).cloned().unwrap_or(Value::Null);
            let r = remote_fields.get(key).cloned().unwrap_or(Value::Null);
            if l != r {
                conflicts.push(FieldConflict {
                    table: T::TABLE,
                    field: key.clone(),
                    local: l,
                    remote: r,
                });
            }
        }

        trace!(
            table = %T::TABLE,
            key = %local.key(),
            conflicts = conflicts.len(),
            "Compared local and fetched record"
        );
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use microaudit_core::domain::{Note, OwnerId, RecordId};

    fn persisted(note: Note) -> EditableRecord<Note> {
        EditableRecord::persisted(
            RecordId::new("n1").unwrap(),
            OwnerId::new("u1").unwrap(),
            note,
            Utc::now(),
        )
    }

    #[test]
    fn test_identical_records_have_no_conflicts() {
        let a = persisted(Note::new("Plan", "body"));
        let b = persisted(Note::new("Plan", "body"));
        assert!(ConflictDetector::detect(&a, &b).unwrap().is_empty());
    }

    #[test]
    fn test_reports_each_differing_field() {
        let local = persisted(Note::new("Plan v2", "body"));
        let remote = persisted(Note::new("Plan", "body").pinned());

        let conflicts = ConflictDetector::detect(&local, &remote).unwrap();
        let mut paths: Vec<_> = conflicts.iter().map(FieldConflict::path).collect();
        paths.sort();
        assert_eq!(paths, vec!["notes.pinned", "notes.title"]);

        let title = conflicts.iter().find(|c| c.field == "title").unwrap();
        assert_eq!(title.local, json!("Plan v2"));
        assert_eq!(title.remote, json!("Plan"));
    }

    #[test]
    fn test_timestamps_do_not_conflict() {
        let a = persisted(Note::new("Same", ""));
        let mut b = persisted(Note::new("Same", ""));
        b.touch(Utc::now() + chrono::Duration::hours(1));
        assert!(ConflictDetector::detect(&a, &b).unwrap().is_empty());
    }
}
