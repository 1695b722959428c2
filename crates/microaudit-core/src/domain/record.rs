//! Editable records and the entity contract
//!
//! An [`EditableRecord`] wraps a typed entity value (note, task, workspace,
//! resource, profile) with the bookkeeping the sync model needs: a stable
//! local key, the remote identifier once the store has confirmed a create,
//! the owner, the last-modified timestamp and the local "dirty" flag.
//!
//! ## Row format
//!
//! The remote store exchanges rows as flat JSON objects:
//!
//! ```text
//! { "id": "...", "user_id": "...", "updated_at": "2024-...Z", <entity fields> }
//! ```
//!
//! Entities never see the bookkeeping columns; [`EditableRecord::from_row`]
//! strips them before handing the remaining fields to [`Entity::from_fields`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::{LocalKey, OwnerId, RecordId};

/// A flat field map, as exchanged with the remote store
pub type Fields = serde_json::Map<String, Value>;

/// Primary key column
pub const ID_FIELD: &str = "id";
/// Owner column used for row scoping
pub const OWNER_FIELD: &str = "user_id";
/// Last-modified column, also the default list ordering
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Columns owned by the sync model rather than by an entity
pub const BOOKKEEPING_FIELDS: &[&str] = &[ID_FIELD, OWNER_FIELD, UPDATED_AT_FIELD];

// ============================================================================
// Table
// ============================================================================

/// Remote tables known to the sync model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Notes,
    Tasks,
    Workspaces,
    Resources,
    Profiles,
}

impl Table {
    /// Returns the table name as used by the remote store
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Notes => "notes",
            Table::Tasks => "tasks",
            Table::Workspaces => "workspaces",
            Table::Resources => "resources",
            Table::Profiles => "profiles",
        }
    }

    /// All tables, in a stable order
    pub fn all() -> [Table; 5] {
        [
            Table::Notes,
            Table::Tasks,
            Table::Workspaces,
            Table::Resources,
            Table::Profiles,
        ]
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::all()
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown table: {s}")))
    }
}

// ============================================================================
// Entity trait
// ============================================================================

/// A typed record shape stored in one remote table
///
/// Implementations describe their table, validate themselves, and may
/// normalize values before they are written (e.g. an empty note title is
/// written as "Untitled").
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Table the entity lives in
    const TABLE: Table;

    /// Singular, human-readable entity name used in notifications
    const LABEL: &'static str;

    /// Checks the entity's invariants
    ///
    /// # Errors
    /// Returns [`DomainError::ValidationFailed`] describing the first violation
    fn validate(&self) -> Result<(), DomainError>;

    /// Short name of this particular record (its title, usually)
    fn display_name(&self) -> String;

    /// Returns the value as it should be written to the store
    fn normalized(&self) -> Self {
        self.clone()
    }

    /// Serializes the normalized entity into a field map
    ///
    /// # Errors
    /// Returns an error if the entity does not serialize to a JSON object
    fn to_fields(&self) -> Result<Fields, DomainError> {
        match serde_json::to_value(self.normalized()) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(DomainError::MalformedRecord(format!(
                "{} serialized to non-object: {other}",
                Self::LABEL
            ))),
            Err(e) => Err(DomainError::MalformedRecord(e.to_string())),
        }
    }

    /// Builds a validated entity from a field map
    ///
    /// # Errors
    /// Returns [`DomainError::MalformedRecord`] if the fields do not describe
    /// the entity, or a validation error if the result breaks an invariant
    fn from_fields(fields: &Fields) -> Result<Self, DomainError> {
        let value: Self = serde_json::from_value(Value::Object(fields.clone()))
            .map_err(|e| DomainError::MalformedRecord(format!("{}: {e}", Self::LABEL)))?;
        let value = value.normalized();
        value.validate()?;
        Ok(value)
    }
}

/// Deserializes `null` as the type's default
///
/// Rows written by older clients may carry explicit nulls for optional
/// columns; entities treat them exactly like missing columns.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ============================================================================
// EditableRecord
// ============================================================================

/// A record as held in local state
#[derive(Debug, Clone, PartialEq)]
pub struct EditableRecord<T> {
    key: LocalKey,
    id: Option<RecordId>,
    owner: Option<OwnerId>,
    value: T,
    updated_at: DateTime<Utc>,
    dirty: bool,
    pending_ops: u32,
    confirmed_epoch: u64,
}

impl<T: Entity> EditableRecord<T> {
    /// Creates a record that exists only locally (no identifier yet)
    pub fn new_local(value: T) -> Self {
        Self {
            key: LocalKey::new(),
            id: None,
            owner: None,
            value,
            updated_at: Utc::now(),
            dirty: false,
            pending_ops: 0,
            confirmed_epoch: 0,
        }
    }

    /// Creates a record confirmed by the remote store
    pub fn persisted(id: RecordId, owner: OwnerId, value: T, updated_at: DateTime<Utc>) -> Self {
        Self {
            key: LocalKey::new(),
            id: Some(id),
            owner: Some(owner),
            value,
            updated_at,
            dirty: false,
            pending_ops: 0,
            confirmed_epoch: 0,
        }
    }

    /// Maps a remote row into a record
    ///
    /// `id` and `user_id` are required; a missing or unparsable
    /// `updated_at` falls back to the Unix epoch so such rows sort last.
    ///
    /// # Errors
    /// Returns [`DomainError::MalformedRecord`] if a required column is
    /// missing, or any error raised by [`Entity::from_fields`]
    pub fn from_row(row: &Fields) -> Result<Self, DomainError> {
        let id = row
            .get(ID_FIELD)
            .and_then(value_as_string)
            .ok_or_else(|| DomainError::MalformedRecord(format!("{} row without id", T::LABEL)))
            .and_then(RecordId::new)?;
        let owner = row
            .get(OWNER_FIELD)
            .and_then(value_as_string)
            .ok_or_else(|| {
                DomainError::MalformedRecord(format!("{} row {id} without user_id", T::LABEL))
            })
            .and_then(OwnerId::new)?;
        let updated_at = row
            .get(UPDATED_AT_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let value = T::from_fields(&strip_bookkeeping(row))?;
        Ok(Self::persisted(id, owner, value, updated_at))
    }

    /// Stable local key
    pub fn key(&self) -> LocalKey {
        self.key
    }

    /// Remote identifier, once confirmed
    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    /// Returns true once the store has confirmed a create
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Owner, once known
    pub fn owner(&self) -> Option<&OwnerId> {
        self.owner.as_ref()
    }

    /// Current local value
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Last-modified timestamp
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if there are local changes not yet confirmed persisted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of optimistic operations awaiting a remote answer
    pub fn pending_ops(&self) -> u32 {
        self.pending_ops
    }

    /// Returns true if local state must not be replaced by fetched data
    pub fn has_pending_local_state(&self) -> bool {
        self.dirty || self.pending_ops > 0
    }

    /// Collection epoch of the last write the store confirmed, 0 if none
    pub fn confirmed_epoch(&self) -> u64 {
        self.confirmed_epoch
    }

    /// Returns true if a write was confirmed after `epoch`
    ///
    /// A fetch that started at `epoch` may predate that write.
    pub fn confirmed_since(&self, epoch: u64) -> bool {
        self.confirmed_epoch > epoch
    }

    /// Stamps the record with the epoch at which the store confirmed a write
    pub fn mark_confirmed(&mut self, epoch: u64) {
        self.confirmed_epoch = self.confirmed_epoch.max(epoch);
    }

    /// Applies a user edit and marks the record dirty
    pub fn edit(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
        self.dirty = true;
    }

    /// Replaces the value without touching the dirty flag
    ///
    /// Used for optimistic updates, reverts and reconciliation, none of which
    /// are debounced edits.
    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }

    /// Marks the record as having unsaved local changes
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Records the identifier assigned by the store
    ///
    /// Returns `Ok(true)` on the first assignment and `Ok(false)` when the
    /// same identifier is offered again.
    ///
    /// # Errors
    /// Returns [`DomainError::IdAlreadyAssigned`] if a different identifier
    /// was assigned before
    pub fn assign_id(&mut self, id: RecordId) -> Result<bool, DomainError> {
        match &self.id {
            None => {
                self.id = Some(id);
                Ok(true)
            }
            Some(existing) if *existing == id => Ok(false),
            Some(existing) => Err(DomainError::IdAlreadyAssigned {
                existing: existing.to_string(),
                attempted: id.to_string(),
            }),
        }
    }

    /// Sets the owner
    pub fn set_owner(&mut self, owner: OwnerId) {
        self.owner = Some(owner);
    }

    /// Records a confirmed write of `written`
    ///
    /// The dirty flag is cleared only if the local value still equals what
    /// was written; an edit made while the write was in flight keeps the
    /// record dirty so its own save goes out.
    pub fn mark_saved(&mut self, written: &T, at: DateTime<Utc>) {
        self.updated_at = at;
        if self.value == *written {
            self.dirty = false;
        }
    }

    /// Sets the last-modified timestamp
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    /// Registers an optimistic operation in flight
    pub fn begin_op(&mut self) {
        self.pending_ops += 1;
    }

    /// Registers the completion of an optimistic operation
    pub fn end_op(&mut self) {
        self.pending_ops = self.pending_ops.saturating_sub(1);
    }

    /// Entity fields of the current value (no bookkeeping columns)
    ///
    /// # Errors
    /// Propagates serialization failures from [`Entity::to_fields`]
    pub fn fields(&self) -> Result<Fields, DomainError> {
        self.value.to_fields()
    }

    /// Full write payload: entity fields plus owner and timestamp
    ///
    /// # Errors
    /// Propagates serialization failures from [`Entity::to_fields`]
    pub fn payload(&self, owner: &OwnerId, at: DateTime<Utc>) -> Result<Fields, DomainError> {
        build_payload(&self.value, owner, at)
    }
}

/// Builds a write payload for `value`
///
/// # Errors
/// Propagates serialization failures from [`Entity::to_fields`]
pub fn build_payload<T: Entity>(
    value: &T,
    owner: &OwnerId,
    at: DateTime<Utc>,
) -> Result<Fields, DomainError> {
    let mut fields = value.to_fields()?;
    fields.insert(OWNER_FIELD.into(), Value::String(owner.to_string()));
    fields.insert(UPDATED_AT_FIELD.into(), Value::String(at.to_rfc3339()));
    Ok(fields)
}

/// Returns a copy of `row` without the bookkeeping columns
pub fn strip_bookkeeping(row: &Fields) -> Fields {
    row.iter()
        .filter(|(k, _)| !BOOKKEEPING_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Reads the owner column of a row, if present and valid
pub fn row_owner(row: &Fields) -> Option<OwnerId> {
    row.get(OWNER_FIELD)
        .and_then(value_as_string)
        .and_then(|s| OwnerId::new(s).ok())
}

/// Reads the id column of a row, if present and valid
pub fn row_id(row: &Fields) -> Option<RecordId> {
    row.get(ID_FIELD)
        .and_then(value_as_string)
        .and_then(|s| RecordId::new(s).ok())
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::task::Task;

    fn row(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_table_round_trip_names() {
        for table in Table::all() {
            assert_eq!(table.as_str().parse::<Table>().unwrap(), table);
        }
        assert!("documents".parse::<Table>().is_err());
    }

    #[test]
    fn test_from_row_maps_bookkeeping_columns() {
        let record = EditableRecord::<Task>::from_row(&row(json!({
            "id": "t1",
            "user_id": "u1",
            "updated_at": "2024-05-01T10:00:00Z",
            "title": "Email client",
            "done": true
        })))
        .unwrap();

        assert_eq!(record.id().unwrap().as_str(), "t1");
        assert_eq!(record.owner().unwrap().as_str(), "u1");
        assert_eq!(record.value().title, "Email client");
        assert!(record.value().done);
        assert!(!record.is_dirty());
        assert_eq!(record.updated_at().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_from_row_accepts_numeric_ids() {
        let record = EditableRecord::<Task>::from_row(&row(json!({
            "id": 17,
            "user_id": "u1",
            "title": "Numeric"
        })))
        .unwrap();
        assert_eq!(record.id().unwrap().as_str(), "17");
        assert_eq!(record.updated_at(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_from_row_requires_id_and_owner() {
        let missing_id = EditableRecord::<Task>::from_row(&row(json!({
            "user_id": "u1", "title": "x"
        })));
        assert!(matches!(missing_id, Err(DomainError::MalformedRecord(_))));

        let missing_owner = EditableRecord::<Task>::from_row(&row(json!({
            "id": "t1", "title": "x"
        })));
        assert!(matches!(missing_owner, Err(DomainError::MalformedRecord(_))));
    }

    #[test]
    fn test_assign_id_exactly_once() {
        let mut record = EditableRecord::new_local(Task::new("Groceries"));
        assert!(!record.is_persisted());

        assert!(record.assign_id(RecordId::new("t42").unwrap()).unwrap());
        assert!(!record.assign_id(RecordId::new("t42").unwrap()).unwrap());
        assert!(matches!(
            record.assign_id(RecordId::new("t43").unwrap()),
            Err(DomainError::IdAlreadyAssigned { .. })
        ));
        assert_eq!(record.id().unwrap().as_str(), "t42");
    }

    #[test]
    fn test_mark_saved_keeps_dirty_after_concurrent_edit() {
        let mut record = EditableRecord::new_local(Task::new("Draft"));
        record.edit(|t| t.title = "Draft 2".into());
        let written = record.value().clone();

        record.edit(|t| t.title = "Draft 3".into());
        record.mark_saved(&written, Utc::now());
        assert!(record.is_dirty());

        let written = record.value().clone();
        record.mark_saved(&written, Utc::now());
        assert!(!record.is_dirty());
    }

    #[test]
    fn test_pending_local_state() {
        let mut record = EditableRecord::new_local(Task::new("x"));
        assert!(!record.has_pending_local_state());
        record.begin_op();
        assert!(record.has_pending_local_state());
        record.end_op();
        record.end_op();
        assert_eq!(record.pending_ops(), 0);
        record.mark_dirty();
        assert!(record.has_pending_local_state());
    }

    #[test]
    fn test_confirmed_epoch_only_moves_forward() {
        let mut record = EditableRecord::new_local(Task::new("x"));
        assert_eq!(record.confirmed_epoch(), 0);
        assert!(!record.confirmed_since(0));

        record.mark_confirmed(4);
        record.mark_confirmed(2);
        assert_eq!(record.confirmed_epoch(), 4);
        assert!(record.confirmed_since(3));
        assert!(!record.confirmed_since(4));
    }

    #[test]
    fn test_payload_carries_owner_and_timestamp() {
        let record = EditableRecord::new_local(Task::new("Ship"));
        let owner = OwnerId::new("u9").unwrap();
        let at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);

        let payload = record.payload(&owner, at).unwrap();
        assert_eq!(payload["user_id"], json!("u9"));
        assert_eq!(payload["updated_at"], json!("2024-01-02T03:04:05+00:00"));
        assert_eq!(payload["title"], json!("Ship"));
        assert!(!payload.contains_key("id"));
    }

    #[test]
    fn test_strip_bookkeeping() {
        let stripped = strip_bookkeeping(&row(json!({
            "id": "1", "user_id": "u", "updated_at": "x", "title": "kept"
        })));
        assert_eq!(stripped.len(), 1);
        assert!(stripped.contains_key("title"));
    }
}
