//! Change feed port (driven/secondary port)
//!
//! This module defines the interface for receiving insert/update/delete
//! notifications for a table. The realtime listener subscribes once per
//! controller and reloads the list whenever a relevant event arrives.
//!
//! ## Design Notes
//!
//! - A subscription is a bounded channel receiver; dropping it closes the
//!   channel, which the adapter treats as an unsubscribe.
//! - Events carry the raw rows. Owner scoping is advisory on the adapter side
//!   and is re-checked by the listener with [`ChangeEvent::belongs_to`].

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::newtypes::OwnerId;
use crate::domain::record::{row_owner, Fields, Table};

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// One row change in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table the row belongs to
    pub table: Table,
    /// What happened
    pub operation: ChangeOperation,
    /// Row before the change (updates and deletes)
    pub old_record: Option<Fields>,
    /// Row after the change (inserts and updates)
    pub new_record: Option<Fields>,
}

impl ChangeEvent {
    /// Creates an insert event
    pub fn insert(table: Table, row: Fields) -> Self {
        Self {
            table,
            operation: ChangeOperation::Insert,
            old_record: None,
            new_record: Some(row),
        }
    }

    /// Creates an update event
    pub fn update(table: Table, old: Option<Fields>, new: Fields) -> Self {
        Self {
            table,
            operation: ChangeOperation::Update,
            old_record: old,
            new_record: Some(new),
        }
    }

    /// Creates a delete event
    pub fn delete(table: Table, old: Fields) -> Self {
        Self {
            table,
            operation: ChangeOperation::Delete,
            old_record: Some(old),
            new_record: None,
        }
    }

    /// Owner of the changed row, taken from the new row first
    pub fn owner(&self) -> Option<OwnerId> {
        self.new_record
            .as_ref()
            .and_then(row_owner)
            .or_else(|| self.old_record.as_ref().and_then(row_owner))
    }

    /// Returns true if the change concerns a row owned by `owner`
    pub fn belongs_to(&self, owner: &OwnerId) -> bool {
        self.owner().as_ref() == Some(owner)
    }
}

/// A live subscription to one table's changes
#[derive(Debug)]
pub struct ChangeSubscription {
    table: Table,
    receiver: mpsc::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    /// Wraps the receiving half of an adapter's event channel
    pub fn new(table: Table, receiver: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { table, receiver }
    }

    /// Table this subscription observes
    pub fn table(&self) -> Table {
        self.table
    }

    /// Waits for the next event; `None` once the feed is closed
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }
}

/// Port trait for realtime change notifications
#[async_trait::async_trait]
pub trait IChangeFeed: Send + Sync {
    /// Subscribes to changes in `table`, optionally scoped to `owner`
    async fn subscribe(
        &self,
        table: Table,
        owner: Option<&OwnerId>,
    ) -> anyhow::Result<ChangeSubscription>;
}
