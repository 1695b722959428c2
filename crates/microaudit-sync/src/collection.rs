//! Shared local list of editable records
//!
//! [`LocalCollection`] is the single owner of the in-memory list for one
//! entity type. Every component (scheduler, optimistic executor, realtime
//! listener) goes through it, and every mutation runs inside one short
//! critical section. The lock is never held across a remote call: callers
//! read what they need, release, await the store, then re-enter by key.
//!
//! Views observe changes through [`LocalCollection::subscribe`], a version
//! counter bumped after each mutation.
//!
//! A separate confirmation epoch orders store confirmations against reloads:
//! a reload notes [`LocalCollection::epoch`] before it fetches, and every
//! confirmed write stamps its record with [`LocalCollection::next_epoch`].
//! A record stamped after the fetch started is newer than the fetched row.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{debug, trace};

use microaudit_core::domain::{EditableRecord, Entity, LocalKey, RecordId};

/// In-memory records for one entity type
pub struct LocalCollection<T> {
    records: Arc<RwLock<Vec<EditableRecord<T>>>>,
    version: Arc<watch::Sender<u64>>,
    epoch: Arc<AtomicU64>,
}

impl<T> Clone for LocalCollection<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            version: Arc::clone(&self.version),
            epoch: Arc::clone(&self.epoch),
        }
    }
}

impl<T: Entity> Default for LocalCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> LocalCollection<T> {
    /// Creates an empty collection
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            version: Arc::new(tx),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a collection holding `records`
    pub fn with_records(records: Vec<EditableRecord<T>>) -> Self {
        let collection = Self::new();
        if let Ok(mut guard) = collection.records.try_write() {
            *guard = records;
        }
        collection
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Copy of the current list, in display order
    pub async fn snapshot(&self) -> Vec<EditableRecord<T>> {
        self.records.read().await.clone()
    }

    /// Copy of one record
    pub async fn get(&self, key: LocalKey) -> Option<EditableRecord<T>> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.key() == key)
            .cloned()
    }

    /// Copy of the record carrying a remote identifier
    pub async fn find_by_id(&self, id: &RecordId) -> Option<EditableRecord<T>> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id() == Some(id))
            .cloned()
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if the collection holds no record
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Current version; bumped after every mutation
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Receiver notified after every mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Current confirmation epoch
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Advances the confirmation epoch and returns the new value
    pub fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Inserts a record at the top of the list
    pub async fn insert_front(&self, record: EditableRecord<T>) {
        self.insert_at(0, record).await;
    }

    /// Inserts a record at `index`, clamped to the list length
    pub async fn insert_at(&self, index: usize, record: EditableRecord<T>) {
        {
            let mut records = self.records.write().await;
            if let Some(id) = record.id() {
                records.retain(|r| r.id() != Some(id));
            }
            let index = index.min(records.len());
            trace!(table = %T::TABLE, key = %record.key(), index, "Inserting record");
            records.insert(index, record);
        }
        self.bump();
    }

    /// Runs `f` on the record with `key`, inside the critical section
    ///
    /// Returns `None` if the record is gone.
    pub async fn update<R>(
        &self,
        key: LocalKey,
        f: impl FnOnce(&mut EditableRecord<T>) -> R,
    ) -> Option<R> {
        let result = {
            let mut records = self.records.write().await;
            records.iter_mut().find(|r| r.key() == key).map(f)
        };
        if result.is_some() {
            self.bump();
        }
        result
    }

    /// Removes a record, returning its former position and value
    pub async fn remove(&self, key: LocalKey) -> Option<(usize, EditableRecord<T>)> {
        let removed = {
            let mut records = self.records.write().await;
            records
                .iter()
                .position(|r| r.key() == key)
                .map(|index| (index, records.remove(index)))
        };
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Records the identifier assigned by the store for `key`
    ///
    /// Any other record already carrying the same identifier (typically
    /// added by a reload that raced the create) is dropped so the id stays
    /// unique. Returns `None` if the record is gone.
    ///
    /// # Errors
    /// Returns the domain error if a different identifier was assigned before
    pub async fn assign_id(
        &self,
        key: LocalKey,
        id: RecordId,
    ) -> Option<Result<bool, microaudit_core::domain::DomainError>> {
        let result = {
            let mut records = self.records.write().await;
            let position = records.iter().position(|r| r.key() == key)?;
            let result = records[position].assign_id(id.clone());
            if matches!(result, Ok(true)) {
                let before = records.len();
                records.retain(|r| r.key() == key || r.id() != Some(&id));
                if records.len() != before {
                    debug!(
                        table = %T::TABLE,
                        record_id = %id,
                        "Dropped duplicate of freshly created record"
                    );
                }
            }
            Some(result)
        };
        self.bump();
        result
    }

    /// Replaces the whole list through `f`, inside one critical section
    pub async fn replace_with<R>(
        &self,
        f: impl FnOnce(Vec<EditableRecord<T>>) -> (Vec<EditableRecord<T>>, R),
    ) -> R {
        let result = {
            let mut records = self.records.write().await;
            let current = std::mem::take(&mut *records);
            let (next, result) = f(current);
            *records = next;
            result
        };
        self.bump();
        result
    }

    /// Removes every record
    pub async fn clear(&self) {
        self.records.write().await.clear();
        self.bump();
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}
