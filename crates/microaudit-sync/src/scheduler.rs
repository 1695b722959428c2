//! Save scheduler - debounces continuous edits into single remote writes
//!
//! Each record has a slot holding its debounce timer, its save state and an
//! in-flight guard. An edit restarts the record's timer; when the timer
//! expires, the record's current value is written (create when it has no
//! identifier yet, update otherwise).
//!
//! ## Flow
//!
//! ```text
//! edit ──→ local value updated ──→ timer (re)started
//!                                        │ quiet for `debounce`
//!                                        ▼
//!                          write in flight? ──yes──→ follow-up requested
//!                                        │ no
//!                                        ▼
//!                         create / update ──→ Clean | DirtyWithError
//!                                        │
//!                             follow-up requested? ──→ timer restarted
//! ```
//!
//! Timers are tokio tasks cancelled through child tokens of the scheduler's
//! root [`CancellationToken`]; [`SaveScheduler::close`] cancels them all.
//! Writes already in flight are never cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use microaudit_core::domain::record::row_id;
use microaudit_core::domain::{Entity, LocalKey, PendingWrite, RecordId, SaveState};
use microaudit_core::ports::Notification;

use crate::collection::LocalCollection;
use crate::context::{SyncPorts, SyncSettings};
use crate::SyncError;

/// Result of one write attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The store confirmed the write
    Saved { id: RecordId, created: bool },
    /// Nothing to write, or nobody signed in
    Skipped,
    /// The write failed; local edits are kept
    Failed(String),
    /// The record disappeared from the local list
    Missing,
    /// A write was already in flight; a follow-up was requested
    Deferred,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    timer: Option<CancellationToken>,
    write_lock: Arc<Mutex<()>>,
    follow_up: bool,
    state: SaveState,
}

struct Inner<T> {
    collection: LocalCollection<T>,
    ports: SyncPorts,
    debounce: Duration,
    notify_on_save: bool,
    slots: DashMap<LocalKey, Slot>,
    shutdown: CancellationToken,
}

/// Debounced autosave for one entity type
pub struct SaveScheduler<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SaveScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity> SaveScheduler<T> {
    /// Creates a scheduler writing records of `collection`
    pub fn new(collection: LocalCollection<T>, ports: SyncPorts, settings: &SyncSettings) -> Self {
        debug!(
            table = %T::TABLE,
            debounce_ms = settings.debounce.as_millis() as u64,
            "Creating save scheduler"
        );
        Self {
            inner: Arc::new(Inner {
                collection,
                ports,
                debounce: settings.debounce,
                notify_on_save: settings.notify_on_save,
                slots: DashMap::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Debounce window
    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Inserts a record that exists only locally and returns its key
    ///
    /// Nothing is written until the record is edited (or flushed after an
    /// edit).
    pub async fn open_new(&self, value: T) -> LocalKey {
        let record = microaudit_core::domain::EditableRecord::new_local(value);
        let key = record.key();
        self.inner.collection.insert_front(record).await;
        debug!(table = %T::TABLE, key = %key, "Opened new local record");
        key
    }

    /// Applies `f` to the local value, then schedules a save
    ///
    /// # Errors
    /// Returns [`SyncError::RecordNotFound`] if the record is gone
    pub async fn edit(&self, key: LocalKey, f: impl FnOnce(&mut T)) -> Result<(), SyncError> {
        self.inner
            .collection
            .update(key, |record| record.edit(f))
            .await
            .ok_or(SyncError::RecordNotFound(key))?;
        self.mark_dirty(key);
        self.restart_timer(key);
        Ok(())
    }

    /// Marks the record dirty and (re)starts its debounce timer
    ///
    /// # Errors
    /// Returns [`SyncError::RecordNotFound`] if the record is gone
    pub async fn schedule_save(&self, key: LocalKey) -> Result<(), SyncError> {
        self.inner
            .collection
            .update(key, |record| record.mark_dirty())
            .await
            .ok_or(SyncError::RecordNotFound(key))?;
        self.mark_dirty(key);
        self.restart_timer(key);
        Ok(())
    }

    /// Writes the record now, bypassing the debounce window
    ///
    /// Waits for a write already in flight to finish first, so two writes
    /// for one record never overlap.
    pub async fn flush(&self, key: LocalKey) -> SaveOutcome {
        let lock = {
            let mut slot = self.inner.slots.entry(key).or_default();
            if let Some(timer) = slot.timer.take() {
                timer.cancel();
            }
            slot.generation += 1;
            Arc::clone(&slot.write_lock)
        };
        let guard = lock.lock_owned().await;
        self.run_write(key, guard).await
    }

    /// Writes every dirty record now
    pub async fn flush_all(&self) -> Vec<(LocalKey, SaveOutcome)> {
        let dirty: Vec<LocalKey> = self
            .inner
            .collection
            .snapshot()
            .await
            .into_iter()
            .filter(|r| r.is_dirty())
            .map(|r| r.key())
            .collect();

        let mut outcomes = Vec::with_capacity(dirty.len());
        for key in dirty {
            outcomes.push((key, self.flush(key).await));
        }
        outcomes
    }

    /// Cancels the record's pending timer and any requested follow-up
    ///
    /// A write already in flight is not interrupted.
    pub fn cancel(&self, key: LocalKey) {
        if let Some(mut slot) = self.inner.slots.get_mut(&key) {
            if let Some(timer) = slot.timer.take() {
                timer.cancel();
                debug!(table = %T::TABLE, key = %key, "Cancelled pending save");
            }
            slot.generation += 1;
            slot.follow_up = false;
        }
    }

    /// Drops all scheduling state of a record that no longer exists
    pub fn forget(&self, key: LocalKey) {
        self.cancel(key);
        self.inner.slots.remove(&key);
    }

    /// Save state of a record; `Clean` for records never edited
    pub fn state(&self, key: LocalKey) -> SaveState {
        self.inner
            .slots
            .get(&key)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    /// Returns true if the record has a timer running
    pub fn is_scheduled(&self, key: LocalKey) -> bool {
        self.inner
            .slots
            .get(&key)
            .and_then(|slot| slot.timer.as_ref().map(|t| !t.is_cancelled()))
            .unwrap_or(false)
    }

    /// Cancels every pending timer; later edits are no longer scheduled
    pub fn close(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!(table = %T::TABLE, "Closing save scheduler");
            self.inner.shutdown.cancel();
        }
    }

    /// Returns true once [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    // ========================================================================
    // Timers
    // ========================================================================

    fn restart_timer(&self, key: LocalKey) {
        if self.inner.shutdown.is_cancelled() {
            trace!(table = %T::TABLE, key = %key, "Scheduler closed, not scheduling save");
            return;
        }

        let token = self.inner.shutdown.child_token();
        let generation = {
            let mut slot = self.inner.slots.entry(key).or_default();
            if let Some(previous) = slot.timer.replace(token.clone()) {
                previous.cancel();
            }
            slot.generation += 1;
            slot.generation
        };
        trace!(table = %T::TABLE, key = %key, generation, "Save timer started");

        let scheduler = self.clone();
        let delay = self.inner.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    scheduler.on_timer(key, generation).await;
                }
            }
        });
    }

    async fn on_timer(&self, key: LocalKey, generation: u64) -> SaveOutcome {
        let lock = {
            let Some(mut slot) = self.inner.slots.get_mut(&key) else {
                return SaveOutcome::Missing;
            };
            if slot.generation != generation {
                return SaveOutcome::Skipped;
            }
            slot.timer = None;
            Arc::clone(&slot.write_lock)
        };

        let guard = match lock.try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(mut slot) = self.inner.slots.get_mut(&key) {
                    slot.follow_up = true;
                }
                debug!(table = %T::TABLE, key = %key, "Write in flight, follow-up requested");
                return SaveOutcome::Deferred;
            }
        };
        self.run_write(key, guard).await
    }

    /// Performs the write, then releases the guard and runs a requested
    /// follow-up as a fresh debounce cycle
    async fn run_write(&self, key: LocalKey, guard: OwnedMutexGuard<()>) -> SaveOutcome {
        let outcome = self.write(key).await;
        drop(guard);

        let follow_up = self
            .inner
            .slots
            .get_mut(&key)
            .map(|mut slot| std::mem::take(&mut slot.follow_up))
            .unwrap_or(false);
        if follow_up {
            debug!(table = %T::TABLE, key = %key, "Running follow-up save");
            self.restart_timer(key);
        }
        outcome
    }

    // ========================================================================
    // Writing
    // ========================================================================

    async fn write(&self, key: LocalKey) -> SaveOutcome {
        let Some(record) = self.inner.collection.get(key).await else {
            self.inner.slots.remove(&key);
            return SaveOutcome::Missing;
        };
        if !record.is_dirty() {
            trace!(table = %T::TABLE, key = %key, "Record clean, nothing to save");
            return SaveOutcome::Skipped;
        }
        let name = record.value().display_name();

        if let Err(e) = record.value().normalized().validate() {
            warn!(table = %T::TABLE, key = %key, error = %e, "Not saving invalid record");
            self.set_state(key, SaveState::DirtyWithError(e.to_string()));
            self.inner
                .ports
                .notify(Notification::validation(T::LABEL, e.to_string()))
                .await;
            return SaveOutcome::Failed(e.to_string());
        }

        let user = match self.inner.ports.identity.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(table = %T::TABLE, key = %key, "No user signed in, save skipped");
                return SaveOutcome::Skipped;
            }
            Err(e) => return self.fail(key, &name, format!("{e:#}")).await,
        };

        let now = Utc::now();
        let pending = PendingWrite {
            key,
            id: record.id().cloned(),
            snapshot: record.value().clone(),
            scheduled_for: now,
        };
        let payload = match pending.payload(&user.id, now) {
            Ok(payload) => payload,
            Err(e) => return self.fail(key, &name, e.to_string()).await,
        };
        self.set_state(key, SaveState::Saving);

        let store = &self.inner.ports.store;
        let result = match &pending.id {
            Some(id) => store.update(T::TABLE, id, payload).await.map(|_| id.clone()),
            None => match store.create(T::TABLE, payload).await {
                Ok(row) => row_id(&row).ok_or_else(|| {
                    anyhow::anyhow!("{} created without an identifier", T::LABEL)
                }),
                Err(e) => Err(e),
            },
        };

        let id = match result {
            Ok(id) => id,
            Err(e) => return self.fail(key, &name, format!("{e:#}")).await,
        };

        if pending.is_create() {
            match self.inner.collection.assign_id(key, id.clone()).await {
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(table = %T::TABLE, key = %key, error = %e, "Identifier already assigned");
                }
                None => return self.discard_orphan(key, &id).await,
            }
        }

        let epoch = self.inner.collection.next_epoch();
        let still_dirty = self
            .inner
            .collection
            .update(key, |r| {
                r.set_owner(user.id.clone());
                r.mark_saved(&pending.snapshot, now);
                r.mark_confirmed(epoch);
                r.is_dirty()
            })
            .await;
        let Some(still_dirty) = still_dirty else {
            self.inner.slots.remove(&key);
            return SaveOutcome::Missing;
        };

        if let Some(mut slot) = self.inner.slots.get_mut(&key) {
            if slot.state.is_saving() {
                let target = if still_dirty {
                    SaveState::Dirty
                } else {
                    SaveState::Clean
                };
                if let Err(e) = slot.state.transition_to(target) {
                    trace!(table = %T::TABLE, key = %key, error = %e, "Save state unchanged");
                }
            }
        }

        info!(
            table = %T::TABLE,
            key = %key,
            record_id = %id,
            created = pending.is_create(),
            "Saved record"
        );
        if self.inner.notify_on_save {
            self.inner
                .ports
                .notify(Notification::sync(format!("{} saved", capitalize(T::LABEL)), name))
                .await;
        }
        SaveOutcome::Saved {
            id,
            created: pending.is_create(),
        }
    }

    /// A create finished after the record was deleted locally: remove the
    /// row so the delete sticks
    async fn discard_orphan(&self, key: LocalKey, id: &RecordId) -> SaveOutcome {
        self.inner.slots.remove(&key);
        debug!(table = %T::TABLE, record_id = %id, "Record deleted during create, removing row");
        if let Err(e) = self.inner.ports.store.delete(T::TABLE, id).await {
            warn!(table = %T::TABLE, record_id = %id, error = %e, "Failed to remove orphaned row");
        }
        SaveOutcome::Missing
    }

    async fn fail(&self, key: LocalKey, name: &str, error: String) -> SaveOutcome {
        warn!(table = %T::TABLE, key = %key, error = %error, "Save failed, keeping local edits");
        self.set_state(key, SaveState::DirtyWithError(error.clone()));
        self.inner
            .ports
            .notify(Notification::failure("save", T::LABEL, name, &error))
            .await;
        SaveOutcome::Failed(error)
    }

    fn mark_dirty(&self, key: LocalKey) {
        let mut slot = self.inner.slots.entry(key).or_default();
        if let Err(e) = slot.state.transition_to(SaveState::Dirty) {
            trace!(table = %T::TABLE, key = %key, error = %e, "Save state unchanged");
        }
    }

    fn set_state(&self, key: LocalKey, target: SaveState) {
        let Some(mut slot) = self.inner.slots.get_mut(&key) else {
            return;
        };
        if !slot.state.is_dirty() {
            // Record was dirtied outside the scheduler (e.g. loaded dirty).
            slot.state = SaveState::Dirty;
        }
        if let Err(e) = slot.state.transition_to(target) {
            trace!(table = %T::TABLE, key = %key, error = %e, "Save state unchanged");
        }
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::notifier::CollectingNotifier;
    use microaudit_core::domain::{EditableRecord, Note, OwnerId, Table, Task};
    use microaudit_remote::{InMemoryIdentity, InMemoryRemoteStore, StoreOp};

    const DEBOUNCE: Duration = Duration::from_millis(1000);

    struct Harness<T> {
        store: Arc<InMemoryRemoteStore>,
        identity: Arc<InMemoryIdentity>,
        notifier: Arc<CollectingNotifier>,
        collection: LocalCollection<T>,
        scheduler: SaveScheduler<T>,
    }

    fn harness<T: Entity>(store: InMemoryRemoteStore) -> Harness<T> {
        let store = Arc::new(store);
        let identity = Arc::new(InMemoryIdentity::signed_in(OwnerId::new("u1").unwrap()));
        let notifier = Arc::new(CollectingNotifier::new());
        let ports = SyncPorts::new(store.clone(), identity.clone(), notifier.clone());
        let collection = LocalCollection::new();
        let settings = SyncSettings::default().with_debounce(DEBOUNCE);
        let scheduler = SaveScheduler::new(collection.clone(), ports, &settings);
        Harness {
            store,
            identity,
            notifier,
            collection,
            scheduler,
        }
    }

    async fn persisted_task(h: &Harness<Task>, id: &str, title: &str) -> LocalKey {
        let record = EditableRecord::persisted(
            RecordId::new(id).unwrap(),
            OwnerId::new("u1").unwrap(),
            Task::new(title),
            Utc::now(),
        );
        let key = record.key();
        h.store.seed(
            Table::Tasks,
            json!({"id": id, "user_id": "u1", "title": title, "done": false})
                .as_object()
                .cloned()
                .unwrap(),
        );
        h.collection.insert_front(record).await;
        key
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_within_window_coalesce_into_one_write() {
        let h = harness::<Task>(InMemoryRemoteStore::new());
        let key = persisted_task(&h, "t1", "Draft").await;

        for title in ["Draft 1", "Draft 12", "Draft 123"] {
            h.scheduler
                .edit(key, |t| t.title = title.to_string())
                .await
                .unwrap();
            settle(Duration::from_millis(300)).await;
        }
        assert!(h.store.calls_of(StoreOp::Update).is_empty());
        assert_eq!(h.scheduler.state(key), SaveState::Dirty);

        settle(DEBOUNCE).await;
        let updates = h.store.calls_of(StoreOp::Update);
        assert_eq!(updates.len(), 1);
        let fields = updates[0].fields.as_ref().unwrap();
        assert_eq!(fields["title"], json!("Draft 123"));
        assert_eq!(fields["user_id"], json!("u1"));
        assert!(fields.contains_key("updated_at"));
        assert_eq!(h.scheduler.state(key), SaveState::Clean);
        assert!(!h.collection.get(key).await.unwrap().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_record_is_created_once_then_updated() {
        let store = InMemoryRemoteStore::new();
        store.script_ids(["n42"]);
        let h = harness::<Note>(store);

        let key = h.scheduler.open_new(Note::new("", "")).await;
        h.scheduler
            .edit(key, |n| n.content = "first line".into())
            .await
            .unwrap();
        settle(DEBOUNCE + Duration::from_millis(10)).await;

        let record = h.collection.get(key).await.unwrap();
        assert_eq!(record.id().unwrap().as_str(), "n42");
        let creates = h.store.calls_of(StoreOp::Create);
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].fields.as_ref().unwrap()["title"], json!("Untitled"));

        h.scheduler
            .edit(key, |n| n.content = "second line".into())
            .await
            .unwrap();
        settle(DEBOUNCE + Duration::from_millis(10)).await;

        assert_eq!(h.store.calls_of(StoreOp::Create).len(), 1);
        let updates = h.store.calls_of(StoreOp::Update);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].id.as_ref().unwrap().as_str(), "n42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_opened_but_unedited_record_is_not_written() {
        let h = harness::<Note>(InMemoryRemoteStore::new());
        let key = h.scheduler.open_new(Note::default()).await;
        assert_eq!(h.scheduler.flush(key).await, SaveOutcome::Skipped);
        assert!(h.store.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_edits_and_notifies() {
        let h = harness::<Task>(InMemoryRemoteStore::new());
        let key = persisted_task(&h, "t1", "Email").await;
        h.store.fail_next(StoreOp::Update, "timeout");

        h.scheduler
            .edit(key, |t| t.title = "Email the client".into())
            .await
            .unwrap();
        settle(DEBOUNCE + Duration::from_millis(10)).await;

        let record = h.collection.get(key).await.unwrap();
        assert_eq!(record.value().title, "Email the client");
        assert!(record.is_dirty());
        assert!(h.scheduler.state(key).is_error());
        assert_eq!(h.scheduler.state(key).indicator(), "Save failed");

        let notes = h.notifier.all();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Could not save task");

        // The next edit reschedules and succeeds.
        h.scheduler
            .edit(key, |t| t.title = "Email the client today".into())
            .await
            .unwrap();
        assert_eq!(h.scheduler.state(key), SaveState::Dirty);
        settle(DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(h.scheduler.state(key), SaveState::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_out_save_is_skipped_silently() {
        let h = harness::<Task>(InMemoryRemoteStore::new());
        let key = persisted_task(&h, "t1", "Email").await;
        h.identity.sign_out();

        h.scheduler.edit(key, |t| t.done = true).await.unwrap();
        settle(DEBOUNCE + Duration::from_millis(10)).await;

        assert!(h.store.calls().is_empty());
        assert!(h.notifier.is_empty());
        assert!(h.collection.get(key).await.unwrap().is_dirty());
        assert_eq!(h.scheduler.state(key), SaveState::Dirty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_write_gets_its_own_follow_up() {
        let h = harness::<Task>(InMemoryRemoteStore::new().with_latency(Duration::from_millis(1500)));
        let key = persisted_task(&h, "t1", "A").await;

        h.scheduler.edit(key, |t| t.title = "AB".into()).await.unwrap();
        settle(DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(h.scheduler.state(key), SaveState::Saving);

        // Timer for this edit expires while the first write is in flight.
        h.scheduler.edit(key, |t| t.title = "ABC".into()).await.unwrap();
        settle(DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(h.store.calls_of(StoreOp::Update).len(), 1);

        // First write completes, follow-up cycle runs and completes.
        settle(Duration::from_millis(600)).await;
        assert_eq!(h.scheduler.state(key), SaveState::Dirty);
        settle(DEBOUNCE + Duration::from_millis(1600)).await;

        let updates = h.store.calls_of(StoreOp::Update);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].fields.as_ref().unwrap()["title"], json!("ABC"));
        assert_eq!(h.scheduler.state(key), SaveState::Clean);
        assert_eq!(h.collection.get(key).await.unwrap().value().title, "ABC");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_bypasses_debounce() {
        let h = harness::<Task>(InMemoryRemoteStore::new());
        let key = persisted_task(&h, "t1", "A").await;
        h.scheduler.edit(key, |t| t.done = true).await.unwrap();

        let outcome = h.scheduler.flush(key).await;
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                id: RecordId::new("t1").unwrap(),
                created: false
            }
        );
        assert!(!h.scheduler.is_scheduled(key));

        settle(DEBOUNCE * 2).await;
        assert_eq!(h.store.calls_of(StoreOp::Update).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_timers() {
        let h = harness::<Task>(InMemoryRemoteStore::new());
        let key = persisted_task(&h, "t1", "A").await;
        h.scheduler.edit(key, |t| t.done = true).await.unwrap();
        assert!(h.scheduler.is_scheduled(key));

        h.scheduler.close();
        settle(DEBOUNCE * 2).await;
        assert!(h.store.calls().is_empty());
        assert!(h.scheduler.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_value_is_not_sent() {
        let h = harness::<Task>(InMemoryRemoteStore::new());
        let key = persisted_task(&h, "t1", "A").await;
        h.scheduler.edit(key, |t| t.title = "   ".into()).await.unwrap();
        settle(DEBOUNCE + Duration::from_millis(10)).await;

        assert!(h.store.calls().is_empty());
        assert!(h.scheduler.state(key).is_error());
        assert_eq!(h.notifier.all()[0].title, "Invalid task");
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_deleted_during_create_removes_row() {
        let store = InMemoryRemoteStore::new().with_latency(Duration::from_millis(500));
        store.script_ids(["n1"]);
        let h = harness::<Note>(store);

        let key = h.scheduler.open_new(Note::default()).await;
        h.scheduler.edit(key, |n| n.title = "Temp".into()).await.unwrap();
        settle(DEBOUNCE + Duration::from_millis(10)).await;
        h.collection.remove(key).await;
        settle(Duration::from_millis(1200)).await;

        assert_eq!(h.store.calls_of(StoreOp::Delete).len(), 1);
        assert!(h.store.rows(Table::Notes).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_notification_when_enabled() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let ports = SyncPorts::new(
            store.clone(),
            Arc::new(InMemoryIdentity::signed_in(OwnerId::new("u1").unwrap())),
            notifier.clone(),
        );
        let collection = LocalCollection::new();
        let settings = SyncSettings {
            notify_on_save: true,
            ..SyncSettings::default()
        };
        let scheduler = SaveScheduler::<Note>::new(collection, ports, &settings);

        let key = scheduler.open_new(Note::default()).await;
        scheduler.edit(key, |n| n.title = "Plan".into()).await.unwrap();
        scheduler.flush(key).await;

        let all = notifier.all();
        assert_eq!(all[0].title, "Note saved");
        assert_eq!(all[0].body, "Plan");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("note"), "Note");
        assert_eq!(capitalize(""), "");
    }
}
