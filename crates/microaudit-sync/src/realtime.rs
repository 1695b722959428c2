//! Realtime reconciliation listener
//!
//! Keeps the local list in step with the remote table:
//!
//! - every change event owned by the current user triggers a full reload
//! - every session change triggers a reload (signed out clears the list)
//!   and a new subscription scoped to the new owner
//!
//! Fetched rows are merged by the [`Reconciler`], so records with pending
//! local state keep their local values, as do records whose write the store
//! confirmed after the fetch started. Events are handled one at a time in
//! the order they arrive; a reload never cancels a save or mutation in
//! flight.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use microaudit_conflict::{MergeReport, Reconciler};
use microaudit_core::domain::{Entity, OwnerId};
use microaudit_core::ports::{ChangeEvent, ChangeSubscription, User};
use microaudit_core::usecases::{LoadOutcome, LoadRecordsUseCase};

use crate::collection::LocalCollection;
use crate::context::SyncPorts;
use crate::SyncError;

/// Loads the owner's rows and merges them into the collection
struct Reloader<T> {
    collection: LocalCollection<T>,
    ports: SyncPorts,
    reconciler: Arc<Reconciler>,
    limit: usize,
}

impl<T> Clone for Reloader<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            ports: self.ports.clone(),
            reconciler: Arc::clone(&self.reconciler),
            limit: self.limit,
        }
    }
}

impl<T: Entity> Reloader<T> {
    async fn reload(&self) -> Result<MergeReport, SyncError> {
        let load = LoadRecordsUseCase::<T>::new(
            Arc::clone(&self.ports.store),
            Arc::clone(&self.ports.identity),
        )
        .with_limit(self.limit);

        // Fetch outside the collection lock; only the merge runs inside it.
        // Writes confirmed while the fetch is in flight stamp a later epoch.
        let since = self.collection.epoch();
        match load.execute().await? {
            LoadOutcome::SignedOut => {
                let dropped = self
                    .collection
                    .replace_with(|local| (Vec::new(), local.len()))
                    .await;
                debug!(table = %T::TABLE, dropped, "Signed out, cleared local records");
                Ok(MergeReport {
                    dropped,
                    ..MergeReport::default()
                })
            }
            LoadOutcome::Loaded {
                records, skipped, ..
            } => {
                let fetched = records.len();
                let reconciler = Arc::clone(&self.reconciler);
                let report = self
                    .collection
                    .replace_with(move |local| reconciler.merge_since(local, records, since))
                    .await;
                info!(
                    table = %T::TABLE,
                    fetched,
                    skipped,
                    kept_recent = report.kept_recent,
                    kept_deleted = report.kept_deleted,
                    kept_local_fields = report.kept_local_fields,
                    "Reloaded records"
                );
                Ok(report)
            }
        }
    }

    async fn subscribe(&self, owner: Option<&OwnerId>) -> Option<ChangeSubscription> {
        let owner = owner?;
        let feed = self.ports.feed.as_ref()?;
        match feed.subscribe(T::TABLE, Some(owner)).await {
            Ok(subscription) => {
                debug!(table = %T::TABLE, owner = %owner, "Subscribed to change feed");
                Some(subscription)
            }
            Err(e) => {
                warn!(table = %T::TABLE, error = %e, "Failed to subscribe to change feed");
                None
            }
        }
    }

    async fn reload_logged(&self, reason: &str) {
        if let Err(e) = self.reload().await {
            warn!(table = %T::TABLE, reason, error = %e, "Reload failed");
        }
    }
}

/// Subscribes to the change feed and session changes and reloads on both
pub struct RealtimeListener<T> {
    reloader: Reloader<T>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl<T: Entity> RealtimeListener<T> {
    /// Creates a stopped listener
    pub fn new(
        collection: LocalCollection<T>,
        ports: SyncPorts,
        reconciler: Reconciler,
        reload_limit: usize,
    ) -> Self {
        Self {
            reloader: Reloader {
                collection,
                ports,
                reconciler: Arc::new(reconciler),
                limit: reload_limit,
            },
            task: Mutex::new(None),
        }
    }

    /// Fetches the owner's records and merges them into local state
    ///
    /// # Errors
    /// Returns [`SyncError::Port`] if the identity lookup or the query fails
    pub async fn reload(&self) -> Result<MergeReport, SyncError> {
        self.reloader.reload().await
    }

    /// Loads once, then keeps listening until [`stop`](Self::stop)
    ///
    /// The subscription is opened before the initial load so no change
    /// between the two is missed. Calling `start` on a running listener
    /// restarts it.
    ///
    /// # Errors
    /// Returns the error of the initial load; the listener keeps running
    pub async fn start(&self) -> Result<MergeReport, SyncError> {
        self.stop();

        let mut session_rx = self.reloader.ports.identity.on_session_change();
        let owner = session_rx
            .borrow_and_update()
            .as_ref()
            .map(|user| user.id.clone());
        let subscription = self.reloader.subscribe(owner.as_ref()).await;
        let initial = self.reloader.reload().await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listen(
            self.reloader.clone(),
            session_rx,
            owner,
            subscription,
            cancel.clone(),
        ));
        if let Ok(mut task) = self.task.lock() {
            *task = Some((cancel, handle));
        }
        info!(table = %T::TABLE, "Realtime listener started");
        initial
    }

    /// Stops listening; a reload in progress finishes first
    pub fn stop(&self) {
        let running = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some((cancel, _handle)) = running {
            cancel.cancel();
            debug!(table = %T::TABLE, "Realtime listener stopped");
        }
    }

    /// Returns true while the listening task runs
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .ok()
            .and_then(|task| task.as_ref().map(|(_, handle)| !handle.is_finished()))
            .unwrap_or(false)
    }
}

async fn next_event(subscription: &mut Option<ChangeSubscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

async fn listen<T: Entity>(
    reloader: Reloader<T>,
    mut session_rx: watch::Receiver<Option<User>>,
    mut owner: Option<OwnerId>,
    mut subscription: Option<ChangeSubscription>,
    cancel: CancellationToken,
) {
    let mut session_open = true;
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            changed = session_rx.changed(), if session_open => {
                if changed.is_err() {
                    debug!(table = %T::TABLE, "Identity provider gone, ignoring session changes");
                    session_open = false;
                    continue;
                }
                let next_owner = session_rx.borrow_and_update().as_ref().map(|u| u.id.clone());
                info!(
                    table = %T::TABLE,
                    signed_in = next_owner.is_some(),
                    "Session changed, reloading"
                );
                if next_owner != owner {
                    subscription = reloader.subscribe(next_owner.as_ref()).await;
                    owner = next_owner;
                }
                reloader.reload_logged("session change").await;
            }

            event = next_event(&mut subscription) => {
                let Some(event) = event else {
                    warn!(table = %T::TABLE, "Change feed closed");
                    subscription = None;
                    continue;
                };
                let Some(current) = owner.as_ref() else {
                    continue;
                };
                if !event.belongs_to(current) {
                    trace!(table = %T::TABLE, operation = %event.operation, "Ignoring foreign change");
                    continue;
                }
                debug!(table = %T::TABLE, operation = %event.operation, "Change received, reloading");
                reloader.reload_logged("change event").await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::context::SyncSettings;
    use crate::notifier::CollectingNotifier;
    use crate::scheduler::{SaveOutcome, SaveScheduler};
    use microaudit_core::domain::{EditableRecord, Fields, Note, RecordId, Table};
    use microaudit_core::ports::IRemoteStore;
    use microaudit_remote::{InMemoryIdentity, InMemoryRemoteStore, StoreOp};

    struct Harness {
        store: Arc<InMemoryRemoteStore>,
        identity: Arc<InMemoryIdentity>,
        collection: LocalCollection<Note>,
        scheduler: SaveScheduler<Note>,
        listener: RealtimeListener<Note>,
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    fn harness(store: InMemoryRemoteStore) -> Harness {
        let store = Arc::new(store);
        let identity = Arc::new(InMemoryIdentity::signed_in(owner("u1")));
        let ports = SyncPorts::new(
            store.clone(),
            identity.clone(),
            Arc::new(CollectingNotifier::new()),
        )
        .with_feed(store.clone());
        let collection = LocalCollection::new();
        let scheduler = SaveScheduler::new(collection.clone(), ports.clone(), &SyncSettings::default());
        let listener = RealtimeListener::new(collection.clone(), ports, Reconciler::default(), 500);
        Harness {
            store,
            identity,
            collection,
            scheduler,
            listener,
        }
    }

    fn note_row(id: &str, user: &str, title: &str, updated_at: &str) -> Fields {
        json!({"id": id, "user_id": user, "title": title, "content": "", "updated_at": updated_at})
            .as_object()
            .cloned()
            .unwrap()
    }

    async fn titles(collection: &LocalCollection<Note>) -> Vec<String> {
        collection
            .snapshot()
            .await
            .into_iter()
            .map(|r| r.value().title.clone())
            .collect()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_reload_orders_newest_first_and_skips_foreign_rows() {
        let h = harness(InMemoryRemoteStore::new());
        h.store.seed(Table::Notes, note_row("n1", "u1", "Older", "2024-01-01T00:00:00Z"));
        h.store.seed(Table::Notes, note_row("n2", "u1", "Newer", "2024-02-01T00:00:00Z"));
        h.store.seed(Table::Notes, note_row("n3", "u2", "Theirs", "2024-03-01T00:00:00Z"));

        let report = h.listener.reload().await.unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(titles(&h.collection).await, vec!["Newer", "Older"]);
    }

    #[tokio::test]
    async fn test_reload_failure_is_an_error_and_keeps_state() {
        let h = harness(InMemoryRemoteStore::new());
        h.store.seed(Table::Notes, note_row("n1", "u1", "Kept", "2024-01-01T00:00:00Z"));
        h.listener.reload().await.unwrap();

        h.store.fail_next(StoreOp::Query, "offline");
        assert!(h.listener.reload().await.is_err());
        assert_eq!(titles(&h.collection).await, vec!["Kept"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_change_triggers_reload() {
        let h = harness(InMemoryRemoteStore::new());
        h.listener.start().await.unwrap();
        assert!(h.listener.is_running());

        h.store
            .create(Table::Notes, note_row("n1", "u1", "From phone", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        settle().await;
        assert_eq!(titles(&h.collection).await, vec!["From phone"]);

        h.listener.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_changes_are_ignored() {
        let h = harness(InMemoryRemoteStore::new());
        h.listener.start().await.unwrap();
        h.store.clear_calls();

        h.store.publish(ChangeEvent::insert(
            Table::Notes,
            note_row("n9", "u2", "Theirs", "2024-01-01T00:00:00Z"),
        ));
        settle().await;
        assert!(h.store.calls_of(StoreOp::Query).is_empty());
        h.listener.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_clears_and_sign_in_reloads() {
        let h = harness(InMemoryRemoteStore::new());
        h.store.seed(Table::Notes, note_row("n1", "u1", "Mine", "2024-01-01T00:00:00Z"));
        h.store.seed(Table::Notes, note_row("n2", "u2", "Other user", "2024-01-01T00:00:00Z"));
        h.listener.start().await.unwrap();
        assert_eq!(titles(&h.collection).await, vec!["Mine"]);

        h.identity.sign_out();
        settle().await;
        assert!(h.collection.is_empty().await);

        h.identity.sign_in(User::new(owner("u2"), None));
        settle().await;
        assert_eq!(titles(&h.collection).await, vec!["Other user"]);

        // Changes for the new owner are now delivered.
        h.store
            .create(Table::Notes, note_row("n3", "u2", "New for u2", "2024-05-01T00:00:00Z"))
            .await
            .unwrap();
        settle().await;
        assert_eq!(titles(&h.collection).await, vec!["New for u2", "Other user"]);
        h.listener.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_delete_keeps_note_with_unsaved_edit() {
        let h = harness(InMemoryRemoteStore::new());
        h.store.seed(Table::Notes, note_row("n1", "u1", "Trip", "2024-01-01T00:00:00Z"));
        h.listener.start().await.unwrap();
        let key = h.collection.snapshot().await[0].key();

        h.scheduler
            .edit(key, |n| n.content = "pack the tent".into())
            .await
            .unwrap();
        h.store
            .delete(Table::Notes, &RecordId::new("n1").unwrap())
            .await
            .unwrap();
        settle().await;

        let kept = h.collection.get(key).await.unwrap();
        assert_eq!(kept.value().content, "pack the tent");
        assert!(kept.is_dirty());
        h.listener.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_update_does_not_clobber_pending_edit() {
        let h = harness(InMemoryRemoteStore::new());
        h.store.seed(Table::Notes, note_row("n1", "u1", "Trip", "2024-01-01T00:00:00Z"));
        h.listener.start().await.unwrap();
        let key = h.collection.snapshot().await[0].key();

        h.scheduler
            .edit(key, |n| n.title = "Trip to Oslo".into())
            .await
            .unwrap();
        let mut other_device = Fields::new();
        other_device.insert("title".into(), json!("Trip (phone)"));
        other_device.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
        h.store
            .update(Table::Notes, &RecordId::new("n1").unwrap(), other_device)
            .await
            .unwrap();
        settle().await;
        assert_eq!(titles(&h.collection).await, vec!["Trip to Oslo"]);

        // After the debounced write lands, the local title is what the store holds.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let row = h.store.row(Table::Notes, "n1").unwrap();
        assert_eq!(row["title"], json!("Trip to Oslo"));
        h.listener.stop();
    }

    #[tokio::test]
    async fn test_unsaved_local_record_survives_reload() {
        let h = harness(InMemoryRemoteStore::new());
        h.collection
            .insert_front(EditableRecord::new_local(Note::new("Draft", "")))
            .await;
        h.listener.reload().await.unwrap();
        assert_eq!(titles(&h.collection).await, vec!["Draft"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_confirmed_during_reload_is_not_reverted() {
        let h = harness(InMemoryRemoteStore::new().with_query_delay(Duration::from_millis(500)));
        h.store.seed(Table::Notes, note_row("n1", "u1", "Old", "2024-01-01T00:00:00Z"));
        h.listener.reload().await.unwrap();
        let key = h.collection.snapshot().await[0].key();

        // The reload reads "Old" first; the save lands before its answer.
        let (report, outcome) = tokio::join!(h.listener.reload(), async {
            settle().await;
            h.scheduler.edit(key, |n| n.title = "New".into()).await.unwrap();
            h.scheduler.flush(key).await
        });
        assert!(matches!(outcome, SaveOutcome::Saved { created: false, .. }));
        assert_eq!(report.unwrap().kept_recent, 1);

        let record = h.collection.get(key).await.unwrap();
        assert_eq!(record.value().title, "New");
        assert!(!record.is_dirty());
        assert_eq!(h.store.row(Table::Notes, "n1").unwrap()["title"], "New");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_confirmed_during_reload_is_kept() {
        let h = harness(InMemoryRemoteStore::new().with_query_delay(Duration::from_millis(500)));
        h.store.seed(Table::Notes, note_row("n1", "u1", "Old", "2024-01-01T00:00:00Z"));
        h.listener.reload().await.unwrap();

        let (report, (key, outcome)) = tokio::join!(h.listener.reload(), async {
            settle().await;
            let key = h.scheduler.open_new(Note::new("Fresh", "")).await;
            h.scheduler.schedule_save(key).await.unwrap();
            (key, h.scheduler.flush(key).await)
        });
        assert!(matches!(outcome, SaveOutcome::Saved { created: true, .. }));
        let report = report.unwrap();
        assert_eq!(report.kept_recent, 1);
        assert_eq!(report.dropped, 0);

        assert_eq!(titles(&h.collection).await, vec!["Fresh", "Old"]);
        assert!(h.collection.get(key).await.unwrap().is_persisted());

        // A later reload sees the row and treats it as current again.
        let report = h.listener.reload().await.unwrap();
        assert_eq!(report.kept_recent, 0);
        assert_eq!(h.collection.len().await, 2);
    }
}
