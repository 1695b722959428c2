//! Per-table sync controller
//!
//! Wires the local collection, the debounced save scheduler, the optimistic
//! executor and the realtime listener together for one record type. A view
//! holds one controller per table it shows and talks only to it.

use tokio::sync::watch;
use tracing::info;

use microaudit_conflict::{MergeReport, PolicyEngine, Reconciler};
use microaudit_core::config::Config;
use microaudit_core::domain::{
    Color, EditableRecord, Entity, LocalKey, MutationAction, Note, RecordId, Resource, SaveState,
    Task, Workspace,
};
use microaudit_core::ports::Notification;

use crate::collection::LocalCollection;
use crate::context::{SyncPorts, SyncSettings};
use crate::input::InputField;
use crate::optimistic::{MutationOutcome, OptimisticExecutor};
use crate::realtime::RealtimeListener;
use crate::scheduler::{SaveOutcome, SaveScheduler};
use crate::SyncError;

/// Sync front door for one record type
///
/// Dropping the controller stops the listener and cancels every pending
/// save timer; writes already in flight still complete.
pub struct SyncController<T: Entity> {
    collection: LocalCollection<T>,
    scheduler: SaveScheduler<T>,
    executor: OptimisticExecutor<T>,
    listener: RealtimeListener<T>,
    ports: SyncPorts,
}

impl<T: Entity> SyncController<T> {
    /// Creates a controller with an empty local list
    pub fn new(ports: SyncPorts, settings: SyncSettings, reconciler: Reconciler) -> Self {
        let collection = LocalCollection::new();
        let scheduler = SaveScheduler::new(collection.clone(), ports.clone(), &settings);
        let executor = OptimisticExecutor::new(collection.clone(), ports.clone(), scheduler.clone());
        let listener = RealtimeListener::new(
            collection.clone(),
            ports.clone(),
            reconciler,
            settings.reload_limit,
        );
        Self {
            collection,
            scheduler,
            executor,
            listener,
            ports,
        }
    }

    /// Creates a controller with settings and merge rules from `config`
    pub fn from_config(ports: SyncPorts, config: &Config) -> Self {
        let reconciler = Reconciler::new(PolicyEngine::from_config(&config.reconcile));
        Self::new(ports, SyncSettings::from_config(config), reconciler)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Current records, in display order
    pub async fn records(&self) -> Vec<EditableRecord<T>> {
        self.collection.snapshot().await
    }

    pub async fn get(&self, key: LocalKey) -> Option<EditableRecord<T>> {
        self.collection.get(key).await
    }

    pub async fn find_by_id(&self, id: &RecordId) -> Option<EditableRecord<T>> {
        self.collection.find_by_id(id).await
    }

    /// Change counter that ticks whenever the list changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.collection.subscribe()
    }

    /// Save state shown next to the record's editor
    pub fn state(&self, key: LocalKey) -> SaveState {
        self.scheduler.state(key)
    }

    pub fn collection(&self) -> &LocalCollection<T> {
        &self.collection
    }

    pub fn ports(&self) -> &SyncPorts {
        &self.ports
    }

    // ========================================================================
    // Debounced editing
    // ========================================================================

    /// Opens a new, unsaved record for editing
    pub async fn open_new(&self, value: T) -> LocalKey {
        self.scheduler.open_new(value).await
    }

    /// Applies a keystroke-level edit and restarts the save timer
    ///
    /// # Errors
    /// Returns [`SyncError::RecordNotFound`] if the record is gone
    pub async fn edit(&self, key: LocalKey, f: impl FnOnce(&mut T)) -> Result<(), SyncError> {
        self.scheduler.edit(key, f).await
    }

    /// Marks the record dirty and restarts the save timer
    ///
    /// # Errors
    /// Returns [`SyncError::RecordNotFound`] if the record is gone
    pub async fn schedule_save(&self, key: LocalKey) -> Result<(), SyncError> {
        self.scheduler.schedule_save(key).await
    }

    /// Saves now instead of waiting for the timer
    pub async fn flush(&self, key: LocalKey) -> SaveOutcome {
        self.scheduler.flush(key).await
    }

    /// Saves every dirty record now
    pub async fn flush_all(&self) -> Vec<(LocalKey, SaveOutcome)> {
        self.scheduler.flush_all().await
    }

    // ========================================================================
    // Direct actions
    // ========================================================================

    /// Applies a direct action optimistically
    ///
    /// # Errors
    /// See [`OptimisticExecutor::apply`]
    pub async fn apply(
        &self,
        key: LocalKey,
        action: MutationAction,
        mutate: impl FnOnce(&mut T),
    ) -> Result<MutationOutcome, SyncError> {
        self.executor.apply(key, action, mutate).await
    }

    /// Removes the record locally and remotely
    ///
    /// # Errors
    /// See [`OptimisticExecutor::delete`]
    pub async fn delete(&self, key: LocalKey) -> Result<MutationOutcome, SyncError> {
        self.executor.delete(key).await
    }

    /// Creates a record from the text in `input`
    ///
    /// # Errors
    /// See [`OptimisticExecutor::create`]
    pub async fn create(
        &self,
        input: &InputField,
        build: impl FnOnce(String) -> T,
    ) -> Result<MutationOutcome, SyncError> {
        self.executor.create(input, build).await
    }

    // ========================================================================
    // Realtime
    // ========================================================================

    /// Fetches and merges the owner's records once
    ///
    /// # Errors
    /// Returns [`SyncError::Port`] if the load fails
    pub async fn reload(&self) -> Result<MergeReport, SyncError> {
        self.listener.reload().await
    }

    /// Loads the records and starts listening for changes
    ///
    /// # Errors
    /// Returns the error of the initial load; listening continues anyway
    pub async fn start(&self) -> Result<MergeReport, SyncError> {
        self.listener.start().await
    }

    pub fn stop(&self) {
        self.listener.stop();
    }

    /// Stops listening and cancels pending timers without saving
    pub fn close(&self) {
        if self.scheduler.is_closed() {
            return;
        }
        self.listener.stop();
        self.scheduler.close();
        info!(table = %T::TABLE, "Sync controller closed");
    }
}

impl<T: Entity> Drop for SyncController<T> {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Typed actions
// ============================================================================

impl SyncController<Task> {
    /// Flips the task's completion flag
    ///
    /// # Errors
    /// See [`OptimisticExecutor::apply`]
    pub async fn toggle_done(&self, key: LocalKey) -> Result<MutationOutcome, SyncError> {
        self.apply(key, MutationAction::toggle("done"), |t| t.done = !t.done)
            .await
    }

    /// Adds a task titled with the input text, optionally inside a workspace
    ///
    /// # Errors
    /// See [`OptimisticExecutor::create`]
    pub async fn add(
        &self,
        input: &InputField,
        workspace: Option<RecordId>,
    ) -> Result<MutationOutcome, SyncError> {
        self.create(input, move |title| {
            let task = Task::new(title);
            match workspace {
                Some(id) => task.in_workspace(id),
                None => task,
            }
        })
        .await
    }
}

impl SyncController<Note> {
    /// Pins or unpins the note
    ///
    /// # Errors
    /// See [`OptimisticExecutor::apply`]
    pub async fn toggle_pinned(&self, key: LocalKey) -> Result<MutationOutcome, SyncError> {
        self.apply(key, MutationAction::toggle("pinned"), |n| {
            n.pinned = !n.pinned;
        })
        .await
    }

    /// # Errors
    /// See [`OptimisticExecutor::apply`]
    pub async fn set_color(&self, key: LocalKey, color: Color) -> Result<MutationOutcome, SyncError> {
        self.apply(key, MutationAction::update("color"), move |n| n.color = color)
            .await
    }

    /// Adds the tag if absent, removes it otherwise
    ///
    /// # Errors
    /// See [`OptimisticExecutor::apply`]
    pub async fn toggle_tag(&self, key: LocalKey, tag: &str) -> Result<MutationOutcome, SyncError> {
        self.apply(key, MutationAction::update("tags"), |n| n.toggle_tag(tag))
            .await
    }
}

impl SyncController<Workspace> {
    /// # Errors
    /// See [`OptimisticExecutor::apply`]
    pub async fn rename(&self, key: LocalKey, title: &str) -> Result<MutationOutcome, SyncError> {
        let title = title.to_string();
        self.apply(key, MutationAction::Rename, move |w| w.title = title)
            .await
    }

    /// # Errors
    /// See [`OptimisticExecutor::apply`]
    pub async fn set_icon(&self, key: LocalKey, icon: &str) -> Result<MutationOutcome, SyncError> {
        let icon = icon.to_string();
        self.apply(key, MutationAction::update("icon"), move |w| w.icon = icon)
            .await
    }

    /// # Errors
    /// See [`OptimisticExecutor::apply`]
    pub async fn set_color(&self, key: LocalKey, color: Color) -> Result<MutationOutcome, SyncError> {
        self.apply(key, MutationAction::update("color"), move |w| w.color = color)
            .await
    }
}

impl SyncController<Resource> {
    /// Resources attached to `workspace`, in display order
    pub async fn in_workspace(&self, workspace: &RecordId) -> Vec<EditableRecord<Resource>> {
        self.records()
            .await
            .into_iter()
            .filter(|r| r.value().workspace_id == *workspace)
            .collect()
    }

    /// Attaches a link to `workspace`, using the input text as the URL
    ///
    /// # Errors
    /// See [`OptimisticExecutor::create`]
    pub async fn add_link(
        &self,
        workspace: RecordId,
        title: &str,
        input: &InputField,
    ) -> Result<MutationOutcome, SyncError> {
        let link = match Resource::link(workspace, title, &input.get()) {
            Ok(link) => link,
            Err(e) => {
                let reason = e.to_string();
                self.ports
                    .notify(Notification::validation(Resource::LABEL, reason.clone()))
                    .await;
                return Ok(MutationOutcome::Rejected { reason });
            }
        };
        self.create(input, move |_| link).await
    }
}
