//! Optimistic direct mutations
//!
//! Direct actions (toggle, rename, update, delete, create) change local
//! state before the remote call so the user sees the result immediately.
//! The executor keeps exactly what it needs to undo the action:
//!
//! - update actions keep a [`FieldSnapshot`] of the touched fields; a failed
//!   call writes only those fields back, so concurrent edits to other fields
//!   survive
//! - delete keeps the removed record and its position
//! - create keeps the text the user typed
//!
//! A revert happens if and only if the remote call fails.

use chrono::Utc;
use tracing::{debug, info, warn};

use microaudit_core::domain::record::{build_payload, row_id};
use microaudit_core::domain::{
    EditableRecord, Entity, FieldSnapshot, LocalKey, MutationAction, OptimisticMutation, RecordId,
};
use microaudit_core::ports::Notification;

use crate::collection::LocalCollection;
use crate::context::SyncPorts;
use crate::input::InputField;
use crate::scheduler::SaveScheduler;
use crate::SyncError;

/// Result of a direct mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store confirmed the mutation
    Confirmed,
    /// The action changed nothing; no call was made
    Unchanged,
    /// The store rejected the call; local state was put back
    Reverted { error: String },
    /// The input was invalid; nothing changed and no call was made
    Rejected { reason: String },
    /// A record was created and inserted with its remote identifier
    Created { key: LocalKey, id: RecordId },
    /// Nobody is signed in; nothing was sent
    Skipped,
}

impl MutationOutcome {
    /// Returns true if the store confirmed the action
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self,
            MutationOutcome::Confirmed | MutationOutcome::Created { .. }
        )
    }
}

/// Intermediate result of the local half of an update action
enum Prepared {
    Send {
        id: RecordId,
        mutation: OptimisticMutation,
        name: String,
    },
    Invalid(String),
    Unchanged,
}

/// Applies direct mutations for one entity type
pub struct OptimisticExecutor<T> {
    collection: LocalCollection<T>,
    ports: SyncPorts,
    scheduler: SaveScheduler<T>,
}

impl<T> Clone for OptimisticExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            ports: self.ports.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T: Entity> OptimisticExecutor<T> {
    /// Creates an executor sharing `collection` with `scheduler`
    pub fn new(collection: LocalCollection<T>, ports: SyncPorts, scheduler: SaveScheduler<T>) -> Self {
        Self {
            collection,
            ports,
            scheduler,
        }
    }

    // ========================================================================
    // Update actions
    // ========================================================================

    /// Applies `mutate` locally, then sends the changed fields
    ///
    /// # Errors
    /// Returns [`SyncError::RecordNotFound`] if the record is gone and
    /// [`SyncError::NotPersisted`] if it has no remote identifier yet.
    /// Remote failures are not errors; they produce
    /// [`MutationOutcome::Reverted`].
    pub async fn apply(
        &self,
        key: LocalKey,
        action: MutationAction,
        mutate: impl FnOnce(&mut T),
    ) -> Result<MutationOutcome, SyncError> {
        let prepared = self
            .collection
            .update(key, |record| -> Result<Prepared, SyncError> {
                let id = record.id().cloned().ok_or(SyncError::NotPersisted(key))?;
                let before = record.value().clone();
                let mut after = before.clone();
                mutate(&mut after);

                if let Err(e) = after.normalized().validate() {
                    return Ok(Prepared::Invalid(e.to_string()));
                }
                let snapshot = FieldSnapshot::capture(&before, &after)?;
                if snapshot.is_empty() {
                    return Ok(Prepared::Unchanged);
                }

                let name = before.display_name();
                record.set_value(after);
                record.begin_op();
                Ok(Prepared::Send {
                    id,
                    mutation: OptimisticMutation { action, snapshot },
                    name,
                })
            })
            .await
            .ok_or(SyncError::RecordNotFound(key))??;

        let (id, mutation, name) = match prepared {
            Prepared::Send { id, mutation, name } => (id, mutation, name),
            Prepared::Unchanged => {
                debug!(table = %T::TABLE, key = %key, "Mutation changed nothing");
                return Ok(MutationOutcome::Unchanged);
            }
            Prepared::Invalid(reason) => {
                debug!(table = %T::TABLE, key = %key, reason = %reason, "Mutation rejected");
                self.ports
                    .notify(Notification::validation(T::LABEL, reason.clone()))
                    .await;
                return Ok(MutationOutcome::Rejected { reason });
            }
        };

        let now = Utc::now();
        let mut payload = mutation.snapshot.after().clone();
        payload.insert(
            microaudit_core::domain::record::UPDATED_AT_FIELD.into(),
            serde_json::Value::String(now.to_rfc3339()),
        );
        debug!(
            table = %T::TABLE,
            key = %key,
            record_id = %id,
            action = %mutation.action,
            "Sending optimistic mutation"
        );

        match self.ports.store.update(T::TABLE, &id, payload).await {
            Ok(_) => {
                let epoch = self.collection.next_epoch();
                self.collection
                    .update(key, |record| {
                        record.end_op();
                        record.mark_confirmed(epoch);
                        if now > record.updated_at() {
                            record.touch(now);
                        }
                    })
                    .await;
                info!(
                    table = %T::TABLE,
                    record_id = %id,
                    action = %mutation.action,
                    "Mutation confirmed"
                );
                Ok(MutationOutcome::Confirmed)
            }
            Err(e) => {
                let error = format!("{e:#}");
                self.revert_fields(key, &mutation).await;
                warn!(
                    table = %T::TABLE,
                    record_id = %id,
                    action = %mutation.action,
                    error = %error,
                    "Mutation failed, reverted"
                );
                self.ports
                    .notify(Notification::failure(
                        mutation.action.verb(),
                        T::LABEL,
                        &name,
                        &error,
                    ))
                    .await;
                Ok(MutationOutcome::Reverted { error })
            }
        }
    }

    async fn revert_fields(&self, key: LocalKey, mutation: &OptimisticMutation) {
        let reverted = self
            .collection
            .update(key, |record| {
                record.end_op();
                match mutation.snapshot.restore_onto(record.value()) {
                    Ok(value) => {
                        record.set_value(value);
                        true
                    }
                    Err(e) => {
                        warn!(table = %T::TABLE, key = %key, error = %e, "Could not restore fields");
                        false
                    }
                }
            })
            .await;
        if reverted.is_none() {
            debug!(table = %T::TABLE, key = %key, "Record gone before revert");
        }
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Removes the record locally, then deletes it remotely
    ///
    /// Any pending debounced save is cancelled. On failure the record is
    /// put back at its previous position.
    ///
    /// # Errors
    /// Returns [`SyncError::RecordNotFound`] if the record is gone
    pub async fn delete(&self, key: LocalKey) -> Result<MutationOutcome, SyncError> {
        self.scheduler.cancel(key);
        let (index, record) = self
            .collection
            .remove(key)
            .await
            .ok_or(SyncError::RecordNotFound(key))?;

        let Some(id) = record.id().cloned() else {
            // Never created remotely; a create still in flight removes its
            // own row once it finds the record gone.
            self.scheduler.forget(key);
            debug!(table = %T::TABLE, key = %key, "Deleted local-only record");
            return Ok(MutationOutcome::Confirmed);
        };

        match self.ports.store.delete(T::TABLE, &id).await {
            Ok(()) => {
                self.scheduler.forget(key);
                info!(table = %T::TABLE, record_id = %id, "Deleted record");
                Ok(MutationOutcome::Confirmed)
            }
            Err(e) => {
                let error = format!("{e:#}");
                let name = record.value().display_name();
                let dirty = record.is_dirty();
                self.collection.insert_at(index, record).await;
                if dirty {
                    if let Err(e) = self.scheduler.schedule_save(key).await {
                        debug!(table = %T::TABLE, key = %key, error = %e, "Could not reschedule save");
                    }
                }
                warn!(
                    table = %T::TABLE,
                    record_id = %id,
                    error = %error,
                    "Delete failed, record restored"
                );
                self.ports
                    .notify(Notification::failure("delete", T::LABEL, &name, &error))
                    .await;
                Ok(MutationOutcome::Reverted { error })
            }
        }
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Creates a record from the text in `input`
    ///
    /// The input is cleared before the call and restored to exactly what
    /// was typed if the call fails. No placeholder is shown while the call
    /// is in flight; the record appears once the store has assigned its
    /// identifier.
    ///
    /// # Errors
    /// Returns a domain error if the value cannot be serialized
    pub async fn create(
        &self,
        input: &InputField,
        build: impl FnOnce(String) -> T,
    ) -> Result<MutationOutcome, SyncError> {
        let typed = input.get();
        if typed.trim().is_empty() {
            let reason = "input is empty".to_string();
            self.ports
                .notify(Notification::validation(T::LABEL, reason.clone()))
                .await;
            return Ok(MutationOutcome::Rejected { reason });
        }

        input.clear();
        let value = build(typed.trim().to_string());
        if let Err(e) = value.normalized().validate() {
            input.set(typed);
            let reason = e.to_string();
            self.ports
                .notify(Notification::validation(T::LABEL, reason.clone()))
                .await;
            return Ok(MutationOutcome::Rejected { reason });
        }
        let name = value.display_name();

        let user = match self.ports.identity.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                input.set(typed);
                debug!(table = %T::TABLE, "No user signed in, create skipped");
                return Ok(MutationOutcome::Skipped);
            }
            Err(e) => {
                input.set(typed);
                return Ok(self.create_failed(&name, format!("{e:#}")).await);
            }
        };

        let now = Utc::now();
        let payload = match build_payload(&value, &user.id, now) {
            Ok(payload) => payload,
            Err(e) => {
                input.set(typed);
                return Err(e.into());
            }
        };

        let created = self
            .ports
            .store
            .create(T::TABLE, payload)
            .await
            .and_then(|row| {
                row_id(&row)
                    .ok_or_else(|| anyhow::anyhow!("{} created without an identifier", T::LABEL))
            });

        match created {
            Ok(id) => {
                let mut record = EditableRecord::persisted(id.clone(), user.id, value, now);
                record.mark_confirmed(self.collection.next_epoch());
                let key = record.key();
                self.collection.insert_front(record).await;
                info!(table = %T::TABLE, record_id = %id, "Created record");
                Ok(MutationOutcome::Created { key, id })
            }
            Err(e) => {
                input.set(typed);
                Ok(self.create_failed(&name, format!("{e:#}")).await)
            }
        }
    }

    async fn create_failed(&self, name: &str, error: String) -> MutationOutcome {
        warn!(table = %T::TABLE, error = %error, "Create failed, input restored");
        self.ports
            .notify(Notification::failure("create", T::LABEL, name, &error))
            .await;
        MutationOutcome::Reverted { error }
    }
}
