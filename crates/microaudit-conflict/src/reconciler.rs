//! Reload reconciliation
//!
//! A realtime reload fetches the owner's full list. Merging it into local
//! state follows these rules:
//!
//! - A local record without pending state takes the fetched value.
//! - A local record with pending state (dirty, or with optimistic operations
//!   in flight) resolves every conflicting field through the
//!   [`PolicyEngine`]; by default the local value wins.
//! - A local record whose write was confirmed after the fetch started is
//!   newer than its fetched row; it keeps its local value and is never
//!   dropped (see [`Reconciler::merge_since`]).
//! - A local record that was never created remotely is kept.
//! - A local record missing from the fetch is dropped, unless it has pending
//!   state; then it is kept until its write completes.
//! - Fetched records unknown locally are added.
//!
//! Local keys survive the merge, so timers and snapshots keyed by them stay
//! attached to the right record.
//!
//! Resulting order: local-only records first (newest local work), then
//! records created after the fetch started, then the fetched order, then
//! records kept despite a remote delete.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use microaudit_core::domain::{EditableRecord, Entity, RecordId};

use crate::detector::ConflictDetector;
use crate::error::ConflictError;
use crate::policy::{PolicyEngine, Strategy};

/// Counters describing one merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Records replaced by their fetched value
    pub refreshed: usize,
    /// Fetched records that were not known locally
    pub added: usize,
    /// Conflicting fields where the local value was kept
    pub kept_local_fields: usize,
    /// Conflicting fields where the fetched value was taken over a pending record
    pub took_remote_fields: usize,
    /// Records confirmed after the fetch started, kept as they are
    pub kept_recent: usize,
    /// Records not yet created remotely, kept as they are
    pub kept_unsaved: usize,
    /// Records deleted remotely but kept because of pending local state
    pub kept_deleted: usize,
    /// Records deleted remotely and dropped locally
    pub dropped: usize,
}

/// Merges fetched records into the local list
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: PolicyEngine,
}

impl Reconciler {
    /// Creates a reconciler with the given policy
    pub fn new(policy: PolicyEngine) -> Self {
        Self { policy }
    }

    /// The policy used for pending records
    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Merges `fetched` into `local`, treating `fetched` as current
    pub fn merge<T: Entity>(
        &self,
        local: Vec<EditableRecord<T>>,
        fetched: Vec<EditableRecord<T>>,
    ) -> (Vec<EditableRecord<T>>, MergeReport) {
        self.merge_since(local, fetched, u64::MAX)
    }

    /// Merges `fetched`, a snapshot taken at confirmation epoch `since`,
    /// into `local`
    ///
    /// Records stamped with a later epoch were written after the snapshot
    /// was read, so the fetched row is stale for them.
    pub fn merge_since<T: Entity>(
        &self,
        local: Vec<EditableRecord<T>>,
        fetched: Vec<EditableRecord<T>>,
        since: u64,
    ) -> (Vec<EditableRecord<T>>, MergeReport) {
        let mut report = MergeReport::default();
        let mut unsaved = Vec::new();
        let mut by_id: HashMap<RecordId, EditableRecord<T>> = HashMap::new();
        let mut local_order: Vec<RecordId> = Vec::new();

        for record in local {
            match record.id().cloned() {
                Some(id) => {
                    local_order.push(id.clone());
                    by_id.insert(id, record);
                }
                None => unsaved.push(record),
            }
        }
        report.kept_unsaved = unsaved.len();

        let mut merged = unsaved;
        merged.reserve(fetched.len());
        for remote in fetched {
            let Some(id) = remote.id().cloned() else {
                continue;
            };
            match by_id.remove(&id) {
                Some(current) if current.confirmed_since(since) => {
                    trace!(
                        table = %T::TABLE,
                        record_id = %id,
                        "Keeping record confirmed after the fetch started"
                    );
                    report.kept_recent += 1;
                    merged.push(current);
                }
                Some(mut current) if current.has_pending_local_state() => {
                    self.merge_pending(&mut current, &remote, &mut report);
                    merged.push(current);
                }
                Some(mut current) => {
                    current.set_value(remote.value().clone());
                    if let Some(owner) = remote.owner() {
                        current.set_owner(owner.clone());
                    }
                    current.touch(remote.updated_at());
                    report.refreshed += 1;
                    merged.push(current);
                }
                None => {
                    report.added += 1;
                    merged.push(remote);
                }
            }
        }

        let mut newer_than_fetch = Vec::new();
        for id in local_order {
            if let Some(record) = by_id.remove(&id) {
                if record.confirmed_since(since) {
                    debug!(
                        table = %T::TABLE,
                        record_id = %id,
                        "Keeping record created or saved after the fetch started"
                    );
                    report.kept_recent += 1;
                    newer_than_fetch.push(record);
                } else if record.has_pending_local_state() {
                    debug!(
                        table = %T::TABLE,
                        record_id = %id,
                        "Keeping remotely deleted record with pending local edits"
                    );
                    report.kept_deleted += 1;
                    merged.push(record);
                } else {
                    report.dropped += 1;
                }
            }
        }

        let front = report.kept_unsaved;
        merged.splice(front..front, newer_than_fetch);

        debug!(table = %T::TABLE, report = ?report, "Merged reload into local state");
        (merged, report)
    }

    fn merge_pending<T: Entity>(
        &self,
        current: &mut EditableRecord<T>,
        remote: &EditableRecord<T>,
        report: &mut MergeReport,
    ) {
        match self.resolve_fields(current, remote) {
            Ok((value, kept, took)) => {
                report.kept_local_fields += kept;
                report.took_remote_fields += took;
                if let Some(value) = value {
                    current.set_value(value);
                }
                if remote.updated_at() > current.updated_at() {
                    current.touch(remote.updated_at());
                }
            }
            Err(e) => {
                warn!(
                    table = %T::TABLE,
                    key = %current.key(),
                    error = %e,
                    "Could not merge fetched fields, keeping local value"
                );
            }
        }
    }

    /// Returns the merged value (if any field was taken from the remote side)
    /// and the kept/taken counts
    fn resolve_fields<T: Entity>(
        &self,
        current: &EditableRecord<T>,
        remote: &EditableRecord<T>,
    ) -> Result<(Option<T>, usize, usize), ConflictError> {
        let conflicts = ConflictDetector::detect(current, remote)?;
        if conflicts.is_empty() {
            return Ok((None, 0, 0));
        }

        let mut fields = match serde_json::to_value(current.value()) {
            Ok(Value::Object(map)) => map,
            _ => return Ok((None, conflicts.len(), 0)),
        };
        let (mut kept, mut took) = (0, 0);
        for conflict in conflicts {
            match self.policy.evaluate(conflict.table, &conflict.field) {
                Strategy::PreferLocal => kept += 1,
                Strategy::PreferRemote => {
                    took += 1;
                    if conflict.remote.is_null() {
                        fields.remove(&conflict.field);
                    } else {
                        fields.insert(conflict.field, conflict.remote);
                    }
                }
            }
        }
        if took == 0 {
            return Ok((None, kept, 0));
        }

        let value: T = serde_json::from_value(Value::Object(fields)).map_err(|e| {
            microaudit_core::domain::DomainError::MalformedRecord(format!("{}: {e}", T::LABEL))
        })?;
        Ok((Some(value), kept, took))
    }
}
