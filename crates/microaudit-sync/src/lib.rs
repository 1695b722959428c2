//! MicroAudit Sync - Debounced & optimistic synchronization model
//!
//! Provides:
//! - Debounced autosave of continuously edited records
//! - Optimistic direct mutations with field-level revert on failure
//! - Realtime reload with reconciliation of pending local edits
//!
//! ## Modules
//!
//! - [`collection`] - Shared local list of editable records
//! - [`scheduler`] - Per-record debounce timers and the in-flight write guard
//! - [`optimistic`] - Toggle/rename/update/delete/create applied before the network call
//! - [`realtime`] - Change feed listener that reloads and merges
//! - [`controller`] - One facade per entity type composing the above
//! - [`notifier`] - Notification adapters (tracing, in-memory)

pub mod collection;
pub mod context;
pub mod controller;
pub mod input;
pub mod notifier;
pub mod optimistic;
pub mod realtime;
pub mod scheduler;

pub use collection::LocalCollection;
pub use context::{SyncPorts, SyncSettings};
pub use controller::SyncController;
pub use input::InputField;
pub use notifier::{CollectingNotifier, TracingNotifier};
pub use optimistic::{MutationOutcome, OptimisticExecutor};
pub use realtime::RealtimeListener;
pub use scheduler::{SaveOutcome, SaveScheduler};

use microaudit_core::domain::LocalKey;
use thiserror::Error;

/// Errors that can occur during synchronization operations
///
/// Remote failures are not errors at this level: they are reported through
/// notifications and outcome values. These variants cover misuse and
/// broken invariants.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No record with this key in the local collection
    #[error("Record not found: {0}")]
    RecordNotFound(LocalKey),

    /// The record has not been created remotely yet
    #[error("Record {0} has no remote identifier yet")]
    NotPersisted(LocalKey),

    /// The change feed is not available for this store
    #[error("Change feed unavailable")]
    FeedUnavailable,

    /// A domain-level error propagated from microaudit-core
    #[error("Domain error: {0}")]
    DomainError(#[from] microaudit_core::domain::DomainError),

    /// A reconciliation error propagated from microaudit-conflict
    #[error("Reconcile error: {0}")]
    ConflictError(#[from] microaudit_conflict::ConflictError),

    /// A port call failed outside the action handlers
    #[error("Port error: {0}")]
    Port(#[from] anyhow::Error),
}
