//! Domain entities and business logic
//!
//! This module contains the core domain types for MicroAudit:
//! - Newtypes for type-safe identifiers and validated values
//! - Editable records and the [`Entity`] contract
//! - Typed entities: notes, tasks, workspaces, resources, profiles
//! - Optimistic mutation snapshots
//! - The per-record save state machine
//! - Domain-specific error types

pub mod errors;
pub mod mutation;
pub mod newtypes;
pub mod note;
pub mod profile;
pub mod record;
pub mod save_state;
pub mod task;
pub mod workspace;

// Re-export commonly used types
pub use errors::DomainError;
pub use mutation::{FieldSnapshot, MutationAction, OptimisticMutation};
pub use newtypes::*;
pub use note::Note;
pub use profile::Profile;
pub use record::{EditableRecord, Entity, Fields, Table};
pub use save_state::{PendingWrite, SaveState};
pub use task::Task;
pub use workspace::{task_progress, Resource, ResourceKind, Workspace};
