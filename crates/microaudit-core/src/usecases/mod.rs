//! Use cases (interactors) for MicroAudit
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`LoadRecordsUseCase`] - Owner-scoped, newest-first fetch of one entity type
//! - [`SeedDefaultsUseCase`] - Welcome and how-to notes for a new account
//! - [`NoteFilter`] - Query/tag filtering and the pinned split of the note list

pub mod load_records;
pub mod note_filter;
pub mod seed_defaults;

#[cfg(test)]
pub(crate) mod fakes;

pub use load_records::{LoadOutcome, LoadRecordsUseCase};
pub use note_filter::{all_tags, NoteFilter, NoteListView, ALL_TAGS};
pub use seed_defaults::{default_notes, SeedDefaultsUseCase};
