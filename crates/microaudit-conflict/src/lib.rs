//! MicroAudit Conflict - Reconciliation of fetched data with local state
//!
//! Provides:
//! - Field-level conflict detection between a local record and its fetched row
//! - Configurable per-field strategies (`prefer_local` / `prefer_remote`)
//!   matched by glob on `"{table}.{field}"`
//! - A reconciler that merges a reload into the local list without losing
//!   pending local edits

pub mod detector;
pub mod error;
pub mod policy;
pub mod reconciler;

pub use detector::{ConflictDetector, FieldConflict};
pub use error::ConflictError;
pub use policy::{ConflictRule, PolicyEngine, Strategy};
pub use reconciler::{MergeReport, Reconciler};
