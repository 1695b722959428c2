//! MicroAudit Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Note`, `Task`, `Workspace`, `Resource`, `Profile`,
//!   wrapped in `EditableRecord` with the sync bookkeeping
//! - **Use cases** - `LoadRecordsUseCase`, `SeedDefaultsUseCase`, `NoteFilter`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `IChangeFeed`,
//!   `IIdentityProvider`, `INotificationService`
//! - **State machine** - Per-record save state (`Clean`, `Dirty`, `Saving`,
//!   `DirtyWithError`)
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
