//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Row CRUD and queries against the remote backend
//! - [`IChangeFeed`] - Realtime insert/update/delete notifications
//! - [`IIdentityProvider`] - Signed-in user and session changes
//! - [`INotificationService`] - Non-blocking user notifications

pub mod change_feed;
pub mod identity;
pub mod notification;
pub mod remote_store;

pub use change_feed::{ChangeEvent, ChangeOperation, ChangeSubscription, IChangeFeed};
pub use identity::{IIdentityProvider, User};
pub use notification::{INotificationService, Notification, NotificationPriority};
pub use remote_store::{Direction, IRemoteStore, OrderBy, Query};
