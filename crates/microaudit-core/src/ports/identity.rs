//! Identity provider port (driven/secondary port)
//!
//! This module defines the interface for looking up the signed-in user and
//! observing session changes (sign in, sign out, token refresh).
//!
//! ## Design Notes
//!
//! - Having no user is a normal state ("nothing to sync"), not an error, so
//!   `current_user` returns `Option<User>`.
//! - Session changes are published on a `tokio::sync::watch` channel so that
//!   late subscribers always see the latest session.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::newtypes::OwnerId;

/// The authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier, also the owner of the user's rows
    pub id: OwnerId,
    /// Sign-in email, when the provider exposes it
    pub email: Option<String>,
}

impl User {
    /// Creates a user
    pub fn new(id: OwnerId, email: Option<String>) -> Self {
        Self { id, email }
    }
}

/// Port trait for authentication state
#[async_trait::async_trait]
pub trait IIdentityProvider: Send + Sync {
    /// Returns the signed-in user, if any
    ///
    /// # Errors
    /// Returns an error only if the provider could not be reached; a missing
    /// session is `Ok(None)`
    async fn current_user(&self) -> anyhow::Result<Option<User>>;

    /// Returns a receiver that observes every session change
    fn on_session_change(&self) -> watch::Receiver<Option<User>>;
}
