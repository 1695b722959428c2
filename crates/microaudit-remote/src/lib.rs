//! MicroAudit Remote - Remote store and identity adapters
//!
//! Provides:
//! - A PostgREST-style REST adapter for the data API (`/rest/v1/...`)
//! - An auth API adapter (`/auth/v1/...`) implementing the identity port
//! - Session persistence in the system keyring
//! - An in-memory store with a realtime change feed, used by tests and
//!   offline demos
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client and status mapping
//! - [`store`] - [`IRemoteStore`](microaudit_core::ports::IRemoteStore) over REST
//! - [`identity`] - [`IIdentityProvider`](microaudit_core::ports::IIdentityProvider) over the auth API
//! - [`session_store`] - Keyring-backed session storage
//! - [`memory`] - In-memory store, change feed and identity

pub mod client;
pub mod identity;
pub mod memory;
pub mod session_store;
pub mod store;

pub use client::RestClient;
pub use identity::{RestIdentityProvider, Session};
pub use memory::{InMemoryIdentity, InMemoryRemoteStore, StoreCall, StoreOp};
pub use session_store::KeyringSessionStore;
pub use store::RestRemoteStore;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with the remote backend
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Credentials are missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The row-level policy rejected the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested row or endpoint does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness or foreign key constraint was violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request was rejected as malformed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limit exceeded
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server asked us to wait
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// An operation needs a session and none is active
    #[error("Not signed in")]
    NotSignedIn,

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
