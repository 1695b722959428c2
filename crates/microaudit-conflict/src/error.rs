//! Error types for the reconciliation engine

use microaudit_core::domain::DomainError;
use thiserror::Error;

/// Errors that can occur during conflict detection and reconciliation
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Invalid glob pattern in a reconcile rule
    #[error("invalid glob pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unknown strategy name in configuration
    #[error("invalid strategy '{0}'; valid: prefer_local, prefer_remote")]
    InvalidStrategy(String),

    /// A record could not be serialized or rebuilt from merged fields
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}
