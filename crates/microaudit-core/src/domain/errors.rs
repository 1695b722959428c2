//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions and
//! malformed records arriving from the remote store.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid color literal (expected `#RRGGBB`)
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A record already carries a different remote identifier
    #[error("Record already has identifier {existing}, refusing {attempted}")]
    IdAlreadyAssigned {
        /// The identifier the record was confirmed with
        existing: String,
        /// The identifier that was offered afterwards
        attempted: String,
    },

    /// A row from the remote store could not be mapped to an entity
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidColor("blue".to_string());
        assert_eq!(err.to_string(), "Invalid color: blue");

        let err = DomainError::InvalidState {
            from: "Clean".to_string(),
            to: "Saving".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid state transition from Clean to Saving");

        let err = DomainError::IdAlreadyAssigned {
            existing: "n1".to_string(),
            attempted: "n2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Record already has identifier n1, refusing n2"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::ValidationFailed("title".to_string());
        let err2 = DomainError::ValidationFailed("title".to_string());
        let err3 = DomainError::ValidationFailed("other".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
