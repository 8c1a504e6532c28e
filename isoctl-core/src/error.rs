//! Structured error types for isoctl-core.
//!
//! Every variant is some flavour of "a database operation failed"; the
//! runner catches them at the scenario boundary, prints the message and
//! carries on with cleanup. The CLI never turns one into a non-zero exit.

use thiserror::Error;

/// Main error type for isoctl-core operations
#[derive(Error, Debug)]
pub enum DemoError {
    /// The MySQL driver reported a failure
    #[error("{source}")]
    Database {
        #[from]
        source: sqlx::Error,
    },

    /// A session could not be opened
    #[error("{label}: {reason}")]
    Connect { label: String, reason: String },

    /// `SELECT balance ...` returned no row
    #[error("account '{name}' not found")]
    AccountNotFound { name: String },

    /// The balance column held something that is not a number
    #[error("invalid balance value '{value}'")]
    InvalidBalance { value: String },

    /// A row lock held by another transaction would block this statement
    #[error("Lock wait timeout exceeded; row '{name}' is locked by {holder}")]
    LockWait { name: String, holder: String },

    /// A statement was issued on a session that was already closed
    #[error("session {label} is closed")]
    SessionClosed { label: String },

    /// Internal failure of the in-memory store
    #[error("store error: {reason}")]
    Store { reason: String },
}

/// Result type alias for isoctl-core operations
pub type Result<T> = std::result::Result<T, DemoError>;

impl DemoError {
    /// Create a connect error
    pub fn connect(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connect {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Create an account-not-found error
    pub fn account_not_found(name: impl Into<String>) -> Self {
        Self::AccountNotFound { name: name.into() }
    }

    /// Create an invalid balance error
    pub fn invalid_balance(value: impl Into<String>) -> Self {
        Self::InvalidBalance {
            value: value.into(),
        }
    }

    /// Create a lock wait error
    pub fn lock_wait(name: impl Into<String>, holder: impl Into<String>) -> Self {
        Self::LockWait {
            name: name.into(),
            holder: holder.into(),
        }
    }

    /// Create a session closed error
    pub fn session_closed(label: impl Into<String>) -> Self {
        Self::SessionClosed {
            label: label.into(),
        }
    }

    /// Create a store error
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DemoError::account_not_found("Alice");
        assert_eq!(err.to_string(), "account 'Alice' not found");

        let err = DemoError::connect("session1", "Access denied for user 'bob'");
        assert_eq!(err.to_string(), "session1: Access denied for user 'bob'");
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: DemoError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DemoError::Database { .. }));
    }
}
