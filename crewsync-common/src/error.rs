//! Common error types for crewsync

use thiserror::Error;

/// Common result type for crewsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the identity and session core
#[derive(Error, Debug)]
pub enum Error {
    /// Database error outside a managed transaction (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced contractor or session is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Self-merge, malformed id or selector
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Store failure inside a merge, rotation or bulk assignment.
    /// Every staged write was rolled back.
    #[error("Transaction aborted during {operation}: {source}")]
    TransactionAborted {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// Row decoding or other internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a store failure that happened while a transaction was open
    pub fn aborted(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Error::TransactionAborted {
            operation: operation.into(),
            source,
        }
    }

    /// True for failures that left the store untouched and may be retried
    /// once the caller has re-validated its preconditions
    pub fn is_transaction_aborted(&self) -> bool {
        matches!(self, Error::TransactionAborted { .. })
    }
}

/// Map store failures inside a managed transaction to `TransactionAborted`.
/// Other variants pass through unchanged.
pub fn in_transaction(operation: &'static str) -> impl Fn(Error) -> Error {
    move |err| match err {
        Error::Database(e) => Error::aborted(operation, e),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_keeps_operation_name() {
        let err = Error::aborted("merge", sqlx::Error::RowNotFound);
        assert!(err.is_transaction_aborted());
        assert!(err.to_string().contains("merge"));
    }

    #[test]
    fn test_database_error_is_not_aborted() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(!err.is_transaction_aborted());
    }

    #[test]
    fn test_in_transaction_maps_only_store_errors() {
        let mapped = in_transaction("rotate")(Error::Database(sqlx::Error::PoolTimedOut));
        assert!(mapped.is_transaction_aborted());
        assert!(mapped.to_string().contains("rotate"));

        let passed = in_transaction("rotate")(Error::NotFound("session".into()));
        assert!(matches!(passed, Error::NotFound(_)));
    }
}
