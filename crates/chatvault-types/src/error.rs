use thiserror::Error;

/// Errors from repository operations (used by trait definitions in chatvault-core).
///
/// An update or delete that matches no rows is not an error: those
/// operations report a row count and `0` means "not found".
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("transaction '{operation}' failed: {reason}")]
    TransactionFailure { operation: String, reason: String },

    #[error("resource busy: {0}")]
    ResourceBusy(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("query error: {0}")]
    Query(String),
}

impl RepositoryError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::ResourceBusy(_))
    }
}
