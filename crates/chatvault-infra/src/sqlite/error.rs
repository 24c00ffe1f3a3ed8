//! Mapping of sqlx errors onto `RepositoryError`.

use chatvault_types::error::RepositoryError;
use sqlx::error::ErrorKind;

/// SQLite result codes (primary and extended) meaning another connection
/// holds a conflicting lock.
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517", "773"];

/// Map a sqlx error onto the repository error taxonomy.
pub fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db) => {
            if db.code().is_some_and(|code| BUSY_CODES.contains(&code.as_ref())) {
                return RepositoryError::ResourceBusy(db.message().to_string());
            }
            match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    RepositoryError::ConstraintViolation(db.message().to_string())
                }
                _ => RepositoryError::Query(db.message().to_string()),
            }
        }
        sqlx::Error::PoolTimedOut => {
            RepositoryError::ResourceBusy("timed out waiting for a connection".to_string())
        }
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Configuration(_) => {
            RepositoryError::Connection(err.to_string())
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

/// Turn a failure inside a write transaction into the error surfaced to the
/// caller. Constraint, busy, cancellation and schema errors keep their kind;
/// every other fault becomes a `TransactionFailure` naming the operation.
pub fn transaction_failure(operation: &str, err: RepositoryError) -> RepositoryError {
    match err {
        RepositoryError::ConstraintViolation(_)
        | RepositoryError::ResourceBusy(_)
        | RepositoryError::Cancelled
        | RepositoryError::SchemaMismatch(_)
        | RepositoryError::TransactionFailure { .. } => err,
        other => RepositoryError::TransactionFailure {
            operation: operation.to_string(),
            reason: other.to_string(),
        },
    }
}
