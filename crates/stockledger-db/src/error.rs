//! # Database Error Types
//!
//! Error types for storage operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Rule violation (CoreError)        │
//! │       │                                      │                          │
//! │       ▼                                      ▼                          │
//! │  DbError::{NotFound, DuplicateKey,    DbError::Domain(CoreError)       │
//! │            Contention, ...}                  │                          │
//! │       │                                      │                          │
//! │       └──────────────────┬───────────────────┘                          │
//! │                          ▼                                              │
//! │  Caller decides: show message, retry (is_retryable), or give up        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stockledger_core::{CoreError, ValidationError};
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second product with the same SKU in a tenant
    /// - Second category with the same name in a tenant
    #[error("Duplicate {field}: '{value}' already exists")]
    DuplicateKey { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The row lock could not be obtained within the configured lock wait.
    ///
    /// ## When This Occurs
    /// - Another transaction held the SQLite write lock for longer than
    ///   `busy_timeout`
    ///
    /// Nothing was written; the caller may retry.
    #[error("Database busy: {0}")]
    Contention(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),

    /// A stock, deposit, policy or tenancy rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a DuplicateKey error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::DuplicateKey {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether running the same operation again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Contention(_) | DbError::PoolExhausted)
    }

    /// The domain error behind this one, if any.
    pub fn domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(e) => Some(e),
            _ => None,
        }
    }

    /// Replaces an unnamed duplicate with the offending field and value.
    ///
    /// SQLite reports which column collided but not the value.
    pub(crate) fn with_duplicate_value(self, field: &str, value: &str) -> Self {
        match self {
            DbError::DuplicateKey { field: f, .. } if f.ends_with(field) => {
                DbError::duplicate(field, value)
            }
            other => other,
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// SQLite primary result codes that mean "someone else holds the lock".
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

fn is_lock_error(code: Option<&str>, message: &str) -> bool {
    let primary = code
        .and_then(|c| c.parse::<i64>().ok())
        .map(|c| c & 0xff);

    matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
        || message.contains("database is locked")
        || message.contains("database table is locked")
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound        → DbError::NotFound
/// sqlx::Error::Database
///   SQLITE_BUSY / SQLITE_LOCKED   → DbError::Contention
///   UNIQUE constraint failed      → DbError::DuplicateKey
///   FOREIGN KEY constraint failed → DbError::ForeignKeyViolation
///   anything else                 → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut       → DbError::PoolExhausted
/// Other                           → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if is_lock_error(code.as_deref(), msg) {
                    DbError::Contention(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: products.tenant_id, products.sku"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .and_then(|cols| cols.split(", ").last())
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::DuplicateKey {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_error_detection() {
        assert!(is_lock_error(Some("5"), "database is locked"));
        assert!(is_lock_error(Some("517"), "busy snapshot"));
        assert!(is_lock_error(Some("6"), "table locked"));
        assert!(is_lock_error(None, "database is locked"));
        assert!(!is_lock_error(Some("2067"), "UNIQUE constraint failed: products.sku"));
        assert!(!is_lock_error(Some("19"), "CHECK constraint failed: quantity >= 0"));
    }

    #[test]
    fn test_retryable() {
        assert!(DbError::Contention("busy".into()).is_retryable());
        assert!(DbError::PoolExhausted.is_retryable());
        assert!(!DbError::not_found("Product", "p-1").is_retryable());
        assert!(!DbError::from(CoreError::EmptySale).is_retryable());
    }

    #[test]
    fn test_duplicate_value_filled_in() {
        let err = DbError::duplicate("products.sku", "unknown").with_duplicate_value("sku", "LAGER");
        assert_eq!(err.to_string(), "Duplicate sku: 'LAGER' already exists");

        let untouched = DbError::PoolExhausted.with_duplicate_value("sku", "LAGER");
        assert!(matches!(untouched, DbError::PoolExhausted));
    }

    #[test]
    fn test_domain_errors_pass_through() {
        let err: DbError = CoreError::ProductNotFound("p-1".into()).into();
        assert_eq!(err.to_string(), "Product not found: p-1");
        assert!(err.domain().is_some());
    }
}
