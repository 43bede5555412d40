//! Store Error Types
//!
//! Failure modes of the Account Store and Ledger contracts, independent of
//! the backing implementation.

use thiserror::Error;

/// PostgreSQL SQLSTATE codes the store classifies
mod sqlstate {
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const QUERY_CANCELED: &str = "57014";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account not found")]
    NotFound,

    #[error("Insufficient funds")]
    InsufficientFunds,

    /// The resulting balance would not fit `NUMERIC(20, 2)`
    #[error("Balance would exceed the maximum")]
    BalanceOverflow,

    #[error("Account is blocked")]
    Blocked,

    #[error("Already exists: {0}")]
    Duplicate(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Lost a race against a concurrent writer (lock timeout, deadlock, serialization failure)
    #[error("Concurrent conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(sqlstate::LOCK_NOT_AVAILABLE)
                | Some(sqlstate::SERIALIZATION_FAILURE)
                | Some(sqlstate::DEADLOCK_DETECTED)
                | Some(sqlstate::QUERY_CANCELED) => StoreError::Conflict(db.message().to_string()),
                Some(sqlstate::UNIQUE_VIOLATION) => StoreError::Duplicate(db.message().to_string()),
                Some(sqlstate::FOREIGN_KEY_VIOLATION) => StoreError::NotFound,
                Some(sqlstate::CHECK_VIOLATION) => {
                    StoreError::InvalidRecord(db.message().to_string())
                }
                Some(sqlstate::NUMERIC_VALUE_OUT_OF_RANGE) => StoreError::BalanceOverflow,
                _ => StoreError::Unavailable(e.to_string()),
            },
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => StoreError::Corrupt(e.to_string()),
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::fmt;

    #[derive(Debug)]
    struct PgError(&'static str);

    impl fmt::Display for PgError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "SQLSTATE {}", self.0)
        }
    }

    impl std::error::Error for PgError {}

    impl sqlx::error::DatabaseError for PgError {
        fn message(&self) -> &str {
            "numeric field overflow"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn from_sqlstate(code: &'static str) -> StoreError {
        sqlx::Error::Database(Box::new(PgError(code))).into()
    }

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(from_sqlstate("22003"), StoreError::BalanceOverflow);
        assert!(matches!(from_sqlstate("55P03"), StoreError::Conflict(_)));
        assert!(matches!(from_sqlstate("40P01"), StoreError::Conflict(_)));
        assert!(matches!(from_sqlstate("23505"), StoreError::Duplicate(_)));
        assert_eq!(from_sqlstate("23503"), StoreError::NotFound);
        assert!(matches!(from_sqlstate("08006"), StoreError::Unavailable(_)));
    }

    #[test]
    fn test_sqlx_pool_errors_are_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert_eq!(err, StoreError::NotFound);
    }
}
