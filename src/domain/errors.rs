//! Store-facing error taxonomy (spec §4.A, §7).

use thiserror::Error;

/// Errors raised by the Store. `Busy` is retried internally with bounded
/// backoff before ever reaching a caller; `Fatal` triggers graceful shutdown.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("store busy")]
    Busy,

    #[error("fatal store error: {0}")]
    Fatal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.message().contains("database is locked") => {
                StoreError::Busy
            }
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Integrity(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Integrity(err.to_string())
    }
}
