//! Storage error kinds, folded into `wealthfolio_core::CoreError::Storage`
//! at the repository boundary (the same `.map_err(StorageError::from)?`
//! then `From` convention the teacher's repositories use).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("failed to open database connection: {0}")]
    Connection(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("writer task panicked: {0}")]
    WriterPanicked(String),

    #[error("malformed stored value: {0}")]
    Malformed(String),
}

impl From<StorageError> for wealthfolio_core::CoreError {
    fn from(err: StorageError) -> Self {
        wealthfolio_core::CoreError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
