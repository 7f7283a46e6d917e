//! Storage error types

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Result alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for habitflow_domain::HabitflowError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
