// ABOUTME: Error type returned by every marketplace operation.
// ABOUTME: Separates caller rejections (input, access) from storage and infrastructure failures.

use bookstay_core::{IdError, SerializerError};
use bookstay_store::StorageError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    /// Bad or conflicting input. Raised before any mutation.
    #[error("{0}")]
    Input(String),

    /// The caller is not allowed to act on the record.
    #[error("{0}")]
    Access(String),

    /// The mutation was applied in memory but could not be made durable.
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Serializer(#[from] SerializerError),

    #[error(transparent)]
    Ids(#[from] IdError),
}

impl MarketError {
    pub fn input(message: impl Into<String>) -> Self {
        MarketError::Input(message.into())
    }

    pub fn access(message: impl Into<String>) -> Self {
        MarketError::Access(message.into())
    }

    /// True for errors caused by the caller's request rather than the system.
    pub fn is_rejection(&self) -> bool {
        matches!(self, MarketError::Input(_) | MarketError::Access(_))
    }
}
