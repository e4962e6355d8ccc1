//! Cache error types.

use crate::codec::CodecError;
use emberkv_wal::WalError;
use thiserror::Error;

/// Errors surfaced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("value codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Returns whether the failed operation can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            CacheError::Wal(e) => e.is_retryable(),
            CacheError::Io(_) => true,
            CacheError::Codec(_) => false,
        }
    }
}
