//! WAL error types.

use thiserror::Error;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode record: {0}")]
    Decode(#[source] bincode::Error),

    #[error("record {sequence} corrupted: CRC mismatch (expected {expected:#x}, got {actual:#x})")]
    CorruptRecord {
        sequence: u64,
        expected: u32,
        actual: u32,
    },

    #[error("segment rotation failed: {0}")]
    Rotation(#[source] std::io::Error),

    #[error("WAL is closed")]
    Closed,
}

impl WalError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalError::Io(_) | WalError::Rotation(_))
    }
}
