//! Error types for catalog operations.

use std::io;
use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur while reading or writing the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The log contains a damaged record that is not at the tail.
    #[error("catalog corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Byte offset of the damaged record.
        offset: u64,
        /// What was wrong with it.
        message: String,
    },

    /// Another process holds the catalog lock.
    #[error("catalog is locked by another process: {0}")]
    Locked(String),

    /// The catalog path exists but is not a directory.
    #[error("catalog path is not a directory: {0}")]
    NotADirectory(String),
}

impl CatalogError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl ToString) -> Self {
        Self::Codec(message.to_string())
    }
}
