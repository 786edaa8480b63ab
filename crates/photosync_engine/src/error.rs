//! Error types for the sync engine.

use photosync_catalog::CatalogError;
use photosync_protocol::ProtocolError;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for local directory operations.
pub type LocalResult<T> = Result<T, LocalError>;

/// Result type for remote catalog operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The engine configuration is unusable. Raised before any I/O.
    #[error("configuration error: {0}")]
    Config(String),

    /// Another pass is already running on this engine.
    #[error("a sync pass is already running")]
    Busy,

    /// Local folder operation failed.
    #[error(transparent)]
    Local(#[from] LocalError),

    /// Remote catalog operation failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Catalog store failure.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Invalid input at the protocol level.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(e) => e.is_retryable(),
            SyncError::Busy => true,
            _ => false,
        }
    }

    /// Returns true if the engine cannot run at all until the cause is fixed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Config(_) | SyncError::Catalog(_))
    }
}

/// A failed operation on the local folder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} {path}: {message}")]
pub struct LocalError {
    /// What was being done (`read`, `write`, ...).
    pub operation: &'static str,
    /// Path involved.
    pub path: String,
    /// OS error message.
    pub message: String,
}

impl LocalError {
    /// Wraps an I/O error.
    pub fn io(operation: &'static str, path: &Path, err: &io::Error) -> Self {
        Self {
            operation,
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// A failed call to the remote catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote error{}: {detail}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct RemoteError {
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
    /// Response body or transport message.
    pub detail: String,
    retryable: bool,
}

impl RemoteError {
    /// The request never got an answer (connection refused, timeout, ...).
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            detail: detail.into(),
            retryable: true,
        }
    }

    /// The server answered with an error status.
    ///
    /// 5xx and 429 are retryable; other statuses are not.
    pub fn status(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            detail: detail.into(),
            retryable: status >= 500 || status == 429,
        }
    }

    /// The server answered with a body that could not be understood.
    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            detail: detail.into(),
            retryable: false,
        }
    }

    /// Returns true for 404 answers.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(RemoteError::transport("connection refused").is_retryable());
        assert!(RemoteError::status(503, "busy").is_retryable());
        assert!(RemoteError::status(429, "slow down").is_retryable());
        assert!(!RemoteError::status(400, "bad name").is_retryable());
        assert!(!RemoteError::invalid_response("not json").is_retryable());

        assert!(SyncError::from(RemoteError::status(500, "")).is_retryable());
        assert!(!SyncError::config("no folder").is_retryable());
        assert!(SyncError::config("no folder").is_fatal());
    }

    #[test]
    fn error_display() {
        let err = RemoteError::status(502, "bad gateway");
        assert_eq!(err.to_string(), "remote error (HTTP 502): bad gateway");

        let err = RemoteError::transport("timed out");
        assert_eq!(err.to_string(), "remote error: timed out");

        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = LocalError::io("write", Path::new("/photos/a.jpg"), &io);
        assert_eq!(err.to_string(), "write /photos/a.jpg: denied");
    }
}
