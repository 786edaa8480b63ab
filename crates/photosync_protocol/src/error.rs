//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while parsing or validating protocol values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Strategy name or code not recognized.
    #[error("unknown sync strategy: {0}")]
    UnknownStrategy(String),

    /// Direction name not recognized.
    #[error("unknown sync direction: {0}")]
    UnknownDirection(String),

    /// Logical name is not usable as a file name.
    #[error("invalid logical name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}
