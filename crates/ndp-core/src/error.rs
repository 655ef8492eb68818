//! Error types for the neighbor cache
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::wire::WireError;

/// Result type alias for neighbor cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the neighbor cache
#[derive(Error, Debug)]
pub enum Error {
    /// No entry exists for the address (or none could be created)
    #[error("Neighbor not found: {0}")]
    NotFound(String),

    /// Address resolution has started but not completed yet
    #[error("Address resolution pending: {0}")]
    Pending(String),

    /// The entry is locked by a consumer, or every slot is locked or static
    #[error("Neighbor entry busy: {0}")]
    Busy(String),

    /// The request is not allowed for this address or state
    #[error("Operation not permitted: {0}")]
    NotPermitted(String),

    /// Inbound NDP message failed validation and was discarded
    #[error("Malformed NDP message: {0}")]
    Malformed(#[from] WireError),

    /// The link collaborator failed to transmit
    #[error("Link error: {0}")]
    Link(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (configuration file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a "resolution pending" error
    pub fn pending(msg: impl Into<String>) -> Self {
        Self::Pending(msg.into())
    }

    /// Create a busy error
    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    /// Create a "not permitted" error
    pub fn not_permitted(msg: impl Into<String>) -> Self {
        Self::NotPermitted(msg.into())
    }

    /// Create a link transmit error
    pub fn link(msg: impl Into<String>) -> Self {
        Self::Link(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error only reports that resolution is still in progress
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_errors_convert_into_malformed() {
        let err: Error = WireError::ZeroLengthOption { offset: 4 }.into();
        assert!(matches!(err, Error::Malformed(_)));
        assert!(err.to_string().starts_with("Malformed NDP message"));
    }

    #[test]
    fn pending_is_distinguishable() {
        assert!(Error::pending("fe80::1").is_pending());
        assert!(!Error::not_found("fe80::1").is_pending());
    }
}
