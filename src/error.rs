//! Protocol error types
//!
//! Defines every error the client-side protocol core can raise. Validation
//! and contiguity failures happen before anything touches the network and are
//! recoverable. Transport failures carry the address of the remote end.

use thiserror::Error;

/// Errors raised by the telemetry protocol core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input: wrong type or rank, bad span, undecodable frame
    #[error("Validation error: {0}")]
    Validation(String),

    /// Ordering, gap or overlap violation between consecutive segments
    #[error("Contiguity error: {0}")]
    Contiguity(String),

    /// Protocol sequence violation (command before open, missing high water mark, ...)
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// The remote end could not be reached
    #[error("Unreachable: {address}: {message}")]
    Unreachable { address: String, message: String },

    /// The stream failed or was closed mid-session
    #[error("Stream error: {address}: {message}")]
    Stream { address: String, message: String },

    /// The remote service rejected a command
    #[error("Remote error: {0}")]
    Remote(String),

    /// Message encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Shorthand for a contiguity error
    pub fn contiguity(message: impl Into<String>) -> Self {
        Error::Contiguity(message.into())
    }

    /// Shorthand for an unexpected (protocol sequence) error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Error::Unexpected(message.into())
    }

    /// Whether the caller may retry with corrected input on the same session
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Contiguity(_))
    }

    /// Whether the error came from the transport rather than from the caller
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Unreachable { .. } | Error::Stream { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;
