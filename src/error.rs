//! Error types for chunk-uploader
//!
//! This module provides the error taxonomy of the library:
//! - [`Error::Config`]: missing or invalid options, reported before any transfer starts
//! - [`TransferError`]: a file's transfer failed after the engine gave up on it
//! - [`ProtocolError`]: a command was issued in a state that doesn't allow it
//!
//! Per-file failures are additionally surfaced as
//! [`Event::UploadError`](crate::types::Event::UploadError); they never abort sibling uploads.

use thiserror::Error;

use crate::types::{ErrorKind, UploadId};

/// Result type alias for chunk-uploader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chunk-uploader
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "endpoint")
        key: Option<String>,
    },

    /// Transfer of a single file failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Command issued in a state that doesn't support it
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Upload not found in the queue, the active set or the batch history
    #[error("upload not found: {0}")]
    NotFound(UploadId),

    /// No transfer engine registered under the requested name
    #[error("unknown transfer engine: {0}")]
    UnknownEngine(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Classify this error for [`Event::UploadError`](crate::types::Event::UploadError)
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } | Error::UnknownEngine(_) => ErrorKind::Configuration,
            Error::Protocol(_) | Error::NotFound(_) => ErrorKind::Protocol,
            Error::Transfer(_) | Error::Io(_) | Error::Network(_) => ErrorKind::Transfer,
        }
    }
}

/// Errors raised while transferring one file
#[derive(Debug, Error)]
pub enum TransferError {
    /// Server answered a chunk with a status that is neither success nor retryable
    #[error("server responded with {status} to chunk {chunk}, stopping upload")]
    UnexpectedStatus {
        /// Zero-based chunk number
        chunk: u64,
        /// HTTP status code
        status: u16,
    },

    /// Chunk kept failing until the retry budget was exhausted
    #[error("chunk {chunk} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        /// Zero-based chunk number
        chunk: u64,
        /// Number of attempts made
        attempts: u32,
        /// Last failure message
        message: String,
    },

    /// Reading the chunk from the source failed
    #[error("failed to read chunk {chunk}: {message}")]
    Read {
        /// Zero-based chunk number
        chunk: u64,
        /// Underlying error message
        message: String,
    },

    /// The session's event stream closed before success or error was reported
    #[error("transfer session closed without reporting completion")]
    SessionClosed,
}

/// Commands issued in a state that doesn't allow them
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Pause/resume requested before any upload was started
    #[error("cannot {operation} before an upload has started")]
    NotStarted {
        /// The operation that was attempted (e.g., "pause")
        operation: String,
    },

    /// Cannot perform operation in the upload's current state
    #[error("cannot {operation} upload {id} in state {current_state}")]
    InvalidState {
        /// The upload the operation targeted
        id: UploadId,
        /// The operation that was attempted (e.g., "pause", "resume")
        operation: String,
        /// The current state that prevents the operation (e.g., "queued", "completed")
        current_state: String,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_carries_key_and_message() {
        let err = Error::config("no endpoint", "endpoint");

        assert_eq!(err.to_string(), "configuration error: no endpoint");
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("endpoint")),
            other => panic!("expected Config, got {:?}", other),
        }
    }

    #[test]
    fn kind_classifies_variants() {
        assert_eq!(
            Error::config("bad", "chunk_size").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::UnknownEngine("ftp".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::Transfer(TransferError::SessionClosed).kind(),
            ErrorKind::Transfer
        );
        assert_eq!(
            Error::Protocol(ProtocolError::NotStarted {
                operation: "pause".into()
            })
            .kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            Error::Io(std::io::Error::other("disk")).kind(),
            ErrorKind::Transfer
        );
    }

    #[test]
    fn transfer_error_messages_name_the_chunk() {
        let err = TransferError::UnexpectedStatus {
            chunk: 3,
            status: 403,
        };
        assert_eq!(
            err.to_string(),
            "server responded with 403 to chunk 3, stopping upload"
        );

        let err = TransferError::RetriesExhausted {
            chunk: 1,
            attempts: 5,
            message: "timeout".into(),
        };
        assert!(err.to_string().contains("after 5 attempts"));
    }

    #[test]
    fn invalid_state_message() {
        let err = ProtocolError::InvalidState {
            id: UploadId(7),
            operation: "pause".into(),
            current_state: "queued".into(),
        };
        assert_eq!(err.to_string(), "cannot pause upload 7 in state queued");
    }
}
