//! Chunked-transfer engine contract
//!
//! A [`TransferEngine`] turns one file plus its options into a [`TransferSession`]:
//! an object that splits the file into chunks, sends them, retries failed chunks and
//! reports what happens through [`SessionEvent`]s. The uploader treats sessions as
//! opaque; it only subscribes to their events and forwards pause/resume/abort.
//!
//! - [`chunk`] - chunk sizing rules and chunk readers
//! - [`http`] - reqwest-backed engine sending one `PUT` per chunk
//! - [`registry`] - process-wide name → engine factory map

pub mod chunk;
pub mod http;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::{UploadConfig, validate_chunk_size, validate_endpoint};
use crate::error::{Error, Result};
use crate::types::UploadFile;

pub use http::HttpTransferEngine;
pub use registry::{EngineFactory, create_engine, register_default_engines, register_engine};

/// Buffer size of a session's event channel
pub const SESSION_EVENT_CAPACITY: usize = 256;

/// Event emitted by a transfer session
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A chunk request is about to be sent
    Attempt {
        /// Zero-based chunk number
        chunk_number: u64,
        /// Size of this chunk in bytes
        chunk_size: u64,
    },
    /// The server accepted a chunk
    ChunkSuccess {
        /// Zero-based chunk number
        chunk: u64,
        /// Size of this chunk in bytes
        chunk_size: u64,
        /// Attempts it took
        attempts: u32,
        /// Duration of the successful request
        time_interval: Duration,
        /// Response body, if the server sent one
        response: Option<String>,
    },
    /// Overall progress in percent
    Progress(f64),
    /// Every chunk was accepted
    Success,
    /// The transfer failed permanently
    Error {
        /// Error message
        message: String,
        /// Chunk that failed, if the failure happened mid-transfer
        chunk: Option<u64>,
        /// Attempts made on that chunk
        attempts: Option<u32>,
    },
    /// Connectivity lost
    Offline,
    /// Connectivity regained
    Online,
}

impl SessionEvent {
    /// Whether this event ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Success | SessionEvent::Error { .. })
    }
}

/// Everything an engine needs to create a session for one file
#[derive(Clone, Debug)]
pub struct UploadOptions {
    /// Endpoint URL chunks are sent to
    pub endpoint: String,
    /// The file to upload
    pub file: UploadFile,
    /// Initial chunk size in bytes (None = [`chunk::DEFAULT_CHUNK_SIZE`])
    pub chunk_size: Option<u64>,
    /// Adapt the chunk size to observed request durations
    pub dynamic_chunk_size: bool,
    /// Largest accepted file in bytes
    pub max_file_size: Option<u64>,
    /// Read each chunk by reopening and seeking into the source
    pub use_large_file_workaround: bool,
}

impl UploadOptions {
    /// Options with engine defaults for everything but the endpoint and file
    pub fn new(endpoint: impl Into<String>, file: UploadFile) -> Self {
        Self {
            endpoint: endpoint.into(),
            file,
            chunk_size: None,
            dynamic_chunk_size: false,
            max_file_size: None,
            use_large_file_workaround: false,
        }
    }

    /// Options for `file` taken from the batch configuration
    pub fn from_config(endpoint: impl Into<String>, file: UploadFile, upload: &UploadConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            file,
            chunk_size: upload.chunk_size,
            dynamic_chunk_size: upload.dynamic_chunk_size,
            max_file_size: upload.max_file_size,
            use_large_file_workaround: upload.use_large_file_workaround,
        }
    }

    /// Chunk size the first chunk is sent with
    pub fn initial_chunk_size(&self) -> u64 {
        self.chunk_size.unwrap_or(chunk::DEFAULT_CHUNK_SIZE)
    }

    /// Reject options no transfer could succeed with
    ///
    /// Engines call this from [`TransferEngine::create_upload`] so configuration
    /// problems surface before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        validate_endpoint(&self.endpoint)?;
        if let Some(chunk_size) = self.chunk_size {
            validate_chunk_size(chunk_size)?;
        }
        match self.max_file_size {
            Some(0) => Err(Error::config(
                "max_file_size must be a positive number of bytes",
                "max_file_size",
            )),
            Some(max) if self.file.size > max => Err(Error::config(
                format!(
                    "file '{}' is {} bytes, which exceeds the maximum of {} bytes",
                    self.file.name, self.file.size, max
                ),
                "max_file_size",
            )),
            _ => Ok(()),
        }
    }
}

/// Factory for transfer sessions
pub trait TransferEngine: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Create an idle session for one file
    ///
    /// # Errors
    ///
    /// Returns a configuration error synchronously, before any I/O, when the options
    /// are unusable (missing endpoint, invalid chunk size, file too large).
    fn create_upload(&self, options: UploadOptions) -> Result<Arc<dyn TransferSession>>;
}

/// One file's chunked transfer
///
/// Sessions are created idle. Subscribers attached before [`start`](Self::start)
/// observe every event; dropping a receiver unsubscribes it. Within a session events
/// arrive as `Attempt → ChunkSuccess*` per chunk with `Progress` interleaved, and end
/// with exactly one `Success` or `Error`.
pub trait TransferSession: Send + Sync {
    /// Subscribe to this session's events
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Begin transferring (no-op if already started)
    fn start(&self);

    /// Stop sending further chunks until resumed
    fn pause(&self);

    /// Continue after a pause
    fn resume(&self);

    /// Whether the session is currently paused
    fn paused(&self) -> bool;

    /// Whether the session currently considers itself offline
    fn offline(&self) -> bool;

    /// Chunk size the next chunk will be sent with
    fn chunk_size(&self) -> u64;

    /// Stop the transfer; no further events are delivered
    fn abort(&self);
}
