//! Core types for chunk-uploader

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Unique identifier for an upload
///
/// Allocated from a monotonic counter owned by the uploader, so two files with the
/// same name and size selected at the same instant still get distinct identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub u64);

impl UploadId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for UploadId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<UploadId> for u64 {
    fn from(id: UploadId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UploadId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Upload status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Waiting in the queue for a free slot
    Queued,
    /// Session running
    Active,
    /// Session running but paused
    Paused,
    /// Failed permanently
    Errored,
    /// Uploaded successfully
    Completed,
}

impl UploadStatus {
    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Errored | UploadStatus::Completed)
    }

    /// Lowercase name used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Queued => "queued",
            UploadStatus::Active => "active",
            UploadStatus::Paused => "paused",
            UploadStatus::Errored => "errored",
            UploadStatus::Completed => "completed",
        }
    }
}

/// Whole-batch status derived from the queue and the active set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Nothing has been started in the current batch
    #[default]
    Idle,
    /// Uploads are active or waiting for a slot
    Uploading,
    /// Every active upload is paused, or admission is suspended with nothing active
    AllPaused,
    /// Every upload of the batch reached a terminal status and none errored
    Complete,
    /// Every upload of the batch reached a terminal status and at least one errored
    Error,
}

/// Where the bytes of an [`UploadFile`] come from
#[derive(Clone, Debug)]
pub enum FileSource {
    /// A file on disk
    Path(PathBuf),
    /// An in-memory buffer
    Memory(Arc<Vec<u8>>),
}

/// Binary payload handle for one file to upload
#[derive(Clone, Debug)]
pub struct UploadFile {
    /// File name shown to observers
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type sent with every chunk (None = configured default)
    pub content_type: Option<String>,
    /// Byte source
    pub source: FileSource,
}

impl UploadFile {
    /// Describe a file on disk, reading its size from the filesystem
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata can't be read or the path is not a regular file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{}' is not a regular file", path.display()),
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            size: metadata.len(),
            content_type: None,
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            content_type: None,
            source: FileSource::Memory(Arc::new(data)),
        }
    }

    /// Set the MIME type sent with every chunk
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Identity tag attached to every per-file event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Upload ID
    pub id: UploadId,
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// Category of a reported upload error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid option; no transfer was attempted
    Configuration,
    /// The transfer engine gave up on the file
    Transfer,
    /// A command was issued in a state that doesn't allow it
    Protocol,
}

/// Event emitted during the upload lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Multi-file batch accepted, before any admission
    QueueStarted {
        /// Every file of the batch, in enqueue order
        files: Vec<FileInfo>,
    },

    /// Transfer session created and started for a file
    UploadStart {
        /// Originating file
        file: FileInfo,
        /// Initial chunk size in bytes
        chunk_size: u64,
    },

    /// A chunk request is about to be sent
    ChunkAttempt {
        /// Originating file
        file: FileInfo,
        /// Zero-based chunk number
        chunk_number: u64,
        /// Chunk size in bytes
        chunk_size: u64,
    },

    /// A chunk was accepted by the server
    ChunkSuccess {
        /// Originating file
        file: FileInfo,
        /// Zero-based chunk number
        chunk: u64,
        /// Chunk size in bytes
        chunk_size: u64,
        /// Attempts it took to send this chunk
        attempts: u32,
        /// Time the successful request took, in milliseconds
        time_interval_ms: u64,
        /// Response body returned by the server, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },

    /// Upload progress update
    Progress {
        /// Originating file
        file: FileInfo,
        /// Progress percentage (0.0 to 100.0)
        percent: f64,
    },

    /// File uploaded successfully
    Success {
        /// Originating file
        file: FileInfo,
    },

    /// File failed (configuration or transfer)
    UploadError {
        /// Originating file
        file: FileInfo,
        /// Error category
        kind: ErrorKind,
        /// Error message
        message: String,
        /// Chunk that failed, when the failure happened mid-transfer
        #[serde(skip_serializing_if = "Option::is_none")]
        chunk_number: Option<u64>,
        /// Attempts made on the failing chunk
        #[serde(skip_serializing_if = "Option::is_none")]
        attempts: Option<u32>,
    },

    /// Session lost connectivity
    Offline {
        /// Originating file
        file: FileInfo,
    },

    /// Session regained connectivity
    Online {
        /// Originating file
        file: FileInfo,
    },

    /// Batch-wide pause state changed
    PausedChanged {
        /// New pause state
        paused: bool,
    },

    /// Every file of the multi-file batch reached a terminal status
    QueueComplete,
}

impl Event {
    /// The file this event is about, if it's a per-file event
    pub fn file(&self) -> Option<&FileInfo> {
        match self {
            Event::UploadStart { file, .. }
            | Event::ChunkAttempt { file, .. }
            | Event::ChunkSuccess { file, .. }
            | Event::Progress { file, .. }
            | Event::Success { file }
            | Event::UploadError { file, .. }
            | Event::Offline { file }
            | Event::Online { file } => Some(file),
            Event::QueueStarted { .. } | Event::PausedChanged { .. } | Event::QueueComplete => {
                None
            }
        }
    }
}

/// Snapshot of one upload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadInfo {
    /// Unique upload identifier
    pub id: UploadId,

    /// File name
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Current status
    pub status: UploadStatus,

    /// Progress percentage (0.0 to 100.0)
    pub progress: f64,

    /// Chunk attempts observed so far (first tries and retries)
    pub attempts: u32,

    /// Chunks accepted by the server
    pub chunks_uploaded: u64,

    /// Error message (errored uploads only)
    pub error: Option<String>,

    /// When the file was handed to the uploader
    pub created_at: DateTime<Utc>,

    /// When its session started (None while queued or if it never started)
    pub started_at: Option<DateTime<Utc>>,

    /// When it reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

/// Queue statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueStats {
    /// Whole-batch status
    pub status: BatchStatus,

    /// Number of active sessions (paused ones included)
    pub active: usize,

    /// Number of active sessions that are paused
    pub paused: usize,

    /// Number of files waiting for a slot
    pub queued: usize,

    /// Number of files completed in this batch
    pub completed: usize,

    /// Number of files errored in this batch
    pub errored: usize,

    /// Whether admission of queued files is suspended by a batch-wide pause
    pub admission_paused: bool,
}
