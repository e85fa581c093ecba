//! # chunk-uploader
//!
//! Coordinator for chunked, resumable uploads of one or many files to an HTTP
//! endpoint.
//!
//! ## Design Philosophy
//!
//! chunk-uploader is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Engine-agnostic** - Chunk transfer sits behind the [`TransferEngine`] trait;
//!   an HTTP engine is registered out of the box
//! - **Bounded** - Multi-file batches never run more than `max_concurrent_uploads`
//!   transfers at once
//!
//! ## Quick Start
//!
//! ```no_run
//! use chunk_uploader::{Config, Event, UploadFile, Uploader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.upload.endpoint = Some("https://upload.example.com/videos/abc123".to_string());
//!     config.queue.multiple = true;
//!     config.queue.max_concurrent_uploads = 2;
//!
//!     let uploader = Uploader::new(config)?;
//!
//!     // Subscribe before enqueueing so no event is missed
//!     let mut events = uploader.subscribe();
//!
//!     uploader
//!         .enqueue(vec![
//!             UploadFile::from_path("intro.mp4").await?,
//!             UploadFile::from_path("talk.mp4").await?,
//!         ])
//!         .await;
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!         if matches!(event, Event::QueueComplete) {
//!             break;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Chunked transfer engines and the engine registry
pub mod engine;
/// Error types
pub mod error;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Upload coordinator (decomposed into focused submodules)
pub mod uploader;

// Re-export commonly used types
pub use config::{Config, ConfigUpdate, QueueConfig, RetryConfig, TransferConfig, UploadConfig};
pub use engine::{
    EngineFactory, HttpTransferEngine, SessionEvent, TransferEngine, TransferSession,
    UploadOptions, create_engine, register_default_engines, register_engine,
};
pub use error::{Error, ProtocolError, Result, TransferError};
pub use types::{
    BatchStatus, ErrorKind, Event, FileInfo, FileSource, QueueStats, UploadFile, UploadId,
    UploadInfo, UploadStatus,
};
pub use uploader::Uploader;
