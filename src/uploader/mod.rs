//! Upload coordinator split into focused submodules.
//!
//! The `Uploader` struct and its methods are organized by domain:
//! - [`registry`] - Pending queue, active set and batch history
//! - [`scheduler`] - FIFO admission under the concurrency ceiling
//! - [`session`] - Per-file transfer session adapter
//! - [`aggregate`] - Derived whole-batch state
//! - [`notifier`] - Event emission
//! - [`control`] - Enqueue, pause/resume, reset and status queries
//! - [`config_ops`] - Runtime configuration updates

mod aggregate;
mod config_ops;
mod control;
mod notifier;
mod registry;
mod scheduler;
mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::{self, TransferEngine};
use crate::error::Result;
use crate::types::{Event, UploadId};

use aggregate::AggregateStateTracker;
use notifier::EventNotifier;
use registry::UploadTaskRegistry;

/// Mutable coordinator state, guarded by one mutex
pub(crate) struct BatchState {
    /// Options applied to sessions admitted from now on
    pub(crate) config: Arc<Config>,
    pub(crate) registry: UploadTaskRegistry,
    pub(crate) tracker: AggregateStateTracker,
    /// Batch-wide pause suspends admission of queued files
    pub(crate) admission_paused: bool,
    /// Most recently started upload (single-file mode)
    pub(crate) current: Option<UploadId>,
    /// Cancelled on reset so forwarders of the old generation stop
    pub(crate) generation: CancellationToken,
}

/// Main uploader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Uploader {
    /// Event broadcast (multiple subscribers supported)
    pub(crate) notifier: EventNotifier,
    /// Creates one transfer session per admitted file
    pub(crate) engine: Arc<dyn TransferEngine>,
    /// Queue, active set and derived state
    pub(crate) state: Arc<tokio::sync::Mutex<BatchState>>,
}

impl Uploader {
    /// Create an uploader using the transfer engine named in `config.transfer.engine`
    ///
    /// The built-in engines are registered on first use, so the default `"http"`
    /// engine is always available.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is invalid
    /// and [`Error::UnknownEngine`](crate::Error::UnknownEngine) if no engine is
    /// registered under the configured name.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chunk_uploader::{Config, Uploader};
    ///
    /// # fn example() -> chunk_uploader::Result<()> {
    /// let mut config = Config::default();
    /// config.upload.endpoint = Some("https://storage.example.com/upload/abc".into());
    /// config.queue.multiple = true;
    ///
    /// let uploader = Uploader::new(config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        engine::register_default_engines();
        let engine = engine::create_engine(&config.transfer.engine, &config.transfer)?;
        Self::with_engine(config, engine)
    }

    /// Create an uploader driving sessions of the given engine
    pub fn with_engine(config: Config, engine: Arc<dyn TransferEngine>) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            engine = engine.name(),
            multiple = config.multiple(),
            max_concurrent_uploads = config.max_concurrent_uploads(),
            "Uploader initialized"
        );

        let notifier = EventNotifier::new(config.queue.event_capacity);
        let state = BatchState {
            config: Arc::new(config),
            registry: UploadTaskRegistry::new(),
            tracker: AggregateStateTracker::new(),
            admission_paused: false,
            current: None,
            generation: CancellationToken::new(),
        };

        Ok(Self {
            notifier,
            engine,
            state: Arc::new(tokio::sync::Mutex::new(state)),
        })
    }

    /// Subscribe to upload events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but a subscriber that falls behind by more than
    /// `event_capacity` events receives a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chunk_uploader::{Event, Uploader};
    ///
    /// # async fn example(uploader: Uploader) {
    /// let mut events = uploader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         if let Event::Progress { file, percent } = event {
    ///             println!("{}: {:.1}%", file.name, percent);
    ///         }
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.notifier.subscribe()
    }
}
