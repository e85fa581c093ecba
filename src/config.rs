//! Configuration types for chunk-uploader

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::chunk::{CHUNK_SIZE_GRANULARITY, MAX_CHUNK_SIZE};
use crate::error::{Error, Result};

/// Per-file transfer options shared by every file of a batch
///
/// Groups the settings handed to the transfer engine when a session is created.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload endpoint URL (required before the first upload starts)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Chunk size in bytes (None = engine default of 30 MiB)
    ///
    /// Must be a positive multiple of 256 KiB.
    #[serde(default)]
    pub chunk_size: Option<u64>,

    /// Let the engine grow or shrink the chunk size based on observed chunk timings
    #[serde(default)]
    pub dynamic_chunk_size: bool,

    /// Largest accepted file in bytes (None = unlimited)
    ///
    /// Exceeding it is a configuration error, reported before any request is made.
    #[serde(default)]
    pub max_file_size: Option<u64>,

    /// Read every chunk by reopening and seeking into the source instead of
    /// streaming through one long-lived handle
    #[serde(default)]
    pub use_large_file_workaround: bool,
}

/// Queue behavior configuration (mode, concurrency ceiling)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Multi-file mode: FIFO queue with a concurrency ceiling (default: false)
    ///
    /// When false every enqueue starts exactly one upload immediately.
    #[serde(default)]
    pub multiple: bool,

    /// Maximum simultaneously active uploads in multi-file mode (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_uploads: usize,

    /// Event broadcast buffer per subscriber (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            multiple: false,
            max_concurrent_uploads: default_max_concurrent(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Transfer engine selection and network behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Name of the registered transfer engine to use (default: "http")
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Retry behavior for individual chunk requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Timeout for a single chunk request (default: 120 seconds)
    #[serde(default = "default_chunk_timeout", with = "duration_serde")]
    pub chunk_timeout: Duration,

    /// Content-Type sent with chunks when the file doesn't carry one
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            retry: RetryConfig::default(),
            chunk_timeout: default_chunk_timeout(),
            content_type: default_content_type(),
        }
    }
}

/// Main configuration for [`Uploader`](crate::Uploader)
///
/// Fields are organized into logical sub-configs:
/// - [`upload`](UploadConfig): endpoint and per-file transfer options
/// - [`queue`](QueueConfig): multi-file mode and concurrency ceiling
/// - [`transfer`](TransferConfig): engine selection, retry, timeouts
///
/// `upload` and `queue` are flattened, so a JSON/TOML document reads
/// `{"endpoint": "...", "multiple": true, "max_concurrent_uploads": 2}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint and per-file transfer options
    #[serde(flatten)]
    pub upload: UploadConfig,

    /// Queue mode and concurrency ceiling
    #[serde(flatten)]
    pub queue: QueueConfig,

    /// Engine selection and network behavior
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl Config {
    /// Check numeric options and the endpoint format
    ///
    /// A missing endpoint is accepted here: it is reported per file when an upload
    /// would start, so a shell may set it after constructing the uploader.
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_concurrent_uploads == 0 {
            return Err(Error::config(
                "max_concurrent_uploads must be at least 1",
                "max_concurrent_uploads",
            ));
        }
        if self.queue.event_capacity == 0 {
            return Err(Error::config(
                "event_capacity must be at least 1",
                "event_capacity",
            ));
        }
        validate_upload_options(&self.upload)
    }

    /// Whether multi-file mode is enabled
    pub fn multiple(&self) -> bool {
        self.queue.multiple
    }

    /// Concurrency ceiling for multi-file mode
    pub fn max_concurrent_uploads(&self) -> usize {
        self.queue.max_concurrent_uploads
    }
}

/// Validate the per-file options shared by [`Config`] and engine session creation
pub(crate) fn validate_upload_options(upload: &UploadConfig) -> Result<()> {
    if let Some(endpoint) = upload.endpoint.as_deref() {
        validate_endpoint(endpoint)?;
    }
    if let Some(chunk_size) = upload.chunk_size {
        validate_chunk_size(chunk_size)?;
    }
    if upload.max_file_size == Some(0) {
        return Err(Error::config(
            "max_file_size must be a positive number of bytes",
            "max_file_size",
        ));
    }
    Ok(())
}

pub(crate) fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.trim().is_empty() {
        return Err(Error::config(
            "no url or endpoint specified, cannot start upload",
            "endpoint",
        ));
    }
    url::Url::parse(endpoint).map_err(|e| {
        Error::config(format!("invalid endpoint '{}': {}", endpoint, e), "endpoint")
    })?;
    Ok(())
}

pub(crate) fn validate_chunk_size(chunk_size: u64) -> Result<()> {
    if chunk_size == 0 || chunk_size % CHUNK_SIZE_GRANULARITY != 0 {
        return Err(Error::config(
            format!(
                "chunk_size must be a positive multiple of {} bytes, got {}",
                CHUNK_SIZE_GRANULARITY, chunk_size
            ),
            "chunk_size",
        ));
    }
    if chunk_size > MAX_CHUNK_SIZE {
        return Err(Error::config(
            format!(
                "chunk_size must not exceed {} bytes, got {}",
                MAX_CHUNK_SIZE, chunk_size
            ),
            "chunk_size",
        ));
    }
    Ok(())
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Configuration update for runtime-changeable settings
///
/// Only fields that can be changed while uploads are running are included. Updates
/// apply to sessions admitted after the call; sessions already running keep the
/// options they were created with. The queue mode (`multiple`) is fixed for the
/// lifetime of an [`Uploader`](crate::Uploader).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// New endpoint (Some(None) clears it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Option<String>>,

    /// New chunk size (Some(None) restores the engine default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<Option<u64>>,

    /// Toggle dynamic chunk sizing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_chunk_size: Option<bool>,

    /// New maximum file size (Some(None) removes the limit)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<Option<u64>>,

    /// Toggle the large-file read workaround
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_large_file_workaround: Option<bool>,

    /// New concurrency ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_uploads: Option<usize>,
}

impl ConfigUpdate {
    /// Produce a new configuration with this update applied, validating the result
    pub fn apply_to(&self, config: &Config) -> Result<Config> {
        let mut updated = config.clone();
        if let Some(endpoint) = &self.endpoint {
            updated.upload.endpoint = endpoint.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            updated.upload.chunk_size = chunk_size;
        }
        if let Some(dynamic) = self.dynamic_chunk_size {
            updated.upload.dynamic_chunk_size = dynamic;
        }
        if let Some(max_file_size) = self.max_file_size {
            updated.upload.max_file_size = max_file_size;
        }
        if let Some(workaround) = self.use_large_file_workaround {
            updated.upload.use_large_file_workaround = workaround;
        }
        if let Some(ceiling) = self.max_concurrent_uploads {
            updated.queue.max_concurrent_uploads = ceiling;
        }
        updated.validate()?;
        Ok(updated)
    }
}

fn default_max_concurrent() -> usize {
    3
}

fn default_event_capacity() -> usize {
    1000
}

fn default_engine() -> String {
    crate::engine::http::ENGINE_NAME.to_string()
}

fn default_chunk_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Durations as seconds: whole values serialize as integers, sub-second ones as
/// fractional seconds (`0.01` is 10 ms)
mod duration_serde {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(duration.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(D::Error::custom(format!(
                "duration must be a non-negative number of seconds, got {secs}"
            )));
        }
        // Round to whole nanoseconds so values like 0.01 come back exact
        Ok(Duration::from_nanos((secs * 1e9).round() as u64))
    }
}
