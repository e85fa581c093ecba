//! Test fixtures: on-disk files and uploader configurations

use std::path::PathBuf;
use std::time::Duration;

use chunk_uploader::{Config, RetryConfig};
use tempfile::TempDir;

/// Write `contents` to `dir/name` and return the path
pub fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap_or_else(|e| panic!("failed to write {name}: {e}"));
    path
}

/// Multi-file configuration pointing at `endpoint`, with fast retries
pub fn batch_config(endpoint: &str, max_concurrent_uploads: usize) -> Config {
    let mut config = Config::default();
    config.upload.endpoint = Some(endpoint.to_string());
    config.queue.multiple = true;
    config.queue.max_concurrent_uploads = max_concurrent_uploads;
    config.transfer.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.transfer.chunk_timeout = Duration::from_secs(5);
    config
}
