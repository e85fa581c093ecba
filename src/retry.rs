//! Chunk retry policy
//!
//! A chunk request that fails transiently (gateway errors, timeouts, refused
//! connections) is sent again after an exponentially growing delay. Jitter spreads
//! the retries of sessions that failed together.
//!
//! # Example
//!
//! ```no_run
//! use chunk_uploader::config::RetryConfig;
//! use chunk_uploader::retry::with_retry;
//! use chunk_uploader::{Error, TransferError};
//!
//! # async fn example(client: reqwest::Client, url: &str, body: Vec<u8>) -> chunk_uploader::Result<()> {
//! let status = with_retry(&RetryConfig::default(), || {
//!     let request = client
//!         .put(url)
//!         .header("Content-Range", "bytes 0-9/10")
//!         .body(body.clone());
//!     async move {
//!         let response = request.send().await?;
//!         match response.status().as_u16() {
//!             status @ (200 | 201) => Ok::<u16, Error>(status),
//!             status => Err(TransferError::UnexpectedStatus { chunk: 0, status }.into()),
//!         }
//!     }
//! })
//! .await?;
//! println!("chunk accepted with {status}");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{Error, TransferError};

/// HTTP statuses that indicate a transient server-side condition
pub const RETRYABLE_STATUSES: [u16; 4] = [408, 502, 503, 504];

/// Classifies errors as transient (worth another attempt) or permanent
pub trait IsRetryable {
    /// Returns true if sending the same request again may succeed
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            Error::Transfer(TransferError::UnexpectedStatus { status, .. }) => {
                RETRYABLE_STATUSES.contains(status)
            }
            _ => false,
        }
    }
}

/// Delay schedule for the retries of one chunk
#[derive(Clone, Debug)]
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    remaining: u32,
}

impl Backoff {
    /// Schedule allowing `config.max_attempts` retries
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            delay: config.initial_delay,
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            remaining: config.max_attempts,
        }
    }

    /// Delay before the next retry, or `None` once every retry is used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.delay;
        self.delay = scale(current, self.multiplier).min(self.max_delay);

        Some(if self.jitter { add_jitter(current) } else { current })
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
///
/// The first call is not a retry: with `max_attempts = 2` the operation runs at
/// most three times.
///
/// # Returns
///
/// The first successful result, or the error of the last call made.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);
    let mut attempt = 1u32;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            tracing::debug!(error = %err, attempt, "Request failed permanently");
            return Err(err);
        }

        let Some(delay) = backoff.next_delay() else {
            tracing::warn!(error = %err, attempts = attempt, "Retries exhausted");
            return Err(err);
        };

        tracing::warn!(
            error = %err,
            attempt,
            retry_in_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Stretch `delay` by a random factor in [1, 2]
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    scale(delay, factor)
}

fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::from_nanos((delay.as_nanos() as f64 * factor).round() as u64)
}
