//! reqwest-backed transfer engine
//!
//! Every chunk is sent as one `PUT` to the endpoint with a `Content-Range` header.
//! 200, 201, 202, 204 and 308 accept the chunk; 408, 502, 503 and 504 are retried
//! with exponential backoff; anything else stops the upload.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;

use super::chunk::{ChunkReader, content_range, next_chunk_size};
use super::{SESSION_EVENT_CAPACITY, SessionEvent, TransferEngine, TransferSession, UploadOptions};
use crate::config::{RetryConfig, TransferConfig};
use crate::error::{Error, Result, TransferError};
use crate::retry::{IsRetryable, with_retry};

/// Registry name of the HTTP engine
pub const ENGINE_NAME: &str = "http";

/// Statuses that mean the server accepted the chunk
const SUCCESS_STATUSES: [u16; 5] = [200, 201, 202, 204, 308];

/// Engine sending chunks over HTTP
#[derive(Clone)]
pub struct HttpTransferEngine {
    client: reqwest::Client,
    retry: RetryConfig,
    content_type: String,
}

impl HttpTransferEngine {
    /// Build an engine from the transfer settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client can't be constructed.
    pub fn new(transfer: &TransferConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(transfer.chunk_timeout)
            .build()?;

        Ok(Self {
            client,
            retry: transfer.retry.clone(),
            content_type: transfer.content_type.clone(),
        })
    }
}

impl TransferEngine for HttpTransferEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn create_upload(&self, options: UploadOptions) -> Result<Arc<dyn TransferSession>> {
        options.validate()?;

        tracing::debug!(
            file = %options.file.name,
            size = options.file.size,
            chunk_size = options.initial_chunk_size(),
            "Created HTTP upload session"
        );

        Ok(Arc::new(HttpSession::new(self.clone(), options)))
    }
}

/// State shared between a session handle and its transfer task
struct SessionShared {
    events: broadcast::Sender<SessionEvent>,
    paused: AtomicBool,
    offline: AtomicBool,
    resumed: Notify,
    cancel: CancellationToken,
    chunk_size: AtomicU64,
}

impl SessionShared {
    fn emit(&self, event: SessionEvent) {
        self.events.send(event).ok();
    }

    /// Record connectivity, emitting Offline/Online on transitions only
    fn set_offline(&self, offline: bool) {
        if self.offline.swap(offline, Ordering::SeqCst) != offline {
            self.emit(if offline {
                SessionEvent::Offline
            } else {
                SessionEvent::Online
            });
        }
    }

    async fn wait_while_paused(&self) {
        loop {
            let resumed = self.resumed.notified();
            tokio::pin!(resumed);
            // Register before checking the flag so a resume in between isn't lost
            resumed.as_mut().enable();
            if !self.paused.load(Ordering::SeqCst) {
                return;
            }
            resumed.await;
        }
    }
}

struct HttpSession {
    shared: Arc<SessionShared>,
    /// Engine and options, taken by the first `start`
    pending: Mutex<Option<(HttpTransferEngine, UploadOptions)>>,
}

impl HttpSession {
    fn new(engine: HttpTransferEngine, options: UploadOptions) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        let shared = Arc::new(SessionShared {
            events,
            paused: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            resumed: Notify::new(),
            cancel: CancellationToken::new(),
            chunk_size: AtomicU64::new(options.initial_chunk_size()),
        });

        Self {
            shared,
            pending: Mutex::new(Some((engine, options))),
        }
    }
}

impl TransferSession for HttpSession {
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    fn start(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some((engine, options)) = pending else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let cancel = shared.cancel.clone();
            let name = options.file.name.clone();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(file = %name, "Upload session aborted");
                }
                _ = run_transfer(&shared, &engine, &options) => {}
            }
        });
    }

    fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.resumed.notify_waiters();
    }

    fn paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    fn offline(&self) -> bool {
        self.shared.offline.load(Ordering::SeqCst)
    }

    fn chunk_size(&self) -> u64 {
        self.shared.chunk_size.load(Ordering::SeqCst)
    }

    fn abort(&self) {
        self.shared.cancel.cancel();
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

struct ChunkResponse {
    body: Option<String>,
    elapsed: Duration,
}

/// Send every chunk of the file, then report Success or Error
async fn run_transfer(shared: &SessionShared, engine: &HttpTransferEngine, options: &UploadOptions) {
    let file = &options.file;
    let total = file.size;
    let content_type = file
        .content_type
        .clone()
        .unwrap_or_else(|| engine.content_type.clone());

    let mut reader = match ChunkReader::open(&file.source, options.use_large_file_workaround).await {
        Ok(reader) => reader,
        Err(e) => {
            shared.emit(SessionEvent::Error {
                message: format!("failed to open '{}': {}", file.name, e),
                chunk: None,
                attempts: None,
            });
            return;
        }
    };

    let mut offset = 0u64;
    let mut chunk_number = 0u64;

    loop {
        shared.wait_while_paused().await;

        let chunk_size = shared.chunk_size.load(Ordering::SeqCst);
        let len = chunk_size.min(total - offset);
        let body = match reader.read_chunk(offset, len).await {
            Ok(body) => body,
            Err(e) => {
                let err = TransferError::Read {
                    chunk: chunk_number,
                    message: e.to_string(),
                };
                shared.emit(SessionEvent::Error {
                    message: err.to_string(),
                    chunk: Some(chunk_number),
                    attempts: None,
                });
                return;
            }
        };

        let attempts = AtomicU32::new(0);
        let range = content_range(offset, len, total);
        let result = with_retry(&engine.retry, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            shared.emit(SessionEvent::Attempt {
                chunk_number,
                chunk_size: len,
            });
            send_chunk(
                shared,
                engine,
                &options.endpoint,
                &content_type,
                &range,
                chunk_number,
                body.clone(),
            )
        })
        .await;
        let attempts = attempts.load(Ordering::SeqCst);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_retryable() {
                    TransferError::RetriesExhausted {
                        chunk: chunk_number,
                        attempts,
                        message: e.to_string(),
                    }
                    .to_string()
                } else {
                    e.to_string()
                };
                tracing::warn!(
                    file = %file.name,
                    chunk = chunk_number,
                    attempts,
                    error = %message,
                    "Chunk upload failed"
                );
                shared.emit(SessionEvent::Error {
                    message,
                    chunk: Some(chunk_number),
                    attempts: Some(attempts),
                });
                return;
            }
        };

        shared.emit(SessionEvent::ChunkSuccess {
            chunk: chunk_number,
            chunk_size: len,
            attempts,
            time_interval: response.elapsed,
            response: response.body,
        });

        offset += len;
        chunk_number += 1;

        let percent = if total == 0 {
            100.0
        } else {
            offset as f64 / total as f64 * 100.0
        };
        shared.emit(SessionEvent::Progress(percent));

        if options.dynamic_chunk_size {
            let next = next_chunk_size(chunk_size, response.elapsed);
            if next != chunk_size {
                tracing::debug!(
                    file = %file.name,
                    from = chunk_size,
                    to = next,
                    "Adjusted chunk size"
                );
                shared.chunk_size.store(next, Ordering::SeqCst);
            }
        }

        if offset >= total {
            break;
        }
    }

    tracing::debug!(file = %file.name, chunks = chunk_number, "Upload session finished");
    shared.emit(SessionEvent::Success);
}

async fn send_chunk(
    shared: &SessionShared,
    engine: &HttpTransferEngine,
    endpoint: &str,
    content_type: &str,
    range: &str,
    chunk: u64,
    body: Vec<u8>,
) -> Result<ChunkResponse> {
    let started = Instant::now();
    let response = engine
        .client
        .put(endpoint)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_RANGE, range)
        .body(body)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            if e.is_connect() {
                shared.set_offline(true);
            }
            return Err(Error::Network(e));
        }
    };
    shared.set_offline(false);

    let status = response.status().as_u16();
    if !SUCCESS_STATUSES.contains(&status) {
        return Err(TransferError::UnexpectedStatus { chunk, status }.into());
    }

    let elapsed = started.elapsed();
    let body = response.text().await.ok().filter(|text| !text.is_empty());
    Ok(ChunkResponse { body, elapsed })
}
