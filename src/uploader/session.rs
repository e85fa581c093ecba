//! Bridge between one transfer session and the uploader's event vocabulary.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::config::UploadConfig;
use crate::engine::{SessionEvent, TransferEngine, TransferSession, UploadOptions};
use crate::error::{Error, Result, TransferError};
use crate::types::{FileInfo, UploadFile};

/// One file's live transfer session
pub(crate) struct UploadSessionAdapter {
    file: FileInfo,
    session: Arc<dyn TransferSession>,
}

impl UploadSessionAdapter {
    /// Create an idle session for `file` with the batch options
    ///
    /// Fails with a configuration error, before any I/O, when no endpoint is set or
    /// the engine rejects the options.
    pub(crate) fn create(
        engine: &dyn TransferEngine,
        upload: &UploadConfig,
        info: FileInfo,
        file: UploadFile,
    ) -> Result<Self> {
        let endpoint = upload
            .endpoint
            .as_deref()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .ok_or_else(|| {
                Error::config("no url or endpoint specified, cannot start upload", "endpoint")
            })?;

        let options = UploadOptions::from_config(endpoint, file, upload);
        let session = engine.create_upload(options)?;
        Ok(Self::from_session(info, session))
    }

    pub(crate) fn from_session(file: FileInfo, session: Arc<dyn TransferSession>) -> Self {
        Self { file, session }
    }

    /// Subscribe before [`start`](Self::start) to observe every event
    pub(crate) fn subscribe(&self) -> SessionEvents {
        SessionEvents {
            file: self.file.clone(),
            events: self.session.subscribe(),
            last_progress: 0.0,
            finished: false,
        }
    }

    pub(crate) fn start(&self) {
        self.session.start();
    }

    pub(crate) fn pause(&self) {
        self.session.pause();
    }

    pub(crate) fn resume(&self) {
        self.session.resume();
    }

    pub(crate) fn paused(&self) -> bool {
        self.session.paused()
    }

    pub(crate) fn offline(&self) -> bool {
        self.session.offline()
    }

    pub(crate) fn chunk_size(&self) -> u64 {
        self.session.chunk_size()
    }

    pub(crate) fn abort(&self) {
        self.session.abort();
    }
}

/// Normalized event stream of one session
///
/// Ends after the first terminal event. Progress never decreases and stays within
/// 0..=100. A stream that closes without a terminal event yields a synthesized
/// `Error` so the upload can't hang in the active set.
pub(crate) struct SessionEvents {
    file: FileInfo,
    events: broadcast::Receiver<SessionEvent>,
    last_progress: f64,
    finished: bool,
}

impl SessionEvents {
    pub(crate) async fn recv(&mut self) -> Option<SessionEvent> {
        if self.finished {
            return None;
        }

        loop {
            match self.events.recv().await {
                Ok(SessionEvent::Progress(percent)) => {
                    let percent = if percent.is_nan() {
                        self.last_progress
                    } else {
                        percent.clamp(0.0, 100.0).max(self.last_progress)
                    };
                    self.last_progress = percent;
                    return Some(SessionEvent::Progress(percent));
                }
                Ok(event) => {
                    self.finished = event.is_terminal();
                    return Some(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        upload_id = self.file.id.0,
                        skipped,
                        "Session events lagged, skipping ahead"
                    );
                }
                Err(RecvError::Closed) => {
                    self.finished = true;
                    tracing::warn!(
                        upload_id = self.file.id.0,
                        "Session closed without reporting completion"
                    );
                    return Some(SessionEvent::Error {
                        message: TransferError::SessionClosed.to_string(),
                        chunk: None,
                        attempts: None,
                    });
                }
            }
        }
    }
}
