//! Upload lifecycle control: enqueue, pause/resume, reset and status queries.

use crate::error::{Error, ProtocolError, Result};
use crate::types::{QueueStats, UploadFile, UploadId, UploadInfo};

use super::{BatchState, Uploader};

impl Uploader {
    /// Hand files to the uploader
    ///
    /// In multi-file mode the files are appended to the FIFO queue and admitted up
    /// to `max_concurrent_uploads` at a time. When the uploader is idle this starts a
    /// new batch and emits [`Event::QueueStarted`](crate::Event::QueueStarted) with
    /// every file before any of them is admitted; files enqueued mid-batch join the
    /// running batch.
    ///
    /// In single-file mode the first file starts uploading immediately and any
    /// further files are ignored.
    ///
    /// Files that can't start (no endpoint, file too large) are reported through
    /// [`Event::UploadError`](crate::Event::UploadError); they don't take a slot.
    ///
    /// # Returns
    ///
    /// The identities assigned to the accepted files, in input order. Empty input
    /// is a no-op.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use chunk_uploader::{Uploader, UploadFile};
    /// # async fn example(uploader: Uploader) -> chunk_uploader::Result<()> {
    /// let files = vec![
    ///     UploadFile::from_path("intro.mp4").await?,
    ///     UploadFile::from_path("talk.mp4").await?,
    /// ];
    /// let ids = uploader.enqueue(files).await;
    /// println!("queued {} uploads", ids.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn enqueue(&self, files: Vec<UploadFile>) -> Vec<UploadId> {
        if files.is_empty() {
            return Vec::new();
        }

        let mut state = self.state.lock().await;
        if state.registry.is_idle() {
            self.begin_batch(&mut state);
        }

        if state.config.multiple() {
            self.enqueue_batch(&mut state, files)
        } else {
            self.enqueue_single(&mut state, files)
        }
    }

    fn begin_batch(&self, state: &mut BatchState) {
        state.registry.clear_finished();
        state.tracker.begin_batch();
        state.admission_paused = false;
    }

    fn enqueue_batch(&self, state: &mut BatchState, files: Vec<UploadFile>) -> Vec<UploadId> {
        let new_batch = state.registry.is_idle();
        let infos = state.registry.enqueue(files);
        let ids = infos.iter().map(|info| info.id).collect();

        if new_batch {
            tracing::info!(files = infos.len(), "Upload batch started");
            self.notifier.queue_started(infos);
        } else {
            tracing::info!(
                files = infos.len(),
                queued = state.registry.queued_count(),
                "Files appended to running batch"
            );
        }

        self.process_queue(state);
        self.finish_if_drained(state);
        ids
    }

    fn enqueue_single(&self, state: &mut BatchState, files: Vec<UploadFile>) -> Vec<UploadId> {
        let mut files = files.into_iter();
        let Some(first) = files.next() else {
            return Vec::new();
        };
        let ignored = files.count();
        if ignored > 0 {
            tracing::warn!(
                ignored,
                "Single-file mode uploads one file at a time, ignoring the rest"
            );
        }

        let task = state.registry.create_task(first);
        let id = task.id();
        self.start_upload(state, task);
        state.current = Some(id);
        vec![id]
    }

    /// Pause every active upload
    ///
    /// In multi-file mode this also suspends admission of queued files until
    /// [`resume`](Self::resume). In single-file mode it pauses the most recently
    /// started upload. Emits [`Event::PausedChanged`](crate::Event::PausedChanged)
    /// when the pause state changes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotStarted`] if no upload has been started, and
    /// [`ProtocolError::InvalidState`] if the single-file upload already finished.
    pub async fn pause(&self) -> Result<()> {
        self.set_paused(true).await
    }

    /// Resume paused uploads and, in multi-file mode, admission of queued files
    ///
    /// # Errors
    ///
    /// Same conditions as [`pause`](Self::pause).
    pub async fn resume(&self) -> Result<()> {
        self.set_paused(false).await
    }

    async fn set_paused(&self, paused: bool) -> Result<()> {
        let operation = if paused { "pause" } else { "resume" };
        let mut state = self.state.lock().await;

        if !state.config.multiple() {
            let id = match state.current {
                Some(id) => id,
                None => return Err(not_started(operation)),
            };
            let session = match state.registry.get_active(id) {
                Some(active) => &active.session,
                None => return Err(invalid_state(&state, id, operation)),
            };
            if session.paused() != paused {
                if paused {
                    session.pause();
                } else {
                    session.resume();
                }
                tracing::info!(upload_id = id.0, paused, "Upload pause state changed");
                self.notifier.paused_changed(paused);
            }
            return Ok(());
        }

        if state.registry.is_idle() {
            return Err(not_started(operation));
        }

        let changed = state.admission_paused != paused
            || state.registry.sessions().any(|session| session.paused() != paused);
        for session in state.registry.sessions() {
            if paused {
                session.pause();
            } else {
                session.resume();
            }
        }
        state.admission_paused = paused;

        if changed {
            tracing::info!(
                paused,
                active = state.registry.active_count(),
                queued = state.registry.queued_count(),
                "Batch pause state changed"
            );
            self.notifier.paused_changed(paused);
        }

        if !paused {
            self.process_queue(&mut state);
            self.finish_if_drained(&mut state);
        }
        Ok(())
    }

    /// Pause one active upload
    ///
    /// Pausing an upload that is already paused is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and
    /// [`ProtocolError::InvalidState`] for an upload that is queued or finished.
    pub async fn pause_upload(&self, id: UploadId) -> Result<()> {
        self.set_upload_paused(id, true).await
    }

    /// Resume one paused upload
    ///
    /// # Errors
    ///
    /// Same conditions as [`pause_upload`](Self::pause_upload).
    pub async fn resume_upload(&self, id: UploadId) -> Result<()> {
        self.set_upload_paused(id, false).await
    }

    async fn set_upload_paused(&self, id: UploadId, paused: bool) -> Result<()> {
        let operation = if paused { "pause" } else { "resume" };
        let state = self.state.lock().await;

        let Some(active) = state.registry.get_active(id) else {
            return Err(invalid_state(&state, id, operation));
        };

        let was_paused = self.paused_locked(&state);
        if paused {
            active.session.pause();
        } else {
            active.session.resume();
        }
        tracing::debug!(upload_id = id.0, paused, "Upload pause state set");

        let now_paused = self.paused_locked(&state);
        if was_paused != now_paused {
            self.notifier.paused_changed(now_paused);
        }
        Ok(())
    }

    /// Abort every live session and discard all uploads
    ///
    /// Sessions are told to abort, so their network transfers stop. Events a session
    /// produced before noticing are ignored. Upload identities keep increasing across
    /// resets.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;

        state.generation.cancel();
        state.generation = tokio_util::sync::CancellationToken::new();

        let sessions = state.registry.reset();
        for session in &sessions {
            session.abort();
        }

        state.tracker.begin_batch();
        state.admission_paused = false;
        state.current = None;

        tracing::info!(aborted = sessions.len(), "Uploader reset");
    }

    /// Whether uploads are paused
    ///
    /// In multi-file mode: true iff at least one upload is active and every active
    /// upload is paused. In single-file mode: whether the current upload is paused.
    pub async fn paused(&self) -> bool {
        let state = self.state.lock().await;
        self.paused_locked(&state)
    }

    fn paused_locked(&self, state: &BatchState) -> bool {
        if state.config.multiple() {
            state.tracker.paused_all(&state.registry)
        } else {
            state
                .current
                .and_then(|id| state.registry.get_active(id))
                .is_some_and(|active| active.session.paused())
        }
    }

    /// Number of uploads with a live session (paused ones included)
    pub async fn active_uploads_count(&self) -> usize {
        self.state.lock().await.registry.active_count()
    }

    /// Number of files waiting for a slot
    pub async fn queued_files_count(&self) -> usize {
        self.state.lock().await.registry.queued_count()
    }

    /// Counts and whole-batch status
    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        state.tracker.stats(&state.registry, state.admission_paused)
    }

    /// Snapshots of every upload of the current batch, ordered by id
    pub async fn uploads(&self) -> Vec<UploadInfo> {
        self.state.lock().await.registry.snapshots()
    }

    /// Snapshot of one upload of the current batch
    pub async fn upload(&self, id: UploadId) -> Option<UploadInfo> {
        self.state.lock().await.registry.snapshot(id)
    }
}

fn not_started(operation: &str) -> Error {
    tracing::warn!(operation, "Pausing or resuming before an upload has begun is unsupported");
    ProtocolError::NotStarted {
        operation: operation.to_string(),
    }
    .into()
}

fn invalid_state(state: &BatchState, id: UploadId, operation: &str) -> Error {
    match state.registry.status_of(id) {
        Some(status) => {
            tracing::warn!(
                upload_id = id.0,
                operation,
                status = status.as_str(),
                "Upload is not in a state that allows this"
            );
            ProtocolError::InvalidState {
                id,
                operation: operation.to_string(),
                current_state: status.as_str().to_string(),
            }
            .into()
        }
        None => Error::NotFound(id),
    }
}
