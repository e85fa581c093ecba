//! Queue admission and session lifecycle wiring.
//!
//! Everything here runs with the state mutex held. A session's terminal event is
//! handled in one critical section that reports it, frees the slot and refills it,
//! so no caller can observe a freed slot that hasn't been re-admitted.

use tokio_util::sync::CancellationToken;

use crate::engine::SessionEvent;
use crate::types::UploadId;

use super::registry::{Outcome, UploadTask};
use super::session::{SessionEvents, UploadSessionAdapter};
use super::{BatchState, Uploader};

impl Uploader {
    /// Admit queued files until the queue is empty or the ceiling is reached
    ///
    /// Does nothing while a batch-wide pause suspends admission. Files rejected before
    /// their session exists don't consume a slot, so admission carries on past them.
    pub(crate) fn process_queue(&self, state: &mut BatchState) {
        if state.admission_paused {
            return;
        }

        let ceiling = state.config.max_concurrent_uploads();
        while let Some(task) = state.registry.admit_next(ceiling) {
            self.start_upload(state, task);
        }
    }

    /// Create, wire and start the session for an admitted task
    ///
    /// Returns `false` if the task was rejected with a configuration error.
    pub(crate) fn start_upload(&self, state: &mut BatchState, task: UploadTask) -> bool {
        let file = task.info.clone();
        let session = match UploadSessionAdapter::create(
            self.engine.as_ref(),
            &state.config.upload,
            file.clone(),
            task.file.clone(),
        ) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    upload_id = file.id.0,
                    name = %file.name,
                    error = %e,
                    "Upload rejected before start"
                );
                self.notifier.upload_error(&file, &e);
                state.registry.reject(task, e.to_string());
                return false;
            }
        };

        let events = session.subscribe();
        tracing::info!(
            upload_id = file.id.0,
            name = %file.name,
            size = file.size,
            active = state.registry.active_count() + 1,
            "Upload started"
        );
        self.notifier.upload_start(&file, session.chunk_size());
        if session.offline() {
            self.notifier.offline(&file);
        }

        session.start();
        state.registry.activate(task, session);
        state.tracker.note_started();
        self.spawn_forwarder(file.id, events, state.generation.clone());
        true
    }

    /// Emit `QueueComplete` once the multi-file batch has drained
    pub(crate) fn finish_if_drained(&self, state: &mut BatchState) {
        if state.config.multiple() && state.tracker.check_complete(&state.registry) {
            tracing::info!(
                completed = state.registry.completed_count(),
                errored = state.registry.errored_count(),
                "Upload batch complete"
            );
            self.notifier.queue_complete();
        }
    }

    /// Relay one session's events into the coordinator until it ends
    fn spawn_forwarder(&self, id: UploadId, mut events: SessionEvents, generation: CancellationToken) {
        let uploader = self.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = generation.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                let terminal = event.is_terminal();
                let mut state = uploader.state.lock().await;
                // A reset may have happened while waiting for the lock
                if generation.is_cancelled() {
                    break;
                }
                uploader.handle_session_event(&mut state, id, event);
                if terminal {
                    break;
                }
            }
        });
    }

    fn handle_session_event(&self, state: &mut BatchState, id: UploadId, event: SessionEvent) {
        let Some(file) = state.registry.active_file(id) else {
            return;
        };

        let outcome = match &event {
            SessionEvent::Attempt { chunk_number, .. } => {
                tracing::debug!(upload_id = id.0, chunk = chunk_number, "Chunk attempt");
                state.registry.record_attempt(id);
                None
            }
            SessionEvent::ChunkSuccess {
                chunk, attempts, ..
            } => {
                tracing::debug!(upload_id = id.0, chunk, attempt = attempts, "Chunk uploaded");
                state.registry.record_chunk(id);
                None
            }
            SessionEvent::Progress(percent) => {
                state.registry.record_progress(id, *percent);
                None
            }
            SessionEvent::Success => {
                tracing::info!(upload_id = id.0, name = %file.name, "Upload completed");
                Some(Outcome::Completed)
            }
            SessionEvent::Error { message, chunk, .. } => {
                tracing::error!(
                    upload_id = id.0,
                    name = %file.name,
                    chunk = ?chunk,
                    error = %message,
                    "Upload failed"
                );
                Some(Outcome::Errored(message.clone()))
            }
            SessionEvent::Offline => {
                tracing::warn!(upload_id = id.0, "Upload went offline");
                None
            }
            SessionEvent::Online => {
                tracing::info!(upload_id = id.0, "Upload back online");
                None
            }
        };

        // Notify before the task leaves the active set
        self.notifier.forward(&file, event);

        if let Some(outcome) = outcome {
            state.registry.complete(id, outcome);
            self.process_queue(state);
            self.finish_if_drained(state);
        }
    }
}
