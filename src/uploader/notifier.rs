//! Single emission point for uploader events.

use tokio::sync::broadcast;

use crate::engine::SessionEvent;
use crate::error::Error;
use crate::types::{ErrorKind, Event, FileInfo};

/// Translates internal transitions into [`Event`]s for every subscriber
#[derive(Clone)]
pub(crate) struct EventNotifier {
    event_tx: broadcast::Sender<Event>,
}

impl EventNotifier {
    pub(crate) fn new(capacity: usize) -> Self {
        let (event_tx, _rx) = broadcast::channel(capacity);
        Self { event_tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Send to all subscribers; with none listening the event is dropped
    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn queue_started(&self, files: Vec<FileInfo>) {
        self.emit(Event::QueueStarted { files });
    }

    pub(crate) fn upload_start(&self, file: &FileInfo, chunk_size: u64) {
        self.emit(Event::UploadStart {
            file: file.clone(),
            chunk_size,
        });
    }

    /// Report a file that failed before its session existed
    pub(crate) fn upload_error(&self, file: &FileInfo, error: &Error) {
        self.emit(Event::UploadError {
            file: file.clone(),
            kind: error.kind(),
            message: error.to_string(),
            chunk_number: None,
            attempts: None,
        });
    }

    pub(crate) fn offline(&self, file: &FileInfo) {
        self.emit(Event::Offline { file: file.clone() });
    }

    pub(crate) fn paused_changed(&self, paused: bool) {
        self.emit(Event::PausedChanged { paused });
    }

    pub(crate) fn queue_complete(&self) {
        self.emit(Event::QueueComplete);
    }

    /// Tag a session event with its file and emit it
    pub(crate) fn forward(&self, file: &FileInfo, event: SessionEvent) {
        self.emit(session_event_to_event(file.clone(), event));
    }
}

fn session_event_to_event(file: FileInfo, event: SessionEvent) -> Event {
    match event {
        SessionEvent::Attempt {
            chunk_number,
            chunk_size,
        } => Event::ChunkAttempt {
            file,
            chunk_number,
            chunk_size,
        },
        SessionEvent::ChunkSuccess {
            chunk,
            chunk_size,
            attempts,
            time_interval,
            response,
        } => Event::ChunkSuccess {
            file,
            chunk,
            chunk_size,
            attempts,
            time_interval_ms: u64::try_from(time_interval.as_millis()).unwrap_or(u64::MAX),
            response,
        },
        SessionEvent::Progress(percent) => Event::Progress { file, percent },
        SessionEvent::Success => Event::Success { file },
        SessionEvent::Error {
            message,
            chunk,
            attempts,
        } => Event::UploadError {
            file,
            kind: ErrorKind::Transfer,
            message,
            chunk_number: chunk,
            attempts,
        },
        SessionEvent::Offline => Event::Offline { file },
        SessionEvent::Online => Event::Online { file },
    }
}
