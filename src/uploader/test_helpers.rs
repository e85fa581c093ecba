//! Shared test helpers: a scriptable in-memory engine and uploader constructors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::engine::{
    SESSION_EVENT_CAPACITY, SessionEvent, TransferEngine, TransferSession, UploadOptions,
};
use crate::error::Result;
use crate::types::{Event, UploadFile};
use crate::uploader::Uploader;
use crate::uploader::registry::UploadTask;
use crate::uploader::session::UploadSessionAdapter;

pub(crate) const TEST_ENDPOINT: &str = "https://upload.example.com/videos/abc123";

/// Engine whose sessions only emit what the test tells them to
pub(crate) struct FakeEngine {
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    /// New sessions start out reporting offline
    offline_on_create: AtomicBool,
}

impl FakeEngine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(Vec::new()),
            offline_on_create: AtomicBool::new(false),
        })
    }

    pub(crate) fn create_sessions_offline(&self, offline: bool) {
        self.offline_on_create.store(offline, Ordering::SeqCst);
    }

    /// Every session created so far, in creation order
    pub(crate) fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.sessions.lock().unwrap().clone()
    }

    pub(crate) fn session(&self, index: usize) -> Arc<FakeSession> {
        Arc::clone(&self.sessions.lock().unwrap()[index])
    }

    /// The session created for the file called `name`
    pub(crate) fn session_for(&self, name: &str) -> Arc<FakeSession> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.options.file.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no session for {name}"))
    }
}

impl TransferEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn create_upload(&self, options: UploadOptions) -> Result<Arc<dyn TransferSession>> {
        options.validate()?;
        let session = Arc::new(FakeSession::new(options));
        session.set_offline(self.offline_on_create.load(Ordering::SeqCst));
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}

pub(crate) struct FakeSession {
    pub(crate) options: UploadOptions,
    events: Mutex<Option<broadcast::Sender<SessionEvent>>>,
    started: AtomicBool,
    paused: AtomicBool,
    offline: AtomicBool,
    aborted: AtomicBool,
}

impl FakeSession {
    fn new(options: UploadOptions) -> Self {
        let (tx, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            options,
            events: Mutex::new(Some(tx)),
            started: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            tx.send(event).ok();
        }
    }

    /// Drop the sender so subscribers see the stream close
    pub(crate) fn close(&self) {
        self.events.lock().unwrap().take();
    }

    /// Send one chunk and report success
    pub(crate) fn succeed(&self) {
        let size = self.options.file.size;
        self.emit(SessionEvent::Attempt {
            chunk_number: 0,
            chunk_size: size,
        });
        self.emit(SessionEvent::ChunkSuccess {
            chunk: 0,
            chunk_size: size,
            attempts: 1,
            time_interval: Duration::from_millis(5),
            response: None,
        });
        self.emit(SessionEvent::Progress(100.0));
        self.emit(SessionEvent::Success);
    }

    /// Fail the first chunk permanently
    pub(crate) fn fail(&self, message: &str) {
        self.emit(SessionEvent::Attempt {
            chunk_number: 0,
            chunk_size: self.options.file.size,
        });
        self.emit(SessionEvent::Error {
            message: message.to_string(),
            chunk: Some(0),
            attempts: Some(1),
        });
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

impl TransferSession for FakeSession {
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn chunk_size(&self) -> u64 {
        self.options.initial_chunk_size()
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

/// Build an adapter around a fresh fake session for `task`
pub(crate) fn fake_adapter(engine: &FakeEngine, task: &UploadTask) -> UploadSessionAdapter {
    let options = UploadOptions::new(TEST_ENDPOINT, task.file.clone());
    let session = engine.create_upload(options).unwrap();
    UploadSessionAdapter::from_session(task.info.clone(), session)
}

/// `n` small in-memory files named `file-0.bin`, `file-1.bin`, ...
pub(crate) fn test_files(n: usize) -> Vec<UploadFile> {
    (0..n)
        .map(|i| UploadFile::from_bytes(format!("file-{i}.bin"), vec![i as u8; 1024 * (i + 1)]))
        .collect()
}

pub(crate) fn test_config(multiple: bool, max_concurrent_uploads: usize) -> Config {
    let mut config = Config::default();
    config.upload.endpoint = Some(TEST_ENDPOINT.to_string());
    config.queue.multiple = multiple;
    config.queue.max_concurrent_uploads = max_concurrent_uploads;
    config
}

/// Helper to create an uploader backed by a [`FakeEngine`]
pub(crate) fn create_test_uploader(config: Config) -> (Uploader, Arc<FakeEngine>) {
    let engine = FakeEngine::new();
    let uploader = Uploader::with_engine(config, engine.clone()).unwrap();
    (uploader, engine)
}

/// Receive the next event, failing the test after a timeout
pub(crate) async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Skip events until one matches `pred`
pub(crate) async fn wait_for<F>(rx: &mut broadcast::Receiver<Event>, pred: F) -> Event
where
    F: Fn(&Event) -> bool,
{
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Collect every event already buffered, without waiting for more
pub(crate) fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
