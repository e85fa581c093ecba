//! Upload task bookkeeping: the pending queue, the active set and the batch history.
//!
//! The registry is plain synchronous data. It lives inside the uploader's state
//! mutex, so every mutation below is atomic with respect to the others.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::session::UploadSessionAdapter;
use crate::types::{FileInfo, UploadFile, UploadId, UploadInfo, UploadStatus};

/// One file's journey through the uploader
#[derive(Clone, Debug)]
pub(crate) struct UploadTask {
    pub(crate) info: FileInfo,
    pub(crate) file: UploadFile,
    pub(crate) status: UploadStatus,
    pub(crate) progress: f64,
    pub(crate) attempts: u32,
    pub(crate) chunks_uploaded: u64,
    pub(crate) error: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
}

impl UploadTask {
    fn new(id: UploadId, file: UploadFile) -> Self {
        Self {
            info: FileInfo {
                id,
                name: file.name.clone(),
                size: file.size,
            },
            file,
            status: UploadStatus::Queued,
            progress: 0.0,
            attempts: 0,
            chunks_uploaded: 0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub(crate) fn id(&self) -> UploadId {
        self.info.id
    }

    fn snapshot(&self, status: UploadStatus) -> UploadInfo {
        UploadInfo {
            id: self.info.id,
            name: self.info.name.clone(),
            size: self.info.size,
            status,
            progress: self.progress,
            attempts: self.attempts,
            chunks_uploaded: self.chunks_uploaded,
            error: self.error.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// An admitted task together with its live session
pub(crate) struct ActiveUpload {
    pub(crate) task: UploadTask,
    pub(crate) session: UploadSessionAdapter,
}

impl ActiveUpload {
    /// Active or paused, read from the session itself
    pub(crate) fn status(&self) -> UploadStatus {
        if self.session.paused() {
            UploadStatus::Paused
        } else {
            UploadStatus::Active
        }
    }
}

/// How an active upload ended
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Outcome {
    Completed,
    Errored(String),
}

/// Owner of the queue and the active set
pub(crate) struct UploadTaskRegistry {
    queue: VecDeque<UploadTask>,
    active: HashMap<UploadId, ActiveUpload>,
    /// Terminal tasks of the current batch, in completion order
    finished: Vec<UploadTask>,
    /// Never reset, so identities stay unique across batches and resets
    next_id: u64,
}

impl Default for UploadTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadTaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            active: HashMap::new(),
            finished: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a task without queueing it
    pub(crate) fn create_task(&mut self, file: UploadFile) -> UploadTask {
        let id = UploadId(self.next_id);
        self.next_id += 1;
        UploadTask::new(id, file)
    }

    /// Append every file to the queue in input order
    pub(crate) fn enqueue(&mut self, files: Vec<UploadFile>) -> Vec<FileInfo> {
        let mut infos = Vec::with_capacity(files.len());
        for file in files {
            let task = self.create_task(file);
            infos.push(task.info.clone());
            self.queue.push_back(task);
        }
        infos
    }

    /// Pop the head of the queue if the active set is below `ceiling`
    pub(crate) fn admit_next(&mut self, ceiling: usize) -> Option<UploadTask> {
        if self.active.len() >= ceiling {
            return None;
        }
        self.queue.pop_front()
    }

    /// Move an admitted task into the active set
    pub(crate) fn activate(&mut self, mut task: UploadTask, session: UploadSessionAdapter) {
        task.status = UploadStatus::Active;
        task.started_at = Some(Utc::now());
        self.active.insert(task.id(), ActiveUpload { task, session });
    }

    /// Record a task that failed before its session existed
    pub(crate) fn reject(&mut self, mut task: UploadTask, message: String) {
        task.status = UploadStatus::Errored;
        task.error = Some(message);
        task.finished_at = Some(Utc::now());
        self.finished.push(task);
    }

    /// Remove a task from the active set
    ///
    /// Returns `false` if the task is not active, which makes repeated calls no-ops.
    pub(crate) fn complete(&mut self, id: UploadId, outcome: Outcome) -> bool {
        let Some(ActiveUpload { mut task, session }) = self.active.remove(&id) else {
            return false;
        };
        drop(session);

        match outcome {
            Outcome::Completed => {
                task.status = UploadStatus::Completed;
                task.progress = 100.0;
            }
            Outcome::Errored(message) => {
                task.status = UploadStatus::Errored;
                task.error = Some(message);
            }
        }
        task.finished_at = Some(Utc::now());
        self.finished.push(task);
        true
    }

    pub(crate) fn get_active(&self, id: UploadId) -> Option<&ActiveUpload> {
        self.active.get(&id)
    }

    pub(crate) fn active_file(&self, id: UploadId) -> Option<FileInfo> {
        self.active.get(&id).map(|a| a.task.info.clone())
    }

    pub(crate) fn record_attempt(&mut self, id: UploadId) {
        if let Some(active) = self.active.get_mut(&id) {
            active.task.attempts += 1;
        }
    }

    pub(crate) fn record_chunk(&mut self, id: UploadId) {
        if let Some(active) = self.active.get_mut(&id) {
            active.task.chunks_uploaded += 1;
        }
    }

    pub(crate) fn record_progress(&mut self, id: UploadId, percent: f64) {
        if let Some(active) = self.active.get_mut(&id) {
            active.task.progress = percent;
        }
    }

    pub(crate) fn sessions(&self) -> impl Iterator<Item = &UploadSessionAdapter> {
        self.active.values().map(|a| &a.session)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn paused_count(&self) -> usize {
        self.active.values().filter(|a| a.session.paused()).count()
    }

    pub(crate) fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn completed_count(&self) -> usize {
        self.count_finished(UploadStatus::Completed)
    }

    pub(crate) fn errored_count(&self) -> usize {
        self.count_finished(UploadStatus::Errored)
    }

    fn count_finished(&self, status: UploadStatus) -> usize {
        self.finished.iter().filter(|t| t.status == status).count()
    }

    /// Nothing queued and nothing active
    pub(crate) fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active.is_empty()
    }

    /// Status of any task known to the registry
    pub(crate) fn status_of(&self, id: UploadId) -> Option<UploadStatus> {
        if let Some(active) = self.active.get(&id) {
            return Some(active.status());
        }
        self.queue
            .iter()
            .chain(self.finished.iter())
            .find(|t| t.id() == id)
            .map(|t| t.status)
    }

    pub(crate) fn snapshot(&self, id: UploadId) -> Option<UploadInfo> {
        if let Some(active) = self.active.get(&id) {
            return Some(active.task.snapshot(active.status()));
        }
        self.queue
            .iter()
            .chain(self.finished.iter())
            .find(|t| t.id() == id)
            .map(|t| t.snapshot(t.status))
    }

    /// Every task of the current batch, ordered by identity
    pub(crate) fn snapshots(&self) -> Vec<UploadInfo> {
        let mut all: Vec<UploadInfo> = self
            .queue
            .iter()
            .chain(self.finished.iter())
            .map(|t| t.snapshot(t.status))
            .chain(self.active.values().map(|a| a.task.snapshot(a.status())))
            .collect();
        all.sort_by_key(|info| info.id);
        all
    }

    /// Forget the previous batch's terminal tasks
    pub(crate) fn clear_finished(&mut self) {
        self.finished.clear();
    }

    /// Drop everything, handing back the live sessions so the caller can abort them
    pub(crate) fn reset(&mut self) -> Vec<UploadSessionAdapter> {
        self.queue.clear();
        self.finished.clear();
        self.active.drain().map(|(_, active)| active.session).collect()
    }
}
