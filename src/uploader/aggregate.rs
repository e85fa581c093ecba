//! Whole-batch state derived from the registry.

use super::registry::UploadTaskRegistry;
use crate::types::{BatchStatus, QueueStats};

/// Derived read-only view over the registry, plus the batch-complete latch
#[derive(Debug, Default)]
pub(crate) struct AggregateStateTracker {
    /// A session was started in this batch
    started: bool,
    /// The batch-complete transition already fired
    complete_fired: bool,
}

impl AggregateStateTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Forget the previous batch
    pub(crate) fn begin_batch(&mut self) {
        self.started = false;
        self.complete_fired = false;
    }

    pub(crate) fn note_started(&mut self) {
        self.started = true;
    }

    /// True iff at least one upload is active and every active upload is paused
    pub(crate) fn paused_all(&self, registry: &UploadTaskRegistry) -> bool {
        let active = registry.active_count();
        active > 0 && registry.paused_count() == active
    }

    pub(crate) fn status(&self, registry: &UploadTaskRegistry, admission_paused: bool) -> BatchStatus {
        if !registry.is_idle() {
            let nothing_running = registry.active_count() == 0 && admission_paused;
            if self.paused_all(registry) || nothing_running {
                BatchStatus::AllPaused
            } else {
                BatchStatus::Uploading
            }
        } else if registry.errored_count() > 0 {
            BatchStatus::Error
        } else if registry.completed_count() > 0 {
            BatchStatus::Complete
        } else {
            BatchStatus::Idle
        }
    }

    /// Latch the batch-complete transition
    ///
    /// Returns `true` exactly once per batch: the first time the registry is idle
    /// after at least one session started.
    pub(crate) fn check_complete(&mut self, registry: &UploadTaskRegistry) -> bool {
        if self.started && !self.complete_fired && registry.is_idle() {
            self.complete_fired = true;
            return true;
        }
        false
    }

    pub(crate) fn stats(&self, registry: &UploadTaskRegistry, admission_paused: bool) -> QueueStats {
        QueueStats {
            status: self.status(registry, admission_paused),
            active: registry.active_count(),
            paused: registry.paused_count(),
            queued: registry.queued_count(),
            completed: registry.completed_count(),
            errored: registry.errored_count(),
            admission_paused,
        }
    }
}
