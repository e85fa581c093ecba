//! Event collection helpers for end-to-end tests

use std::time::Duration;

use chunk_uploader::Event;
use tokio::sync::broadcast;

/// Collect events until one matches `pred` or the timeout elapses
///
/// # Returns
/// Every event received, including the matching one. `None` on timeout or when
/// the channel closes first.
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    pred: F,
) -> Option<Vec<Event>>
where
    F: Fn(&Event) -> bool,
{
    let mut seen = Vec::new();
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = pred(&event);
                    seen.push(event);
                    if done {
                        return true;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await;

    match result {
        Ok(true) => Some(seen),
        _ => None,
    }
}

/// Names of the files that got an `UploadStart`, in order
pub fn started_files(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::UploadStart { file, .. } => Some(file.name.clone()),
            _ => None,
        })
        .collect()
}

/// The most uploads that were running at once, replayed from the event order
pub fn max_concurrent(events: &[Event]) -> usize {
    let mut active = 0usize;
    let mut max = 0usize;
    for event in events {
        match event {
            Event::UploadStart { .. } => {
                active += 1;
                max = max.max(active);
            }
            Event::Success { .. } | Event::UploadError { .. } => {
                active = active.saturating_sub(1);
            }
            _ => {}
        }
    }
    max
}
