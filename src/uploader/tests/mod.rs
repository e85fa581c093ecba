use super::test_helpers::*;
use crate::types::Event;

mod control;

/// Receive events until one matches `pred`, returning all of them
async fn collect_until<F>(rx: &mut tokio::sync::broadcast::Receiver<Event>, pred: F) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn is_success_of(event: &Event, name: &str) -> bool {
    matches!(event, Event::Success { file } if file.name == name)
}

fn is_error_of(event: &Event, name: &str) -> bool {
    matches!(event, Event::UploadError { file, .. } if file.name == name)
}

fn started_names(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::UploadStart { file, .. } => Some(file.name.clone()),
            _ => None,
        })
        .collect()
}

/// Let forwarder tasks run so late events would have been emitted
async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
