use super::*;
use crate::engine::TransferSession;
use crate::error::{Error, ProtocolError};
use crate::types::{BatchStatus, UploadId, UploadStatus};

// --- batch-wide pause/resume ---

#[tokio::test]
async fn test_pause_all_suspends_admission_until_resume() {
    let (uploader, engine) = create_test_uploader(test_config(true, 2));
    let mut rx = uploader.subscribe();
    uploader.enqueue(test_files(5)).await;
    drain(&mut rx);

    uploader.pause().await.unwrap();

    assert!(uploader.paused().await);
    assert!(matches!(
        next_event(&mut rx).await,
        Event::PausedChanged { paused: true }
    ));
    assert!(engine.sessions().iter().all(|s| s.paused()));
    let stats = uploader.stats().await;
    assert_eq!(stats.status, BatchStatus::AllPaused);
    assert!(stats.admission_paused);

    // A chunk in flight when the pause arrived can still finish the file
    engine.session_for("file-0.bin").succeed();
    wait_for(&mut rx, |e| is_success_of(e, "file-0.bin")).await;
    assert_eq!(uploader.active_uploads_count().await, 1);
    assert_eq!(uploader.queued_files_count().await, 3, "admission is suspended");

    settle().await;
    assert!(started_names(&drain(&mut rx)).is_empty());

    uploader.resume().await.unwrap();

    let events = drain(&mut rx);
    assert!(matches!(events[0], Event::PausedChanged { paused: false }));
    assert_eq!(started_names(&events), vec!["file-2.bin"]);
    assert!(!uploader.paused().await);
    assert_eq!(uploader.active_uploads_count().await, 2);
    assert!(!engine.session_for("file-1.bin").paused());
}

#[tokio::test]
async fn test_pause_twice_emits_one_change() {
    let (uploader, _engine) = create_test_uploader(test_config(true, 2));
    let mut rx = uploader.subscribe();
    uploader.enqueue(test_files(2)).await;
    drain(&mut rx);

    uploader.pause().await.unwrap();
    uploader.pause().await.unwrap();

    let changes = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, Event::PausedChanged { .. }))
        .count();
    assert_eq!(changes, 1);
}

#[tokio::test]
async fn test_pause_before_any_upload_is_a_protocol_error() {
    for multiple in [true, false] {
        let (uploader, _engine) = create_test_uploader(test_config(multiple, 2));

        match uploader.pause().await {
            Err(Error::Protocol(ProtocolError::NotStarted { operation })) => {
                assert_eq!(operation, "pause");
            }
            other => panic!("expected NotStarted, got {:?}", other),
        }
        assert!(matches!(
            uploader.resume().await,
            Err(Error::Protocol(ProtocolError::NotStarted { .. }))
        ));
        assert!(!uploader.paused().await);
    }
}

#[tokio::test]
async fn test_paused_is_false_with_no_active_uploads() {
    let (uploader, engine) = create_test_uploader(test_config(true, 2));
    let mut rx = uploader.subscribe();
    uploader.enqueue(test_files(1)).await;

    uploader.pause().await.unwrap();
    assert!(uploader.paused().await);

    engine.session(0).succeed();
    wait_for(&mut rx, |e| matches!(e, Event::QueueComplete)).await;
    assert!(!uploader.paused().await, "never vacuously paused");
}

// --- per-file pause/resume ---

#[tokio::test]
async fn test_pause_single_upload() {
    let (uploader, engine) = create_test_uploader(test_config(true, 2));
    let mut rx = uploader.subscribe();
    let ids = uploader.enqueue(test_files(3)).await;
    drain(&mut rx);

    uploader.pause_upload(ids[0]).await.unwrap();

    assert!(engine.session_for("file-0.bin").paused());
    assert!(!engine.session_for("file-1.bin").paused());
    assert_eq!(uploader.upload(ids[0]).await.unwrap().status, UploadStatus::Paused);
    assert!(!uploader.paused().await, "one of two active uploads is paused");
    assert!(drain(&mut rx).is_empty(), "aggregate pause state did not change");

    uploader.pause_upload(ids[1]).await.unwrap();
    assert!(uploader.paused().await);
    assert!(matches!(
        next_event(&mut rx).await,
        Event::PausedChanged { paused: true }
    ));
    assert_eq!(
        uploader.queued_files_count().await,
        1,
        "per-file pauses don't change admission"
    );

    uploader.resume_upload(ids[0]).await.unwrap();
    assert_eq!(uploader.upload(ids[0]).await.unwrap().status, UploadStatus::Active);
    assert!(matches!(
        next_event(&mut rx).await,
        Event::PausedChanged { paused: false }
    ));
}

#[tokio::test]
async fn test_pause_upload_rejects_queued_finished_and_unknown() {
    let (uploader, engine) = create_test_uploader(test_config(true, 1));
    let mut rx = uploader.subscribe();
    let ids = uploader.enqueue(test_files(2)).await;

    match uploader.pause_upload(ids[1]).await {
        Err(Error::Protocol(ProtocolError::InvalidState {
            id, current_state, ..
        })) => {
            assert_eq!(id, ids[1]);
            assert_eq!(current_state, "queued");
        }
        other => panic!("expected InvalidState, got {:?}", other),
    }

    engine.session(0).succeed();
    wait_for(&mut rx, |e| is_success_of(e, "file-0.bin")).await;
    match uploader.resume_upload(ids[0]).await {
        Err(Error::Protocol(ProtocolError::InvalidState { current_state, .. })) => {
            assert_eq!(current_state, "completed");
        }
        other => panic!("expected InvalidState, got {:?}", other),
    }

    assert!(matches!(
        uploader.pause_upload(UploadId(9999)).await,
        Err(Error::NotFound(UploadId(9999)))
    ));
}

// --- single-file mode ---

#[tokio::test]
async fn test_single_mode_pause_and_resume_current_upload() {
    let (uploader, engine) = create_test_uploader(test_config(false, 3));
    let mut rx = uploader.subscribe();
    let ids = uploader.enqueue(test_files(1)).await;
    drain(&mut rx);

    uploader.pause().await.unwrap();
    assert!(uploader.paused().await);
    assert!(engine.session(0).paused());
    assert!(matches!(
        next_event(&mut rx).await,
        Event::PausedChanged { paused: true }
    ));

    uploader.pause().await.unwrap();
    assert!(drain(&mut rx).is_empty(), "already paused");

    uploader.resume().await.unwrap();
    assert!(!uploader.paused().await);
    assert!(matches!(
        next_event(&mut rx).await,
        Event::PausedChanged { paused: false }
    ));

    engine.session(0).succeed();
    wait_for(&mut rx, |e| matches!(e, Event::Success { .. })).await;
    match uploader.pause().await {
        Err(Error::Protocol(ProtocolError::InvalidState { id, .. })) => assert_eq!(id, ids[0]),
        other => panic!("expected InvalidState, got {:?}", other),
    }
}

// --- reset ---

#[tokio::test]
async fn test_reset_aborts_sessions_and_discards_everything() {
    let (uploader, engine) = create_test_uploader(test_config(true, 2));
    let mut rx = uploader.subscribe();
    let before = uploader.enqueue(test_files(4)).await;
    drain(&mut rx);

    uploader.reset().await;

    assert!(engine.sessions().iter().all(|s| s.aborted()));
    assert_eq!(uploader.active_uploads_count().await, 0);
    assert_eq!(uploader.queued_files_count().await, 0);
    assert!(uploader.uploads().await.is_empty());
    assert_eq!(uploader.stats().await.status, BatchStatus::Idle);

    // Late events from an aborted session are ignored
    engine.session(0).succeed();
    settle().await;
    assert!(drain(&mut rx).is_empty());

    let after = uploader.enqueue(test_files(1)).await;
    assert!(after[0] > before[3]);
    assert!(matches!(next_event(&mut rx).await, Event::QueueStarted { .. }));

    engine.session(2).succeed();
    wait_for(&mut rx, |e| matches!(e, Event::QueueComplete)).await;
}

#[tokio::test]
async fn test_reset_clears_batch_pause() {
    let (uploader, engine) = create_test_uploader(test_config(true, 1));
    let mut rx = uploader.subscribe();
    uploader.enqueue(test_files(2)).await;
    uploader.pause().await.unwrap();

    uploader.reset().await;
    drain(&mut rx);

    uploader.enqueue(test_files(1)).await;
    assert_eq!(uploader.active_uploads_count().await, 1);
    assert!(!engine.sessions().last().unwrap().paused());
    assert!(!uploader.stats().await.admission_paused);
}
