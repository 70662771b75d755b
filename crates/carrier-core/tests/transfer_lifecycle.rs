//! Integration tests for the transfer lifecycle: retries, validation,
//! pause/resume/cancel controls, watcher fan-out, and completion handling.

mod common;

use std::sync::Arc;
use std::time::Duration;

use carrier_core::controller::{Submission, SubmitOutcome};
use carrier_core::iface::ControlAction;
use carrier_core::ids::short_token;
use carrier_core::job::JobStatus;
use common::{harness, test_config, wait_until_idle, Script};
use tempfile::tempdir;

fn sub(name: &str, size: u64, owner: i64) -> Submission {
    Submission {
        name: name.to_string(),
        size,
        owner,
    }
}

async fn wait_for_call(h: &common::Harness, resource: &str) {
    let start = std::time::Instant::now();
    while !h.transport.calls().iter().any(|c| c == resource) {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "transfer of {resource} never started"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn timeouts_surface_stall_notices_then_succeed() {
    let dir = tempdir().unwrap();
    let h = harness(test_config(dir.path(), 1));
    h.transport.script("flaky.bin", Script::FailTimeouts(2, 1000));

    assert_eq!(
        h.controller.submit(sub("flaky.bin", 1000, 1)).await,
        SubmitOutcome::Started
    );
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);

    let texts = h.ui.all_texts();
    assert!(
        texts
            .iter()
            .any(|t| t.contains("Download stalled. Retrying (1/3)...")),
        "{texts:?}"
    );
    assert!(texts
        .iter()
        .any(|t| t.contains("Download stalled. Retrying (2/3)...")));
    assert_eq!(h.transport.completed(), vec!["flaky.bin"]);
    assert!(texts
        .iter()
        .any(|t| t.contains("Download complete: flaky.bin")));
}

#[tokio::test]
async fn short_artifact_fails_validation() {
    let dir = tempdir().unwrap();
    let h = harness(test_config(dir.path(), 1));
    // 90% of the expected size, below the acceptance threshold.
    h.transport.script("short.bin", Script::Partial(900));

    h.controller.submit(sub("short.bin", 1000, 1)).await;
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);

    let texts = h.ui.all_texts();
    assert!(
        texts
            .iter()
            .any(|t| t.contains("Download incomplete. Expected")),
        "{texts:?}"
    );
    assert!(h
        .notifier
        .notifications()
        .iter()
        .any(|(title, _)| title == "Download Failed"));
    assert!(h.notifier.played().is_empty());
}

#[tokio::test]
async fn cancel_mid_transfer_deletes_partial_and_prunes_empty_dirs() {
    let dir = tempdir().unwrap();
    let h = harness(test_config(dir.path(), 1));
    let key = "shows/s01/e01.mkv";
    h.transport.script(key, Script::StallForever);

    assert_eq!(
        h.controller.submit(sub(key, 1000, 1)).await,
        SubmitOutcome::Started
    );
    wait_for_call(&h, key).await;
    // StallForever never writes the artifact; fake a partial one so cleanup
    // has something to remove.
    std::fs::write(dir.path().join(key), vec![0u8; 10]).unwrap();

    let ack = h.controller.control(&short_token(key), ControlAction::Cancel).await;
    assert_eq!(ack, "Cancelling");
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);

    assert!(!dir.path().join(key).exists(), "partial artifact removed");
    assert!(
        !dir.path().join("shows").exists(),
        "empty ancestor directories pruned"
    );
    assert!(dir.path().exists(), "managed root survives");
    assert!(h
        .ui
        .all_texts()
        .iter()
        .any(|t| t.contains("Download cancelled: shows/s01/e01.mkv")));
}

#[tokio::test]
async fn pause_resume_controls_round_trip() {
    let dir = tempdir().unwrap();
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(test_config(dir.path(), 1));
    h.transport.script("p.bin", Script::Hold(1000, Arc::clone(&gate)));
    let token = short_token("p.bin");

    h.controller.submit(sub("p.bin", 1000, 1)).await;
    wait_for_call(&h, "p.bin").await;

    assert_eq!(h.controller.control(&token, ControlAction::Pause).await, "Paused");
    assert_eq!(
        h.controller.control(&token, ControlAction::Pause).await,
        "Already paused"
    );
    assert_eq!(
        h.controller.control(&token, ControlAction::Resume).await,
        "Resuming"
    );
    assert_eq!(
        h.controller.control(&token, ControlAction::Resume).await,
        "Not paused"
    );
    assert_eq!(h.ui.acks(), vec!["Paused", "Already paused", "Resuming", "Not paused"]);

    gate.add_permits(1);
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);
    assert_eq!(h.transport.completed(), vec!["p.bin"]);
}

#[tokio::test]
async fn duplicate_submission_resumes_a_paused_job() {
    let dir = tempdir().unwrap();
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(test_config(dir.path(), 1));
    h.transport.script("p.bin", Script::Hold(1000, Arc::clone(&gate)));
    let token = short_token("p.bin");

    h.controller.submit(sub("p.bin", 1000, 7)).await;
    wait_for_call(&h, "p.bin").await;
    h.controller.control(&token, ControlAction::Pause).await;

    let outcome = h.controller.submit(sub("p.bin", 1000, 7)).await;
    assert_eq!(outcome, SubmitOutcome::AlreadyActive);
    let texts = h.ui.all_texts();
    assert!(
        texts.iter().any(|t| t.contains("Resuming: p.bin")),
        "{texts:?}"
    );
    assert!(texts.iter().any(|t| t.contains("Already in progress: p.bin")));
    gate.add_permits(1);
}

#[tokio::test]
async fn watchers_mirror_progress_and_dead_mirrors_are_pruned() {
    let dir = tempdir().unwrap();
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(test_config(dir.path(), 1));
    h.transport.script("w.bin", Script::Hold(1000, Arc::clone(&gate)));

    h.controller.submit(sub("w.bin", 1000, 1)).await;
    wait_for_call(&h, "w.bin").await;

    assert_eq!(
        h.controller.submit(sub("w.bin", 1000, 2)).await,
        SubmitOutcome::AttachedWatcher
    );
    let watcher_handle = *h.ui.handles_sent_to(2).last().expect("watcher got a message");
    assert_eq!(
        h.controller.submit(sub("w.bin", 1000, 3)).await,
        SubmitOutcome::AttachedWatcher
    );
    let dead_handle = *h.ui.handles_sent_to(3).last().expect("second watcher attached");
    h.ui.fail_handle(dead_handle);

    gate.add_permits(1);
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);
    let watcher_texts = h.ui.texts_for(watcher_handle);
    assert!(
        watcher_texts
            .iter()
            .any(|t| t.contains("Download complete: w.bin")),
        "watcher mirrors terminal edits: {watcher_texts:?}"
    );
    assert!(
        !h.ui
            .texts_for(dead_handle)
            .iter()
            .any(|t| t.contains("Download complete")),
        "a failing mirror is pruned instead of blocking the broadcast"
    );
}

#[tokio::test]
async fn queued_phase_watchers_get_their_mirror_at_start() {
    let dir = tempdir().unwrap();
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(test_config(dir.path(), 1));
    h.transport.script("a.bin", Script::Hold(1000, Arc::clone(&gate)));
    h.transport.script("b.bin", Script::Complete(1000));

    h.controller.submit(sub("a.bin", 1000, 1)).await;
    wait_for_call(&h, "a.bin").await;
    assert_eq!(
        h.controller.submit(sub("b.bin", 1000, 1)).await,
        SubmitOutcome::Queued(1)
    );
    // Someone else asks for the same queued file.
    assert_eq!(
        h.controller.submit(sub("b.bin", 1000, 2)).await,
        SubmitOutcome::AttachedWatcher
    );
    // And the original owner duplicating it just gets an acknowledgement.
    assert_eq!(
        h.controller.submit(sub("b.bin", 1000, 1)).await,
        SubmitOutcome::AlreadyQueued
    );

    gate.add_permits(1);
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);

    let mirror = *h.ui.handles_sent_to(2).last().expect("mirror sent at start");
    let texts = h.ui.texts_for(mirror);
    assert!(
        texts.iter().any(|t| t.contains("Starting download of b.bin")),
        "{texts:?}"
    );
    assert!(texts.iter().any(|t| t.contains("Download complete: b.bin")));
}

#[tokio::test]
async fn completion_plays_only_when_the_notifier_is_idle() {
    let dir = tempdir().unwrap();
    let h = harness(test_config(dir.path(), 1));
    h.transport.script("idle.bin", Script::Complete(1000));
    h.transport.script("busy.bin", Script::Complete(1000));

    h.controller.submit(sub("idle.bin", 1000, 1)).await;
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);
    assert_eq!(h.notifier.played(), vec![dir.path().join("idle.bin")]);

    h.notifier.set_idle(false);
    h.controller.submit(sub("busy.bin", 1000, 1)).await;
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);
    assert_eq!(
        h.notifier.played().len(),
        1,
        "busy playback surface suppresses auto-play"
    );
    assert!(h
        .ui
        .all_texts()
        .iter()
        .any(|t| t.contains("Playback busy")));
}

#[tokio::test]
async fn status_snapshot_tracks_active_and_queued() {
    let dir = tempdir().unwrap();
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(test_config(dir.path(), 1));
    h.transport.script("run.bin", Script::Hold(1000, Arc::clone(&gate)));
    h.transport.script("wait.bin", Script::Complete(1000));

    h.controller.submit(sub("run.bin", 1000, 1)).await;
    wait_for_call(&h, "run.bin").await;
    h.controller.submit(sub("wait.bin", 1000, 1)).await;

    let snapshot = h.controller.status();
    assert_eq!(snapshot.limit, 1);
    assert_eq!(snapshot.active, vec!["run.bin"]);
    assert_eq!(snapshot.queued, vec!["wait.bin"]);

    gate.add_permits(1);
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);
    let done = h.controller.status();
    assert!(done.active.is_empty());
    assert!(done.queued.is_empty());
}

#[tokio::test]
async fn unknown_token_and_terminal_jobs_are_rejected() {
    let dir = tempdir().unwrap();
    let h = harness(test_config(dir.path(), 1));
    h.transport.script("gone.bin", Script::Complete(1000));

    assert_eq!(
        h.controller.control("deadbeef", ControlAction::Pause).await,
        "File not found"
    );

    h.controller.submit(sub("gone.bin", 1000, 1)).await;
    assert!(wait_until_idle(&h.controller, Duration::from_secs(5)).await);
    // Finished and cleaned up: its token no longer routes anywhere.
    assert_eq!(
        h.controller
            .control(&short_token("gone.bin"), ControlAction::Cancel)
            .await,
        "File not found"
    );
    // Sanity: the library's status type is exercised by the state machine.
    assert!(!JobStatus::Queued.is_terminal());
}
