//! End-to-end tests of the job scheduler: admission, dependencies,
//! failure propagation, the concurrency ceiling and snapshot recovery.
//!
//! All tests run with paused time so the one-second admission tick is
//! driven deterministically.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use corvus_jobs::info::JobRecord;
use corvus_jobs::{
    JobInfo, JobManager, JobWorker, JobsConfig, LiveAttrsArgs, LiveAttrsResult,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_manager(
    max_concurrent: usize,
    status_path: Option<PathBuf>,
) -> (Arc<JobManager>, CancellationToken, broadcast::Sender<String>) {
    let cancel = CancellationToken::new();
    let (stop_tx, _) = broadcast::channel(8);
    let conf = JobsConfig {
        max_num_concurrent_jobs: max_concurrent,
        status_data_path: status_path,
        ..Default::default()
    };
    let manager = JobManager::new(conf, "en", cancel.clone(), stop_tx.clone(), None);
    (manager, cancel, stop_tx)
}

fn liveattrs_job(corpus: &str) -> JobInfo {
    JobInfo::LiveAttrs(JobRecord::new(corpus, LiveAttrsArgs::default()))
}

fn with_result(base: &JobInfo, processed_atoms: u64) -> JobInfo {
    let mut copy = base.clone();
    if let JobInfo::LiveAttrs(rec) = &mut copy {
        rec.result = Some(LiveAttrsResult {
            processed_atoms,
            inserted_entries: processed_atoms,
        });
    }
    copy
}

/// Poll `cond` while letting the paused clock advance tick by tick.
async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    panic!("condition not met within the test window");
}

// ---------------------------------------------------------------------------
// Scenario: straight-line job
// ---------------------------------------------------------------------------

/// A worker that emits two intermediate updates and returns ends up
/// finished in the table, with the last update's payload preserved.
#[tokio::test(start_paused = true)]
async fn straight_line_job_finishes_with_last_update() {
    let (manager, _cancel, _stop) = new_manager(4, None);
    let job = liveattrs_job("syn2020");
    let job_id = job.id().to_string();

    let job_for_worker = job.clone();
    let worker: JobWorker = Box::new(move |tx| {
        Box::pin(async move {
            let _ = tx.send(with_result(&job_for_worker, 10)).await;
            let _ = tx.send(with_result(&job_for_worker, 20)).await;
        })
    });
    manager.enqueue_job(worker, job).await;

    let m = Arc::clone(&manager);
    let id = job_id.clone();
    wait_until(move || m.get_job(&id).map(|j| j.is_finished()).unwrap_or(false)).await;

    let stored = manager.get_job(&job_id).unwrap();
    assert!(stored.is_finished());
    assert!(stored.error().is_none());
    match stored {
        JobInfo::LiveAttrs(rec) => {
            assert_eq!(rec.result.unwrap().processed_atoms, 20);
        }
        other => panic!("unexpected job type: {}", other.job_type()),
    }
}

// ---------------------------------------------------------------------------
// Scenario: sticky errors
// ---------------------------------------------------------------------------

/// An error attached by an early update survives later updates that
/// come without one.
#[tokio::test(start_paused = true)]
async fn error_is_sticky_across_updates() {
    let (manager, _cancel, _stop) = new_manager(4, None);
    let job = liveattrs_job("syn2020");
    let job_id = job.id().to_string();

    let job_for_worker = job.clone();
    let worker: JobWorker = Box::new(move |tx| {
        Box::pin(async move {
            let _ = tx.send(job_for_worker.with_error("vertical file corrupted")).await;
            // A later progress update without the error set.
            let _ = tx.send(with_result(&job_for_worker, 5)).await;
        })
    });
    manager.enqueue_job(worker, job).await;

    let m = Arc::clone(&manager);
    let id = job_id.clone();
    wait_until(move || m.get_job(&id).map(|j| j.is_finished()).unwrap_or(false)).await;

    let stored = manager.get_job(&job_id).unwrap();
    assert_eq!(stored.error(), Some("vertical file corrupted"));
}

// ---------------------------------------------------------------------------
// Scenario: parent/child success
// ---------------------------------------------------------------------------

/// A child does not start until its parent's finish event has been
/// consumed; afterwards it runs normally.
#[tokio::test(start_paused = true)]
async fn child_runs_after_parent_finishes() {
    let (manager, _cancel, _stop) = new_manager(4, None);
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let parent = liveattrs_job("syn2020");
    let parent_id = parent.id().to_string();
    let order_a = Arc::clone(&order);
    let worker_a: JobWorker = Box::new(move |_tx| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            order_a.lock().unwrap().push("parent-done");
        })
    });
    manager.enqueue_job(worker_a, parent).await;

    let child = liveattrs_job("syn2020");
    let child_id = child.id().to_string();
    let order_b = Arc::clone(&order);
    let worker_b: JobWorker = Box::new(move |_tx| {
        Box::pin(async move {
            order_b.lock().unwrap().push("child-started");
        })
    });
    manager
        .enqueue_job_after(worker_b, child, &parent_id)
        .await
        .unwrap();

    let m = Arc::clone(&manager);
    let id = child_id.clone();
    wait_until(move || m.get_job(&id).map(|j| j.is_finished()).unwrap_or(false)).await;

    assert_eq!(
        order.lock().unwrap().as_slice(),
        ["parent-done", "child-started"]
    );
    let child_entry = manager.get_job(&child_id).unwrap();
    assert!(child_entry.error().is_none());
}

// ---------------------------------------------------------------------------
// Scenario: parent failure cascades
// ---------------------------------------------------------------------------

/// A child whose parent failed is never invoked; it appears in the
/// table as finished with a failed-parent error.
#[tokio::test(start_paused = true)]
async fn failed_parent_fails_child_without_running_it() {
    let (manager, _cancel, _stop) = new_manager(4, None);

    let parent = liveattrs_job("syn2020");
    let parent_id = parent.id().to_string();
    let parent_for_worker = parent.clone();
    let worker_a: JobWorker = Box::new(move |tx| {
        Box::pin(async move {
            let _ = tx
                .send(parent_for_worker.with_error("registry not readable"))
                .await;
        })
    });
    manager.enqueue_job(worker_a, parent).await;

    let child = liveattrs_job("syn2020");
    let child_id = child.id().to_string();
    let child_ran = Arc::new(AtomicBool::new(false));
    let child_ran_flag = Arc::clone(&child_ran);
    let worker_b: JobWorker = Box::new(move |_tx| {
        Box::pin(async move {
            child_ran_flag.store(true, Ordering::SeqCst);
        })
    });
    manager
        .enqueue_job_after(worker_b, child, &parent_id)
        .await
        .unwrap();

    let m = Arc::clone(&manager);
    let id = child_id.clone();
    wait_until(move || m.get_job(&id).map(|j| j.is_finished()).unwrap_or(false)).await;

    assert!(!child_ran.load(Ordering::SeqCst), "child worker must not run");
    let child_entry = manager.get_job(&child_id).unwrap();
    assert!(child_entry.is_finished());
    assert!(child_entry.error().unwrap().contains("failed parent"));
}

// ---------------------------------------------------------------------------
// Scenario: concurrency ceiling
// ---------------------------------------------------------------------------

/// With a ceiling of two, three long workers never have three
/// unfinished table entries at the same time, and all of them
/// eventually complete.
#[tokio::test(start_paused = true)]
async fn concurrency_ceiling_is_never_exceeded() {
    let (manager, _cancel, _stop) = new_manager(2, None);
    let mut ids = Vec::new();

    for i in 0..3 {
        let job = liveattrs_job(&format!("corpus{i}"));
        ids.push(job.id().to_string());
        let worker: JobWorker = Box::new(move |_tx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
            })
        });
        manager.enqueue_job(worker, job).await;
    }

    for _ in 0..80 {
        assert!(
            manager.num_unfinished_jobs() <= 2,
            "more than two jobs running at once"
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let m = Arc::clone(&manager);
    let all_ids = ids.clone();
    wait_until(move || {
        all_ids
            .iter()
            .all(|id| m.get_job(id).map(|j| j.is_finished()).unwrap_or(false))
    })
    .await;
}

// ---------------------------------------------------------------------------
// Scenario: snapshot round-trip
// ---------------------------------------------------------------------------

/// Cancelling the ambient context snapshots exactly the unfinished
/// jobs; a fresh scheduler loads them as detached, not live.
#[tokio::test(start_paused = true)]
async fn snapshot_round_trip_restores_detached_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let status_path = dir.path().join("status.json");
    let (manager, cancel, _stop) = new_manager(4, Some(status_path.clone()));

    // One job that finishes immediately...
    let quick = liveattrs_job("quick");
    let quick_id = quick.id().to_string();
    let quick_worker: JobWorker = Box::new(|_tx| Box::pin(async {}));
    manager.enqueue_job(quick_worker, quick).await;

    // ...and one that is still running when the context is cancelled.
    let slow = liveattrs_job("slow");
    let slow_id = slow.id().to_string();
    let slow_worker: JobWorker = Box::new(|_tx| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
    });
    manager.enqueue_job(slow_worker, slow).await;

    let m = Arc::clone(&manager);
    let qid = quick_id.clone();
    wait_until(move || m.get_job(&qid).map(|j| j.is_finished()).unwrap_or(false)).await;
    assert_eq!(manager.num_unfinished_jobs(), 1);

    cancel.cancel();
    wait_until(|| status_path.is_file()).await;

    let saved = corvus_jobs::snapshot::load_job_list(&status_path).unwrap();
    assert_eq!(saved.len(), 1, "only the unfinished job is snapshotted");
    assert_eq!(saved[0].id(), slow_id);

    // A fresh scheduler sees the job as detached, not live.
    let (restarted, _cancel2, _stop2) = new_manager(4, Some(status_path));
    assert!(restarted.get_job(&slow_id).is_none());
    let detached = restarted.detached_jobs();
    assert_eq!(detached.len(), 1);
    assert_eq!(detached[0].id(), slow_id);

    // Re-enqueueing the same descriptor re-attaches it.
    let reattached = detached[0].clone();
    let worker: JobWorker = Box::new(|_tx| Box::pin(async {}));
    restarted.enqueue_job(worker, reattached).await;
    let r = Arc::clone(&restarted);
    let sid = slow_id.clone();
    wait_until(move || r.get_job(&sid).is_some()).await;
    assert!(restarted.get_detached_job(&slow_id).is_none());
}

// ---------------------------------------------------------------------------
// External controls
// ---------------------------------------------------------------------------

/// A stop request publishes the job ID on the stop channel and returns
/// the current descriptor; the worker observes it cooperatively.
#[tokio::test(start_paused = true)]
async fn stop_job_publishes_on_stop_channel() {
    let (manager, _cancel, stop_tx) = new_manager(4, None);
    let mut stop_rx = stop_tx.subscribe();

    let job = liveattrs_job("syn2020");
    let job_id = job.id().to_string();
    let worker: JobWorker = Box::new(|_tx| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(600)).await;
        })
    });
    manager.enqueue_job(worker, job).await;

    let m = Arc::clone(&manager);
    let id = job_id.clone();
    wait_until(move || m.get_job(&id).is_some()).await;

    let descriptor = manager.stop_job(&job_id).unwrap();
    assert_eq!(descriptor.id(), job_id);
    assert_eq!(stop_rx.try_recv().unwrap(), job_id);
}

/// `clear_if_finished` refuses unfinished jobs and removes finished ones.
#[tokio::test(start_paused = true)]
async fn clear_if_finished_respects_finish_state() {
    let (manager, _cancel, _stop) = new_manager(4, None);

    let job = liveattrs_job("syn2020");
    let job_id = job.id().to_string();
    let worker: JobWorker = Box::new(|_tx| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(2)).await;
        })
    });
    manager.enqueue_job(worker, job).await;

    let m = Arc::clone(&manager);
    let id = job_id.clone();
    wait_until(move || m.get_job(&id).is_some()).await;
    assert!(matches!(
        manager.clear_if_finished(&job_id),
        Err(corvus_jobs::JobsError::NotFinished(_))
    ));

    let m = Arc::clone(&manager);
    let id = job_id.clone();
    wait_until(move || m.get_job(&id).map(|j| j.is_finished()).unwrap_or(false)).await;
    let removed = manager.clear_if_finished(&job_id).unwrap();
    assert_eq!(removed.id(), job_id);
    assert!(manager.get_job(&job_id).is_none());
}

/// The roster suppresses duplicate addresses and supports lookups.
#[tokio::test(start_paused = true)]
async fn notification_roster_suppresses_duplicates() {
    let (manager, _cancel, _stop) = new_manager(4, None);
    let job = liveattrs_job("syn2020");
    let job_id = job.id().to_string();
    let _tx = manager.register_job(job);

    manager.add_notification(&job_id, "user@example.cz").unwrap();
    manager.add_notification(&job_id, "user@example.cz").unwrap();
    assert_eq!(manager.get_notifications(&job_id).unwrap().len(), 1);
    assert!(manager.check_notification(&job_id, "user@example.cz").unwrap());

    manager.remove_notification(&job_id, "user@example.cz").unwrap();
    assert!(!manager.check_notification(&job_id, "user@example.cz").unwrap());

    assert!(matches!(
        manager.add_notification("no-such-job", "user@example.cz"),
        Err(corvus_jobs::JobsError::NoSuchJob(_))
    ));
}

/// The oldest-started unfinished job of a (corpus, type) pair wins.
#[tokio::test(start_paused = true)]
async fn last_unfinished_job_of_type_picks_oldest() {
    let (manager, _cancel, _stop) = new_manager(4, None);

    let mut older = JobRecord::new("syn2020", LiveAttrsArgs::default());
    older.start = chrono::Utc::now() - chrono::Duration::minutes(10);
    let older_id = older.id.clone();
    let _tx1 = manager.register_job(JobInfo::LiveAttrs(older));
    let _tx2 = manager.register_job(liveattrs_job("syn2020"));

    let found = manager
        .last_unfinished_job_of_type("syn2020", "liveattrs")
        .unwrap();
    assert_eq!(found.id(), older_id);
    assert!(manager
        .last_unfinished_job_of_type("intercorp", "liveattrs")
        .is_none());
}
