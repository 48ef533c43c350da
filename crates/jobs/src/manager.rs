//! The job scheduler.
//!
//! [`JobManager`] owns the job table, the admission queue, the
//! dependency graph, the detached-job registry and the notification
//! roster. Three long-lived tasks run for its lifetime: a one-second
//! admission tick, an hourly cleanup tick and the table-update consumer.
//! All of them exit when the ambient [`CancellationToken`] fires, at
//! which point unfinished jobs are snapshotted to disk.
//!
//! Locking discipline: the queue lock (an async mutex over queue +
//! dependency graph) is held for the duration of one admission pass and
//! released on every path. The job-list, detached-jobs and roster locks
//! are plain mutexes guarding short, await-free sections; the job table
//! itself is only ever written by the table-update consumer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use corvus_events::EmailNotifier;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::config::JobsConfig;
use crate::deps::JobDeps;
use crate::error::JobsError;
use crate::info::JobInfo;
use crate::notify;
use crate::queue::{JobQueue, JobUpdateSender, JobWorker, QueuedJob};
use crate::snapshot;

/// Capacity of a single job's update channel. Workers exceeding it
/// block until the table consumer drains (backpressure, not data loss).
const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Admission tick period.
const ADMIT_TICK: std::time::Duration = std::time::Duration::from_secs(1);

/// Cleanup tick period.
const CLEAR_TICK: std::time::Duration = std::time::Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Table updates
// ---------------------------------------------------------------------------

/// A mutation of the job table. Every change flows through the single
/// table-update channel so one consumer serializes them all.
enum TableUpdate {
    /// A progress descriptor from a worker.
    Update { id: String, data: JobInfo },
    /// The worker closed its channel; `last` is the final descriptor
    /// seen on it (if any).
    Finish { id: String, last: Option<JobInfo> },
    /// Prune finished jobs older than the configured TTL.
    ClearOld,
}

/// Queue and dependency graph, guarded together by the queue lock.
struct QueueState {
    queue: JobQueue,
    deps: JobDeps,
}

// ---------------------------------------------------------------------------
// Utilization
// ---------------------------------------------------------------------------

/// Snapshot of the scheduler's load, served by the utilization endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Utilization {
    pub max_num_concurrent_jobs: usize,
    pub current_running_jobs: usize,
    pub utilization: f32,
    pub job_queue_length: usize,
}

// ---------------------------------------------------------------------------
// JobManager
// ---------------------------------------------------------------------------

pub struct JobManager {
    conf: JobsConfig,
    lang: String,
    job_list: StdMutex<HashMap<String, JobInfo>>,
    detached_jobs: StdMutex<HashMap<String, JobInfo>>,
    queue: AsyncMutex<QueueState>,
    recipients: StdMutex<HashMap<String, Vec<String>>>,
    table_update: mpsc::Sender<TableUpdate>,
    job_stop: broadcast::Sender<String>,
    notifier: Option<Arc<EmailNotifier>>,
    shutdown_complete: tokio::sync::Notify,
}

impl JobManager {
    /// Create the scheduler and start its background tasks.
    ///
    /// `job_stop` is owned by the caller; the scheduler only publishes
    /// IDs on it and workers are expected to observe it cooperatively.
    /// If a status snapshot exists at the configured path, its jobs are
    /// loaded into the detached registry.
    pub fn new(
        conf: JobsConfig,
        lang: impl Into<String>,
        cancel: CancellationToken,
        job_stop: broadcast::Sender<String>,
        notifier: Option<Arc<EmailNotifier>>,
    ) -> Arc<Self> {
        // Capacity 1: a slow consumer creates visible backpressure
        // instead of hiding behind a deep buffer.
        let (table_tx, table_rx) = mpsc::channel(1);

        let mut detached = HashMap::new();
        if let Some(path) = &conf.status_data_path {
            if path.is_file() {
                tracing::info!(path = %path.display(), "Found job status data, loading");
                match snapshot::load_job_list(path) {
                    Ok(jobs) => {
                        for job in jobs {
                            tracing::info!(job_id = job.id(), "Added detached job");
                            detached.insert(job.id().to_string(), job);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to load job status data");
                    }
                }
            }
        }

        let manager = Arc::new(Self {
            conf,
            lang: lang.into(),
            job_list: StdMutex::new(HashMap::new()),
            detached_jobs: StdMutex::new(detached),
            queue: AsyncMutex::new(QueueState {
                queue: JobQueue::new(),
                deps: JobDeps::new(),
            }),
            recipients: StdMutex::new(HashMap::new()),
            table_update: table_tx,
            job_stop,
            notifier,
            shutdown_complete: tokio::sync::Notify::new(),
        });

        tokio::spawn(Arc::clone(&manager).run_admit_ticker(cancel.clone()));
        tokio::spawn(Arc::clone(&manager).run_clear_ticker(cancel.clone()));
        tokio::spawn(Arc::clone(&manager).run_table_consumer(table_rx, cancel.clone()));
        tokio::spawn(Arc::clone(&manager).snapshot_on_shutdown(cancel));

        manager
    }

    // -- enqueue ------------------------------------------------------------

    /// Append a job to the admission queue.
    pub async fn enqueue_job(&self, worker: JobWorker, initial: JobInfo) {
        let job_id = initial.id().to_string();
        self.queue.lock().await.queue.enqueue(worker, initial);
        tracing::info!(job_id, "Enqueued job");
    }

    /// Append a job that must wait for `parent_job_id` to finish
    /// successfully before running.
    pub async fn enqueue_job_after(
        &self,
        worker: JobWorker,
        initial: JobInfo,
        parent_job_id: &str,
    ) -> Result<(), JobsError> {
        let job_id = initial.id().to_string();
        let mut state = self.queue.lock().await;
        state.deps.add(&job_id, parent_job_id)?;
        state.queue.enqueue(worker, initial);
        tracing::info!(job_id, parent_job_id, "Enqueued job with parent");
        Ok(())
    }

    // -- admission ----------------------------------------------------------

    async fn run_admit_ticker(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(ADMIT_TICK);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.admit_pass().await,
            }
        }
    }

    /// One admission pass. The queue lock is held for the whole pass
    /// and released on every exit path.
    async fn admit_pass(&self) {
        let mut state = self.queue.lock().await;
        while self.num_unfinished_jobs() < self.conf.max_num_concurrent_jobs {
            let next_id = match state.queue.peek_id() {
                Ok(id) => id,
                Err(_) => break, // empty queue
            };
            if !state.deps.contains(&next_id) {
                self.dequeue_and_run(&mut state);
                continue;
            }
            match state.deps.must_wait(&next_id) {
                Err(e) => {
                    let msg =
                        format!("failed to obtain waiting status for job {next_id}: {e}");
                    self.dequeue_job_as_failed(&mut state, &msg).await;
                }
                Ok(true) => {
                    // Blocked head: rotate it away but stop the pass so
                    // the queue is not busy-rotated within one tick.
                    state.queue.delay_next();
                    break;
                }
                Ok(false) => match state.deps.has_failed_parent(&next_id) {
                    Err(e) => {
                        let msg = format!("failed to check parents of job {next_id}: {e}");
                        self.dequeue_job_as_failed(&mut state, &msg).await;
                    }
                    Ok(true) => {
                        let msg = format!("cannot run job {next_id} due to failed parent(s)");
                        self.dequeue_job_as_failed(&mut state, &msg).await;
                    }
                    Ok(false) => self.dequeue_and_run(&mut state),
                },
            }
        }
    }

    /// Admit the queue head: register it and spawn its worker.
    fn dequeue_and_run(&self, state: &mut QueueState) {
        let Ok(QueuedJob { worker, initial }) = state.queue.dequeue() else {
            return;
        };
        state.deps.remove(initial.id());
        tracing::info!(
            utilization =
                self.num_unfinished_jobs() as f32 / self.conf.max_num_concurrent_jobs as f32,
            job_id = initial.id(),
            job_type = initial.job_type(),
            corpus = initial.corpus_id(),
            "Dequeued a new job"
        );
        let update_tx = self.register_job(initial);
        tokio::spawn(worker(update_tx));
    }

    /// Dequeue the head as failed without invoking its worker, keeping
    /// the regular register → update → finish lifecycle observable.
    async fn dequeue_job_as_failed(&self, state: &mut QueueState, err: &str) {
        let Ok(QueuedJob { initial, .. }) = state.queue.dequeue() else {
            return;
        };
        state.deps.remove(initial.id());
        let failed = initial.with_error(err);
        tracing::error!(job_id = failed.id(), error = err, "Dequeued job as failed");
        let update_tx = self.register_job(failed.clone());
        let _ = update_tx.send(failed.as_finished()).await;
        // Dropping the sender closes the channel, which emits the
        // finish event.
    }

    // -- registration & fan-in ---------------------------------------------

    /// Add a job to the job table and return its update channel.
    ///
    /// A background pump forwards every descriptor from the channel to
    /// the table-update channel and emits a finish event once the
    /// worker drops its sender.
    pub fn register_job(&self, job: JobInfo) -> JobUpdateSender {
        {
            let mut detached = self.detached_jobs.lock().expect("detached lock");
            if detached.remove(job.id()).is_some() {
                tracing::info!(job_id = job.id(), "Registering again a detached job");
            }
        }
        let job_id = job.id().to_string();
        self.job_list
            .lock()
            .expect("job list lock")
            .insert(job_id.clone(), job);

        let (tx, mut rx) = mpsc::channel::<JobInfo>(UPDATE_CHANNEL_CAPACITY);
        let table = self.table_update.clone();
        tokio::spawn(async move {
            let mut last: Option<JobInfo> = None;
            while let Some(item) = rx.recv().await {
                if table
                    .send(TableUpdate::Update {
                        id: job_id.clone(),
                        data: item.clone(),
                    })
                    .await
                    .is_err()
                {
                    return; // consumer gone, scheduler is shutting down
                }
                last = Some(item);
            }
            let _ = table.send(TableUpdate::Finish { id: job_id, last }).await;
        });
        tx
    }

    // -- table consumer -----------------------------------------------------

    async fn run_table_consumer(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<TableUpdate>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                update = rx.recv() => match update {
                    Some(update) => self.apply_table_update(update).await,
                    None => break,
                },
            }
        }
    }

    async fn apply_table_update(&self, update: TableUpdate) {
        match update {
            TableUpdate::Update { id, data } => {
                let mut list = self.job_list.lock().expect("job list lock");
                let merged = match list.get(&id) {
                    // A finished entry is never downgraded by a late update.
                    Some(curr) if curr.is_finished() && !data.is_finished() => return,
                    // Errors are sticky: keep the stored error if the new
                    // descriptor comes without one.
                    Some(curr) if curr.error().is_some() && data.error().is_none() => {
                        data.with_error(curr.error().expect("checked above"))
                    }
                    _ => data,
                };
                list.insert(id, merged);
            }

            TableUpdate::Finish { id, last } => {
                let finished = {
                    let mut list = self.job_list.lock().expect("job list lock");
                    match list.get(&id) {
                        Some(entry) => {
                            let finished = entry.as_finished();
                            list.insert(id.clone(), finished.clone());
                            Some(finished)
                        }
                        None => None,
                    }
                };
                let Some(finished) = finished else {
                    tracing::warn!(job_id = id, "Finish event for unknown job");
                    return;
                };

                let was_failure = finished.error().is_some();
                self.queue
                    .lock()
                    .await
                    .deps
                    .set_parent_finished(&id, was_failure);

                if let Some(last) = &last {
                    let duration_secs =
                        (Utc::now() - last.start_dt()).num_milliseconds() as f64 / 1000.0;
                    tracing::info!(job_id = id, duration = duration_secs, "Job finished");
                } else {
                    tracing::info!(job_id = id, "Job finished");
                }

                let recipients = self
                    .recipients
                    .lock()
                    .expect("recipients lock")
                    .get(&id)
                    .cloned();
                if let (Some(recipients), Some(notifier)) = (recipients, &self.notifier) {
                    if !recipients.is_empty() {
                        let notification = notify::compose(
                            &self.lang,
                            notifier.config().signature.as_deref(),
                            &finished,
                            recipients,
                        );
                        notify::dispatch(Arc::clone(notifier), notification);
                    }
                }
            }

            TableUpdate::ClearOld => {
                let ttl = chrono::Duration::seconds(self.conf.finished_job_ttl_secs as i64);
                let now = Utc::now();
                let mut list = self.job_list.lock().expect("job list lock");
                let before = list.len();
                list.retain(|_, job| !(job.is_finished() && now - job.update_dt() > ttl));
                let removed = before - list.len();
                if removed > 0 {
                    tracing::info!(removed, "Cleared old finished jobs");
                }
            }
        }
    }

    async fn run_clear_ticker(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(CLEAR_TICK);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.table_update.send(TableUpdate::ClearOld).await;
                }
            }
        }
    }

    // -- shutdown -----------------------------------------------------------

    async fn snapshot_on_shutdown(self: Arc<Self>, cancel: CancellationToken) {
        cancel.cancelled().await;
        match &self.conf.status_data_path {
            Some(path) => {
                let unfinished = self.job_list_snapshot(true);
                tracing::info!(
                    path = %path.display(),
                    jobs = unfinished.len(),
                    "Saving job state"
                );
                if let Err(e) = snapshot::save_job_list(path, &unfinished) {
                    tracing::error!(error = %e, "Failed to save job state");
                }
            }
            None => {
                tracing::warn!("No status file specified, discarding job list");
            }
        }
        self.shutdown_complete.notify_one();
    }

    /// Resolves once the shutdown snapshot has been handled after the
    /// ambient cancellation fired.
    pub async fn wait_shutdown_complete(&self) {
        self.shutdown_complete.notified().await;
    }

    // -- queries ------------------------------------------------------------

    /// Number of jobs in the table not yet marked finished.
    pub fn num_unfinished_jobs(&self) -> usize {
        self.job_list
            .lock()
            .expect("job list lock")
            .values()
            .filter(|job| !job.is_finished())
            .count()
    }

    /// Snapshot of the job table, newest first.
    pub fn job_list_snapshot(&self, unfinished_only: bool) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .job_list
            .lock()
            .expect("job list lock")
            .values()
            .filter(|job| !unfinished_only || !job.is_finished())
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.start_dt().cmp(&a.start_dt()));
        jobs
    }

    pub fn get_job(&self, job_id: &str) -> Option<JobInfo> {
        self.job_list
            .lock()
            .expect("job list lock")
            .get(job_id)
            .cloned()
    }

    /// The oldest-started unfinished job matching corpus and type.
    /// Used by handlers to coalesce re-submissions.
    pub fn last_unfinished_job_of_type(&self, corpus_id: &str, job_type: &str) -> Option<JobInfo> {
        self.job_list
            .lock()
            .expect("job list lock")
            .values()
            .filter(|job| {
                job.corpus_id() == corpus_id && job.job_type() == job_type && !job.is_finished()
            })
            .min_by_key(|job| job.start_dt())
            .cloned()
    }

    /// Scheduler load for the utilization endpoint.
    pub async fn utilization(&self) -> Utilization {
        let current = self.num_unfinished_jobs();
        Utilization {
            max_num_concurrent_jobs: self.conf.max_num_concurrent_jobs,
            current_running_jobs: current,
            utilization: current as f32 / self.conf.max_num_concurrent_jobs as f32,
            job_queue_length: self.queue.lock().await.queue.size(),
        }
    }

    // -- external controls --------------------------------------------------

    /// Publish a stop request for the given job. Workers observe the
    /// stop channel cooperatively; nothing is forcibly terminated.
    pub fn stop_job(&self, job_id: &str) -> Result<JobInfo, JobsError> {
        let job = self
            .get_job(job_id)
            .ok_or_else(|| JobsError::NoSuchJob(job_id.to_string()))?;
        // An error only means there is no worker subscribed right now.
        let _ = self.job_stop.send(job_id.to_string());
        Ok(job)
    }

    /// Remove a finished job from the table and return it. The job's
    /// notification roster is dropped with it.
    pub fn clear_if_finished(&self, job_id: &str) -> Result<JobInfo, JobsError> {
        let removed = {
            let mut list = self.job_list.lock().expect("job list lock");
            match list.get(job_id) {
                None => return Err(JobsError::NoSuchJob(job_id.to_string())),
                Some(job) if !job.is_finished() => {
                    return Err(JobsError::NotFinished(job_id.to_string()))
                }
                Some(_) => list.remove(job_id).expect("present"),
            }
        };
        self.recipients
            .lock()
            .expect("recipients lock")
            .remove(job_id);
        Ok(removed)
    }

    /// Check the restart cap for a job a caller wants to re-submit.
    pub fn allows_restart(&self, job: &JobInfo) -> Result<(), JobsError> {
        if job.num_restarts() >= self.conf.max_num_restarts {
            return Err(JobsError::RestartCapReached(job.id().to_string()));
        }
        Ok(())
    }

    // -- detached jobs ------------------------------------------------------

    /// Jobs recovered from the status snapshot and not yet re-attached.
    pub fn detached_jobs(&self) -> Vec<JobInfo> {
        self.detached_jobs
            .lock()
            .expect("detached lock")
            .values()
            .cloned()
            .collect()
    }

    pub fn get_detached_job(&self, job_id: &str) -> Option<JobInfo> {
        self.detached_jobs
            .lock()
            .expect("detached lock")
            .get(job_id)
            .cloned()
    }

    /// Drop a detached job. Returns whether it existed.
    pub fn clear_detached_job(&self, job_id: &str) -> bool {
        self.detached_jobs
            .lock()
            .expect("detached lock")
            .remove(job_id)
            .is_some()
    }

    // -- notification roster ------------------------------------------------

    /// Register a recipient for the job's finish notification.
    /// Duplicate addresses are suppressed.
    pub fn add_notification(&self, job_id: &str, address: &str) -> Result<(), JobsError> {
        self.require_job(job_id)?;
        let mut recipients = self.recipients.lock().expect("recipients lock");
        let entry = recipients.entry(job_id.to_string()).or_default();
        if !entry.iter().any(|a| a == address) {
            entry.push(address.to_string());
        }
        Ok(())
    }

    /// Unregister a recipient. A missing address is not an error.
    pub fn remove_notification(&self, job_id: &str, address: &str) -> Result<(), JobsError> {
        self.require_job(job_id)?;
        let mut recipients = self.recipients.lock().expect("recipients lock");
        if let Some(entry) = recipients.get_mut(job_id) {
            entry.retain(|a| a != address);
        }
        Ok(())
    }

    /// Whether the address is registered for the job.
    pub fn check_notification(&self, job_id: &str, address: &str) -> Result<bool, JobsError> {
        self.require_job(job_id)?;
        let recipients = self.recipients.lock().expect("recipients lock");
        Ok(recipients
            .get(job_id)
            .map(|entry| entry.iter().any(|a| a == address))
            .unwrap_or(false))
    }

    /// All registered recipients for the job.
    pub fn get_notifications(&self, job_id: &str) -> Result<Vec<String>, JobsError> {
        self.require_job(job_id)?;
        let recipients = self.recipients.lock().expect("recipients lock");
        Ok(recipients.get(job_id).cloned().unwrap_or_default())
    }

    fn require_job(&self, job_id: &str) -> Result<(), JobsError> {
        if self.job_list.lock().expect("job list lock").contains_key(job_id) {
            Ok(())
        } else {
            Err(JobsError::NoSuchJob(job_id.to_string()))
        }
    }
}
