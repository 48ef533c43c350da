use std::path::PathBuf;

/// Default admission ceiling for concurrently running jobs.
const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Default cap on job restarts enforced by [`allows_restart`].
///
/// [`allows_restart`]: crate::manager::JobManager::allows_restart
const DEFAULT_MAX_NUM_RESTARTS: u32 = 2;

/// Default TTL for finished jobs kept in the job table.
const DEFAULT_FINISHED_JOB_TTL_SECS: u64 = 3600;

/// Configuration of the job engine.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Admission ceiling: at most this many unfinished jobs at a time.
    pub max_num_concurrent_jobs: usize,
    /// Cap enforced when a caller asks to restart a job.
    pub max_num_restarts: u32,
    /// Where unfinished jobs are snapshotted on shutdown. `None` disables
    /// persistence (a warning is logged and the list is discarded).
    pub status_data_path: Option<PathBuf>,
    /// Finished jobs older than this are pruned by the hourly cleanup.
    pub finished_job_ttl_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_num_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            max_num_restarts: DEFAULT_MAX_NUM_RESTARTS,
            status_data_path: None,
            finished_job_ttl_secs: DEFAULT_FINISHED_JOB_TTL_SECS,
        }
    }
}

impl JobsConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `MAX_NUM_CONCURRENT_JOBS` | `4`     |
    /// | `MAX_NUM_RESTARTS`        | `2`     |
    /// | `STATUS_DATA_PATH`        | unset   |
    /// | `FINISHED_JOB_TTL_SECS`   | `3600`  |
    pub fn from_env() -> Self {
        let dflt = Self::default();
        Self {
            max_num_concurrent_jobs: std::env::var("MAX_NUM_CONCURRENT_JOBS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(dflt.max_num_concurrent_jobs),
            max_num_restarts: std::env::var("MAX_NUM_RESTARTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(dflt.max_num_restarts),
            status_data_path: std::env::var("STATUS_DATA_PATH").ok().map(PathBuf::from),
            finished_job_ttl_secs: std::env::var("FINISHED_JOB_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(dflt.finished_job_ttl_secs),
        }
    }
}
