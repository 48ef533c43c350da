/// Error type for the job engine.
#[derive(Debug, thiserror::Error)]
pub enum JobsError {
    /// The job queue has no entries.
    #[error("Job queue is empty")]
    QueueEmpty,

    /// No job with the given ID exists in the job table.
    #[error("No such job: {0}")]
    NoSuchJob(String),

    /// The job exists but has not finished yet.
    #[error("Job {0} has not finished yet")]
    NotFinished(String),

    /// A job cannot depend on itself.
    #[error("Job {0} cannot be its own parent")]
    SelfDependency(String),

    /// The dependency graph is inconsistent for the given child.
    #[error("Job {0} has a dependency record with no parents")]
    InconsistentDependency(String),

    /// The job reached the configured restart cap.
    #[error("Cannot restart job {0}: max. number of restarts reached")]
    RestartCapReached(String),

    /// Reading or writing the status snapshot failed.
    #[error("Snapshot I/O error: {0}")]
    Snapshot(#[from] std::io::Error),

    /// The status snapshot could not be (de)serialized.
    #[error("Snapshot format error: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}
