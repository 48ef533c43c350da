//! Asynchronous job execution engine.
//!
//! Long-running corpus operations (live-attribute builds, n-gram
//! dictionary generation) are triggered over HTTP and must not block the
//! caller. This crate provides the in-process scheduler behind that: a
//! FIFO queue with a bounded concurrency ceiling, parent/child job
//! dependencies with failure propagation, cooperative stop requests,
//! recovery of unfinished jobs from an on-disk snapshot, and email
//! notifications on job completion.
//!
//! All mutations of the job table flow through a single update channel
//! consumed by one task, so readers always observe a job's updates in
//! the order its worker produced them.

pub mod config;
pub mod deps;
pub mod error;
pub mod info;
pub mod manager;
pub mod notify;
pub mod queue;
pub mod snapshot;

mod locale;

pub use config::JobsConfig;
pub use error::JobsError;
pub use info::{
    JobInfo, JobInfoCompact, LiveAttrsArgs, LiveAttrsResult, NgramArgs, NgramResult,
    JOB_TYPE_LIVEATTRS, JOB_TYPE_NGRAM_GENERATION,
};
pub use manager::{JobManager, Utilization};
pub use queue::{JobUpdateSender, JobWorker};
