//! Job descriptors.
//!
//! A job's status is a tagged variant: each job type carries its own
//! args and result payload next to a shared set of identity fields. The
//! scheduler itself never looks inside the payloads; it only uses the
//! shared accessors defined on [`JobInfo`].
//!
//! The wire and snapshot representation is discriminated by the
//! `jobType` field, so a status file written by one version of the
//! service can be loaded by another (unknown type tags are skipped on
//! load, see [`crate::snapshot`]).

use chrono::Utc;
use corvus_core::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Type tag of live-attribute build jobs.
pub const JOB_TYPE_LIVEATTRS: &str = "liveattrs";

/// Type tag of n-gram frequency dictionary jobs.
pub const JOB_TYPE_NGRAM_GENERATION: &str = "ngram-generation";

// ---------------------------------------------------------------------------
// Shared record
// ---------------------------------------------------------------------------

/// Fields common to every job type plus the type-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord<A, R> {
    pub id: String,
    pub corpus_id: String,
    pub start: Timestamp,
    pub update: Timestamp,
    pub finished: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub num_restarts: u32,
    pub args: A,
    #[serde(default)]
    pub result: Option<R>,
}

impl<A, R> JobRecord<A, R> {
    /// A fresh unfinished record with a random ID and `start` = now.
    pub fn new(corpus_id: impl Into<String>, args: A) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            corpus_id: corpus_id.into(),
            start: now,
            update: now,
            finished: false,
            error: None,
            num_restarts: 0,
            args,
            result: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Arguments of a live-attribute build job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAttrsArgs {
    /// Aligned corpora whose entries are ingested along with the primary.
    #[serde(default)]
    pub aligned: Vec<String>,
    /// Append to existing data instead of replacing it.
    #[serde(default)]
    pub append: bool,
}

/// Progress/result payload of a live-attribute build job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAttrsResult {
    pub processed_atoms: u64,
    pub inserted_entries: u64,
}

/// Arguments of an n-gram generation job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgramArgs {
    pub ngram_size: i32,
    #[serde(default)]
    pub append: bool,
}

/// Progress/result payload of an n-gram generation job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NgramResult {
    pub processed_rows: u64,
    pub total_rows: u64,
}

// ---------------------------------------------------------------------------
// JobInfo
// ---------------------------------------------------------------------------

/// Status descriptor of a single job, tagged by job type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "jobType")]
pub enum JobInfo {
    #[serde(rename = "liveattrs")]
    LiveAttrs(JobRecord<LiveAttrsArgs, LiveAttrsResult>),
    #[serde(rename = "ngram-generation")]
    NgramGeneration(JobRecord<NgramArgs, NgramResult>),
}

/// Dispatch an expression over the shared record of any variant.
macro_rules! with_record {
    ($info:expr, $rec:ident => $body:expr) => {
        match $info {
            JobInfo::LiveAttrs($rec) => $body,
            JobInfo::NgramGeneration($rec) => $body,
        }
    };
}

impl JobInfo {
    pub fn id(&self) -> &str {
        with_record!(self, r => &r.id)
    }

    pub fn job_type(&self) -> &'static str {
        match self {
            JobInfo::LiveAttrs(_) => JOB_TYPE_LIVEATTRS,
            JobInfo::NgramGeneration(_) => JOB_TYPE_NGRAM_GENERATION,
        }
    }

    pub fn corpus_id(&self) -> &str {
        with_record!(self, r => &r.corpus_id)
    }

    pub fn start_dt(&self) -> Timestamp {
        with_record!(self, r => r.start)
    }

    pub fn update_dt(&self) -> Timestamp {
        with_record!(self, r => r.update)
    }

    pub fn is_finished(&self) -> bool {
        with_record!(self, r => r.finished)
    }

    pub fn error(&self) -> Option<&str> {
        with_record!(self, r => r.error.as_deref())
    }

    pub fn num_restarts(&self) -> u32 {
        with_record!(self, r => r.num_restarts)
    }

    /// A copy with the given error attached and `update` touched.
    pub fn with_error(&self, err: impl Into<String>) -> Self {
        let mut copy = self.clone();
        with_record!(&mut copy, r => {
            r.error = Some(err.into());
            r.update = Utc::now();
        });
        copy
    }

    /// A copy marked finished, with `update` set to the finish time.
    pub fn as_finished(&self) -> Self {
        let mut copy = self.clone();
        with_record!(&mut copy, r => {
            r.finished = true;
            r.update = Utc::now();
        });
        copy
    }

    /// A copy with the restart counter bumped (used when a detached job
    /// is re-submitted).
    pub fn with_bumped_restarts(&self) -> Self {
        let mut copy = self.clone();
        with_record!(&mut copy, r => r.num_restarts += 1);
        copy
    }

    /// The compact, type-independent projection.
    pub fn compact(&self) -> JobInfoCompact {
        JobInfoCompact {
            id: self.id().to_string(),
            job_type: self.job_type().to_string(),
            corpus_id: self.corpus_id().to_string(),
            start: self.start_dt(),
            update: self.update_dt(),
            finished: self.is_finished(),
            ok: self.error().is_none(),
        }
    }

    /// The full projection as a JSON value (includes type-specific
    /// args/result and the `jobType` discriminator).
    pub fn full_info(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("job descriptor serializes")
    }
}

// ---------------------------------------------------------------------------
// Compact projection
// ---------------------------------------------------------------------------

/// Unified job representation without type-specific details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfoCompact {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub corpus_id: String,
    pub start: Timestamp,
    pub update: Timestamp,
    pub finished: bool,
    pub ok: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn liveattrs_job(corpus: &str) -> JobInfo {
        JobInfo::LiveAttrs(JobRecord::new(corpus, LiveAttrsArgs::default()))
    }

    #[test]
    fn new_record_is_unfinished_without_error() {
        let job = liveattrs_job("syn2020");
        assert!(!job.is_finished());
        assert!(job.error().is_none());
        assert_eq!(job.corpus_id(), "syn2020");
        assert_eq!(job.job_type(), JOB_TYPE_LIVEATTRS);
    }

    #[test]
    fn with_error_keeps_identity() {
        let job = liveattrs_job("syn2020");
        let failed = job.with_error("boom");
        assert_eq!(failed.id(), job.id());
        assert_eq!(failed.error(), Some("boom"));
        assert!(!failed.is_finished());
    }

    #[test]
    fn as_finished_preserves_error() {
        let job = liveattrs_job("syn2020").with_error("boom");
        let done = job.as_finished();
        assert!(done.is_finished());
        assert_eq!(done.error(), Some("boom"));
    }

    #[test]
    fn serialization_is_tagged_by_job_type() {
        let job = JobInfo::NgramGeneration(JobRecord::new(
            "syn2020",
            NgramArgs {
                ngram_size: 2,
                append: false,
            },
        ));
        let value = job.full_info();
        assert_eq!(value["jobType"], "ngram-generation");
        assert_eq!(value["corpusId"], "syn2020");
        let back: JobInfo = serde_json::from_value(value).unwrap();
        assert_eq!(back.id(), job.id());
    }

    #[test]
    fn compact_projection_reports_ok_flag() {
        let job = liveattrs_job("syn2020");
        assert!(job.compact().ok);
        assert!(!job.with_error("x").compact().ok);
    }
}
