//! Persistence of unfinished jobs across restarts.
//!
//! On shutdown the scheduler serializes every unfinished descriptor to a
//! JSON array at the configured status path. On startup the file is
//! loaded back into the detached-job registry. Entries whose `jobType`
//! tag is not recognized (e.g. written by a newer version) are skipped
//! with a logged error instead of failing the whole load.

use std::path::Path;

use crate::error::JobsError;
use crate::info::JobInfo;

/// Write the given descriptors as a JSON array to `path`.
pub fn save_job_list(path: &Path, jobs: &[JobInfo]) -> Result<(), JobsError> {
    let raw = serde_json::to_vec_pretty(jobs)?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// Load descriptors from `path`, skipping entries with unknown type tags.
pub fn load_job_list(path: &Path) -> Result<Vec<JobInfo>, JobsError> {
    let raw = std::fs::read(path)?;
    let entries: Vec<serde_json::Value> = serde_json::from_slice(&raw)?;
    let mut jobs = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<JobInfo>(entry.clone()) {
            Ok(job) => jobs.push(job),
            Err(e) => {
                tracing::error!(
                    job_type = entry.get("jobType").and_then(|v| v.as_str()).unwrap_or("?"),
                    error = %e,
                    "Skipping unreadable job snapshot entry"
                );
            }
        }
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{JobRecord, LiveAttrsArgs};

    #[test]
    fn round_trip_preserves_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let jobs = vec![
            JobInfo::LiveAttrs(JobRecord::new("syn2020", LiveAttrsArgs::default())),
            JobInfo::LiveAttrs(JobRecord::new("intercorp", LiveAttrsArgs::default()))
                .with_error("boom"),
        ];

        save_job_list(&path, &jobs).unwrap();
        let loaded = load_job_list(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id(), jobs[0].id());
        assert_eq!(loaded[1].error(), Some("boom"));
    }

    #[test]
    fn unknown_type_tags_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let known = JobInfo::LiveAttrs(JobRecord::new("syn2020", LiveAttrsArgs::default()));
        let mixed = serde_json::json!([
            { "jobType": "hologram-render", "id": "x" },
            known.full_info(),
        ]);
        std::fs::write(&path, serde_json::to_vec(&mixed).unwrap()).unwrap();

        let loaded = load_job_list(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), known.id());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_job_list(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, JobsError::Snapshot(_)));
    }
}
