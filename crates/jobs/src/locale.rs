//! Localized texts for job-finish notifications.
//!
//! Two languages are supported, mirroring the deployments this service
//! targets. Unknown language tags fall back to English.

use crate::info::{JobInfo, JOB_TYPE_LIVEATTRS, JOB_TYPE_NGRAM_GENERATION};

/// Human-readable description of a job type.
pub fn job_type_description(lang: &str, job_type: &str) -> String {
    match (lang, job_type) {
        ("cs", JOB_TYPE_LIVEATTRS) => "generování dat pro živé atributy".to_string(),
        (_, JOB_TYPE_LIVEATTRS) => "live attributes data generation".to_string(),
        ("cs", JOB_TYPE_NGRAM_GENERATION) => {
            "generování n-gramových frekvenčních dat".to_string()
        }
        (_, JOB_TYPE_NGRAM_GENERATION) => "n-gram frequency data generation".to_string(),
        ("cs", other) => format!("úloha typu \"{other}\""),
        (_, other) => format!("job of type \"{other}\""),
    }
}

/// Subject line of the finish notification.
pub fn finished_subject(lang: &str, job_desc: &str) -> String {
    match lang {
        "cs" => format!("Úloha „{job_desc}“ dokončena"),
        _ => format!("Job of type \"{job_desc}\" finished"),
    }
}

/// One-line job status used in the notification body.
pub fn localized_status(lang: &str, job: &JobInfo) -> String {
    match (lang, job.error()) {
        ("cs", Some(err)) => format!("Úloha skončila s chybou: {err}"),
        (_, Some(err)) => format!("The job has finished with error: {err}"),
        ("cs", None) => "Úloha byla úspěšně dokončena".to_string(),
        (_, None) => "The job has finished successfully".to_string(),
    }
}

/// Signature block used when no custom signature is configured.
pub fn default_signature(lang: &str) -> String {
    match lang {
        "cs" => "Služba corvus – správa metadat korpusů".to_string(),
        _ => "The corvus corpus metadata service".to_string(),
    }
}
