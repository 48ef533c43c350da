//! Job-finish email notifications.
//!
//! When a job with a non-empty notification roster finishes, the table
//! consumer composes a localized message and hands it to the mailer.
//! Mailer failures are logged and never re-raised into the worker or
//! the HTTP caller.

use std::sync::Arc;

use corvus_events::{EmailNotifier, Notification};

use crate::info::JobInfo;
use crate::locale;

/// Compose the finish notification for `job` in the given language.
pub fn compose(lang: &str, signature: Option<&str>, job: &JobInfo, recipients: Vec<String>) -> Notification {
    let job_desc = locale::job_type_description(lang, job.job_type());
    let subject = locale::finished_subject(lang, &job_desc);
    let sign = signature
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| locale::default_signature(lang));
    Notification {
        paragraphs: vec![
            subject.clone(),
            format!("Job ID: {}", job.id()),
            locale::localized_status(lang, job),
            String::new(),
            String::new(),
            sign,
        ],
        subject,
        recipients,
    }
}

/// Send the notification on a background task; failures are logged.
pub fn dispatch(notifier: Arc<EmailNotifier>, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            tracing::error!(
                error = %e,
                mail_subject = %notification.subject,
                "Failed to send finished job notification"
            );
        }
    });
}
