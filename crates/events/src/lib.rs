//! Outbound notification delivery for the corvus service.
//!
//! Currently a single channel: plain-text email over SMTP. The jobs
//! engine composes a [`Notification`] and hands it to [`EmailNotifier`];
//! transport failures are returned to the caller, which logs them and
//! never re-raises them into job workers.

mod email;

pub use email::{EmailConfig, EmailError, EmailNotifier, Notification};
