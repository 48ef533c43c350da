//! Route definitions for the `/jobs` resource.

use axum::routing::{delete, get, put};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /jobs                                  -> list_jobs
/// GET    /jobs/utilization                      -> utilization
/// GET    /jobs/detached                         -> list_detached_jobs
/// GET    /jobs/{id}                             -> get_job
/// DELETE /jobs/{id}                             -> delete_job (stop request)
/// DELETE /jobs/{id}/detached                    -> clear_detached_job
/// GET    /jobs/{id}/clearIfFinished             -> clear_if_finished
/// GET    /jobs/{id}/emailNotification           -> get_notifications
/// PUT    /jobs/{id}/emailNotification/{addr}    -> add_notification
/// GET    /jobs/{id}/emailNotification/{addr}    -> check_notification
/// DELETE /jobs/{id}/emailNotification/{addr}    -> remove_notification
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/utilization", get(jobs::utilization))
        .route("/jobs/detached", get(jobs::list_detached_jobs))
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/jobs/{id}/detached", delete(jobs::clear_detached_job))
        .route("/jobs/{id}/clearIfFinished", get(jobs::clear_if_finished))
        .route("/jobs/{id}/emailNotification", get(jobs::get_notifications))
        .route(
            "/jobs/{id}/emailNotification/{address}",
            put(jobs::add_notification)
                .get(jobs::check_notification)
                .delete(jobs::remove_notification),
        )
}
