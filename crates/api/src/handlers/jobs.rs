//! Handlers for the `/jobs` resource.
//!
//! Job descriptors are returned bare: either the full type-specific
//! projection or, with `compact=1`, the unified compact one. Detached
//! jobs (recovered from a previous run's snapshot) are part of the
//! listing but never run until re-attached.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use corvus_jobs::{JobInfo, JobsError};

use crate::error::AppResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Query flags shared by the listing and detail endpoints; flags follow
/// the `?compact=1` convention.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobViewQuery {
    #[serde(default)]
    pub unfinished_only: Option<String>,
    #[serde(default)]
    pub compact: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("1")
}

/// Response body of roster mutations.
#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    pub registered: bool,
}

// ---------------------------------------------------------------------------
// Listing & detail
// ---------------------------------------------------------------------------

/// GET /jobs
///
/// Lists known jobs (live and detached), newest first. `unfinishedOnly=1`
/// filters; `compact=1` selects the unified projection.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobViewQuery>,
) -> AppResult<impl IntoResponse> {
    let mut jobs = state.jobs.job_list_snapshot(flag(&params.unfinished_only));
    jobs.extend(state.jobs.detached_jobs());
    jobs.sort_by(|a, b| b.start_dt().cmp(&a.start_dt()));

    if flag(&params.compact) {
        let compact: Vec<_> = jobs.iter().map(JobInfo::compact).collect();
        Ok(Json(compact).into_response())
    } else {
        let full: Vec<_> = jobs.iter().map(JobInfo::full_info).collect();
        Ok(Json(full).into_response())
    }
}

fn find_job(state: &AppState, job_id: &str) -> Result<JobInfo, JobsError> {
    state
        .jobs
        .get_job(job_id)
        .or_else(|| state.jobs.get_detached_job(job_id))
        .ok_or_else(|| JobsError::NoSuchJob(job_id.to_string()))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<JobViewQuery>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state, &job_id)?;
    if flag(&params.compact) {
        Ok(Json(job.compact()).into_response())
    } else {
        Ok(Json(job.full_info()).into_response())
    }
}

// ---------------------------------------------------------------------------
// Stop & clear
// ---------------------------------------------------------------------------

/// DELETE /jobs/{id}
///
/// Publishes a cooperative stop request and responds with the job's
/// current descriptor; the worker is never forcibly terminated.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.stop_job(&job_id)?;
    tracing::info!(job_id, "Job stop requested");
    Ok(Json(job.full_info()))
}

/// GET /jobs/{id}/clearIfFinished
pub async fn clear_if_finished(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.clear_if_finished(&job_id)?;
    Ok(Json(json!({
        "removed": true,
        "jobInfo": job.full_info(),
    })))
}

// ---------------------------------------------------------------------------
// Detached jobs
// ---------------------------------------------------------------------------

/// GET /jobs/detached
pub async fn list_detached_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs: Vec<_> = state
        .jobs
        .detached_jobs()
        .iter()
        .map(JobInfo::full_info)
        .collect();
    Ok(Json(jobs))
}

/// DELETE /jobs/{id}/detached
pub async fn clear_detached_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    if !state.jobs.clear_detached_job(&job_id) {
        return Err(JobsError::NoSuchJob(job_id).into());
    }
    Ok(Json(json!({ "removed": true })))
}

// ---------------------------------------------------------------------------
// Email notification roster
// ---------------------------------------------------------------------------

/// PUT /jobs/{id}/emailNotification/{address}
pub async fn add_notification(
    State(state): State<AppState>,
    Path((job_id, address)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    state.jobs.add_notification(&job_id, &address)?;
    Ok(Json(RegisteredResponse { registered: true }))
}

/// GET /jobs/{id}/emailNotification/{address}
///
/// 200 with `registered: true` when the address is on the roster,
/// 404 with `registered: false` otherwise.
pub async fn check_notification(
    State(state): State<AppState>,
    Path((job_id, address)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let registered = state.jobs.check_notification(&job_id, &address)?;
    let status = if registered {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::NOT_FOUND
    };
    Ok((status, Json(RegisteredResponse { registered })))
}

/// DELETE /jobs/{id}/emailNotification/{address}
pub async fn remove_notification(
    State(state): State<AppState>,
    Path((job_id, address)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    state.jobs.remove_notification(&job_id, &address)?;
    Ok(Json(RegisteredResponse { registered: false }))
}

/// GET /jobs/{id}/emailNotification
pub async fn get_notifications(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let recipients = state.jobs.get_notifications(&job_id)?;
    Ok(Json(json!({ "recipients": recipients })))
}

// ---------------------------------------------------------------------------
// Utilization
// ---------------------------------------------------------------------------

/// GET /jobs/utilization
pub async fn utilization(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.jobs.utilization().await))
}
