pub mod dictionary;
pub mod health;
pub mod jobs;
pub mod liveattrs;

use axum::Router;

use crate::state::AppState;

/// All resource routes (health is mounted separately at the root).
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(jobs::router())
        .merge(liveattrs::router())
        .merge(dictionary::router())
}
