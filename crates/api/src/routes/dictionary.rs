//! Route definitions for the `/dictionary` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::dictionary;
use crate::state::AppState;

/// Routes mounted at `/dictionary/{corpusId}`.
///
/// ```text
/// POST /dictionary/{corpusId}/ngrams                    -> generate_ngrams
/// GET  /dictionary/{corpusId}/search/{term}             -> search
/// GET  /dictionary/{corpusId}/similarARFWords/{term}    -> similar_arf
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/dictionary/{corpusId}/ngrams",
            post(dictionary::generate_ngrams),
        )
        .route(
            "/dictionary/{corpusId}/search/{term}",
            get(dictionary::search),
        )
        .route(
            "/dictionary/{corpusId}/similarARFWords/{term}",
            get(dictionary::similar_arf),
        )
}
