//! Route definitions for the `/liveAttributes` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::liveattrs;
use crate::state::AppState;

/// Routes mounted at `/liveAttributes/{corpusId}`.
///
/// ```text
/// POST   /liveAttributes/{corpusId}/query         -> query
/// POST   /liveAttributes/{corpusId}/data          -> create_data (enqueue build)
/// DELETE /liveAttributes/{corpusId}/data          -> delete_data
/// GET    /liveAttributes/{corpusId}/conf          -> get_conf
/// PUT    /liveAttributes/{corpusId}/conf          -> put_conf
/// POST   /liveAttributes/{corpusId}/mixSubcorpus  -> mix_subcorpus
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/liveAttributes/{corpusId}/query", post(liveattrs::query))
        .route(
            "/liveAttributes/{corpusId}/data",
            post(liveattrs::create_data).delete(liveattrs::delete_data),
        )
        .route(
            "/liveAttributes/{corpusId}/conf",
            get(liveattrs::get_conf).put(liveattrs::put_conf),
        )
        .route(
            "/liveAttributes/{corpusId}/mixSubcorpus",
            post(liveattrs::mix_subcorpus),
        )
}
