use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::liveattrs::cache::EmptyQueryCache;
use crate::liveattrs::laconf::LiveAttrsBuildConfProvider;

/// Shared application state available to all axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: corvus_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The job scheduler.
    pub jobs: Arc<corvus_jobs::JobManager>,
    /// Cache of empty-query attribute listings.
    pub eq_cache: Arc<EmptyQueryCache>,
    /// Loader/cache of per-corpus build configurations.
    pub la_conf: Arc<LiveAttrsBuildConfProvider>,
    /// Cooperative stop channel; workers subscribe, handlers publish
    /// through the scheduler.
    pub stop_tx: broadcast::Sender<String>,
}
