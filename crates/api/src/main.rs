use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use corvus_api::config::ServerConfig;
use corvus_api::liveattrs::cache::EmptyQueryCache;
use corvus_api::liveattrs::laconf::LiveAttrsBuildConfProvider;
use corvus_api::router::build_app_router;
use corvus_api::state::AppState;
use corvus_events::{EmailConfig, EmailNotifier};
use corvus_jobs::JobManager;

/// Capacity of the cooperative job-stop channel.
const STOP_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corvus_api=debug,corvus_jobs=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = corvus_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    corvus_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    // --- Mailer (optional) ---
    let notifier = EmailConfig::from_env().map(|conf| {
        tracing::info!(smtp_host = %conf.smtp_host, "Email notifications enabled");
        Arc::new(EmailNotifier::new(conf))
    });
    if notifier.is_none() {
        tracing::warn!("SMTP_HOST not set, email notifications disabled");
    }

    // --- Job engine ---
    // Cancelled when the HTTP server stops; this drives the scheduler
    // tickers down and triggers the status snapshot.
    let cancel = CancellationToken::new();
    let (stop_tx, _) = broadcast::channel(STOP_CHANNEL_CAPACITY);
    let jobs = JobManager::new(
        config.jobs.clone(),
        config.language.clone(),
        cancel.clone(),
        stop_tx.clone(),
        notifier,
    );
    tracing::info!(
        max_concurrent = config.jobs.max_num_concurrent_jobs,
        "Job scheduler started"
    );

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        jobs: Arc::clone(&jobs),
        eq_cache: Arc::new(EmptyQueryCache::new()),
        la_conf: Arc::new(LiveAttrsBuildConfProvider::new(config.la_conf_dir.clone())),
        stop_tx,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the scheduler tickers and snapshot unfinished jobs.
    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), jobs.wait_shutdown_complete()).await;
    tracing::info!("Job scheduler stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
