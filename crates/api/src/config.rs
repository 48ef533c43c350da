use std::path::PathBuf;

use corvus_jobs::JobsConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Language tag used for localized notification texts (default: `en`).
    pub language: String,
    /// Directory holding per-corpus live-attribute build configurations.
    pub la_conf_dir: PathBuf,
    /// Directory with extracted atom record files consumed by
    /// live-attribute build jobs (`{corpus}.jsonl`).
    pub data_dir: PathBuf,
    /// Job engine configuration.
    pub jobs: JobsConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default          |
    /// |------------------------|------------------|
    /// | `HOST`                 | `0.0.0.0`        |
    /// | `PORT`                 | `3000`           |
    /// | `CORS_ORIGINS`         | (none)           |
    /// | `REQUEST_TIMEOUT_SECS` | `30`             |
    /// | `LANGUAGE`             | `en`             |
    /// | `LA_CONF_DIR`          | `./conf/liveattrs` |
    /// | `DATA_DIR`             | `./data`         |
    ///
    /// Job engine variables are documented on [`JobsConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let language = std::env::var("LANGUAGE").unwrap_or_else(|_| "en".into());

        let la_conf_dir = std::env::var("LA_CONF_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./conf/liveattrs"));

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            language,
            la_conf_dir,
            data_dir,
            jobs: JobsConfig::from_env(),
        }
    }
}
