use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Args)]
pub struct Config {
    #[command(flatten)]
    pub api: ApiConfig,

    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub retry: RetryConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ApiConfig {
    /// Base URL of the backend REST API (e.g. https://api.example.org/api)
    #[arg(long = "api-url", env = "MISSION_API_URL")]
    pub base_url: Option<String>,

    /// Client-side deadline for a single request in seconds
    #[arg(long, env = "MISSION_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// User agent sent with every request
    #[arg(long, env = "MISSION_USER_AGENT", default_value = concat!("mission-client/", env!("CARGO_PKG_VERSION")))]
    pub user_agent: String,
}

impl ApiConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
    Redis,
}

#[derive(Clone, Debug, Args)]
pub struct StoreConfig {
    /// Where session credentials are persisted
    #[arg(long = "store", env = "MISSION_STORE", value_enum, default_value_t = StoreBackend::File)]
    pub backend: StoreBackend,

    /// Session file used by the file backend
    #[arg(long = "session-file", env = "MISSION_SESSION_FILE", default_value = ".mission-session.json")]
    pub path: PathBuf,

    /// Redis connection URL used by the redis backend
    #[arg(long, env = "MISSION_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Key namespace for the redis backend
    #[arg(long, env = "MISSION_REDIS_KEY", default_value = "mission:session")]
    pub redis_key: String,

    /// Minimum backoff when connecting to redis
    #[arg(long, env = "MISSION_REDIS_MIN_BACKOFF_MS", default_value_t = 100)]
    pub redis_min_backoff_ms: u64,

    /// Maximum backoff when connecting to redis
    #[arg(long, env = "MISSION_REDIS_MAX_BACKOFF_MS", default_value_t = 2_000)]
    pub redis_max_backoff_ms: u64,

    /// Connection attempts before giving up on redis
    #[arg(long, env = "MISSION_REDIS_CONNECT_ATTEMPTS", default_value_t = 3)]
    pub redis_connect_attempts: usize,
}

#[derive(Clone, Debug, Args)]
pub struct RetryConfig {
    /// Total attempts for operations the caller marks as retryable
    #[arg(long = "retry-attempts", env = "MISSION_RETRY_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: usize,

    /// Initial backoff between attempts
    #[arg(long = "retry-min-backoff-ms", env = "MISSION_RETRY_MIN_BACKOFF_MS", default_value_t = 250)]
    pub min_backoff_ms: u64,

    /// Upper bound on backoff between attempts
    #[arg(long = "retry-max-backoff-ms", env = "MISSION_RETRY_MAX_BACKOFF_MS", default_value_t = 5_000)]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, min_backoff_ms: 250, max_backoff_ms: 5_000 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "MISSION_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; telemetry export is disabled when unset
    #[arg(long, env = "MISSION_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Interval between metric exports
    #[arg(long, env = "MISSION_METRICS_EXPORT_INTERVAL_SECS", default_value_t = 60)]
    pub metrics_export_interval_secs: u64,
}
