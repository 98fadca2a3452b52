use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "ENCORE_DATABASE_URL")]
    pub database_url: String,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub poll: PollConfig,

    #[command(flatten)]
    pub presence: PresenceConfig,

    #[command(flatten)]
    pub typing: TypingConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "ENCORE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "ENCORE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management (health probe) listener
    #[arg(long, env = "ENCORE_MGMT_PORT", default_value_t = 3001)]
    pub mgmt_port: u16,

    /// How long to wait for background tasks during shutdown
    #[arg(long, env = "ENCORE_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "ENCORE_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Shared secret for verifying JWTs issued by the platform identity service
    #[arg(long, env = "ENCORE_JWT_SECRET")]
    pub jwt_secret: String,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed per client IP
    #[arg(long, env = "ENCORE_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance per client IP
    #[arg(long, env = "ENCORE_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct PollConfig {
    /// Minimum interval between polls from the same user
    #[arg(long, env = "ENCORE_POLL_MIN_INTERVAL_MS", default_value_t = 10_000)]
    pub min_interval_ms: u64,

    /// Poll gate entries idle longer than this are purged
    #[arg(long, env = "ENCORE_POLL_GATE_IDLE_MS", default_value_t = 60_000)]
    pub gate_idle_ms: u64,

    /// How often the poll gate sweeper runs
    #[arg(long, env = "ENCORE_POLL_GATE_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub gate_sweep_interval_secs: u64,

    /// Default sync watermark lookback when the client omits `since`
    #[arg(long, env = "ENCORE_POLL_DEFAULT_LOOKBACK_SECS", default_value_t = 30)]
    pub default_lookback_secs: i64,

    /// Oldest watermark accepted; earlier values are clamped to bound query cost
    #[arg(long, env = "ENCORE_POLL_MAX_LOOKBACK_SECS", default_value_t = 300)]
    pub max_lookback_secs: i64,

    /// Default page size for message history
    #[arg(long, env = "ENCORE_PAGE_SIZE_DEFAULT", default_value_t = 50)]
    pub default_page_size: i64,

    /// Maximum page size for message history
    #[arg(long, env = "ENCORE_PAGE_SIZE_MAX", default_value_t = 100)]
    pub max_page_size: i64,
}

#[derive(Clone, Debug, Args)]
pub struct PresenceConfig {
    /// A user is reported offline once their last heartbeat is older than this
    #[arg(long, env = "ENCORE_PRESENCE_ONLINE_CUTOFF_MS", default_value_t = 120_000)]
    pub online_cutoff_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct TypingConfig {
    /// Typing entries older than this are dropped on every read or write
    #[arg(long, env = "ENCORE_TYPING_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct StorageConfig {
    /// S3 bucket name for attachment blobs
    #[arg(long, env = "ENCORE_S3_BUCKET")]
    pub bucket: String,

    /// S3 region
    #[arg(long, env = "ENCORE_S3_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Custom S3 endpoint (useful for MinIO)
    #[arg(long, env = "ENCORE_S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// S3 access key
    #[arg(long, env = "ENCORE_S3_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// S3 secret key
    #[arg(long, env = "ENCORE_S3_SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Force path style (required for many MinIO setups: http://host/bucket/key)
    #[arg(long, env = "ENCORE_S3_FORCE_PATH_STYLE", default_value_t = false)]
    pub force_path_style: bool,

    /// Public base URL embedded in attachment records; falls back to the bucket URL
    #[arg(long, env = "ENCORE_S3_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Max attachment size in bytes (Default: 10MiB)
    #[arg(long, env = "ENCORE_ATTACHMENT_MAX_SIZE_BYTES", default_value_t = 10_485_760)]
    pub attachment_max_size_bytes: usize,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the readiness database check
    #[arg(long, env = "ENCORE_HEALTH_DB_TIMEOUT_MS", default_value_t = 2000)]
    pub db_timeout_ms: u64,

    /// Timeout for the readiness storage check
    #[arg(long, env = "ENCORE_HEALTH_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    pub storage_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces and metrics; telemetry export is disabled when unset
    #[arg(long, env = "ENCORE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "ENCORE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
