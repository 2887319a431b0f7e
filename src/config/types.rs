use serde::Deserialize;

/// Main configuration structure for shelfwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First listing page of the catalog
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Maximum number of concurrent fetch pipelines (permit pool size)
    pub concurrency: u32,

    /// Maximum number of retries for a failed fetch
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds; attempt n waits base * 2^n
    #[serde(rename = "retry-base-ms", default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of items processed between progress snapshots
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: u32,

    /// User agent string sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    50
}

fn default_user_agent() -> String {
    format!("shelfwatch/{}", env!("CARGO_PKG_VERSION"))
}
