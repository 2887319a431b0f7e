//! Shelfwatch: a book-catalog harvester with change tracking
//!
//! This crate crawls a paginated book catalog, persists the records in
//! SQLite keyed by their source URL, and maintains an append-only history
//! of field-level changes between crawls.

pub mod changes;
pub mod config;
pub mod crawler;
pub mod fingerprint;
pub mod model;
pub mod storage;

use thiserror::Error;

/// Main error type for shelfwatch operations
#[derive(Debug, Error)]
pub enum ShelfwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Catalog discovery failed at {url}: {message}")]
    Discovery { url: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid record: {0}")]
    Model(#[from] model::ModelError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for shelfwatch operations
pub type Result<T> = std::result::Result<T, ShelfwatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{Book, BookFields, ChangeEvent, ChangeType, CrawlProgress, CrawlStatus};
