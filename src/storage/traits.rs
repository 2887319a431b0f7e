//! Storage traits and error types

use thiserror::Error;

use crate::model::{Book, ChangeEvent, CrawlProgress};

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record for {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence operations needed by the crawler and change monitor
///
/// Implementations are used behind a mutex shared across worker tasks;
/// upserts with different keys must not interfere, and repeated upserts
/// of the same key must leave exactly one record.
pub trait Store {
    // ===== Book records =====

    /// Inserts or fully replaces the record with the book's URL key
    fn upsert_book(&mut self, book: &Book) -> StorageResult<()>;

    /// Gets a record by its URL key
    fn get_book(&self, url: &str) -> StorageResult<Option<Book>>;

    /// Enumerates all stored URL keys
    fn all_book_urls(&self) -> StorageResult<Vec<String>>;

    /// Loads every stored record
    fn all_books(&self) -> StorageResult<Vec<Book>>;

    /// Counts stored records
    fn count_books(&self) -> StorageResult<u64>;

    // ===== Progress document =====

    /// Overwrites the single crawl-progress document
    fn save_progress(&mut self, progress: &CrawlProgress) -> StorageResult<()>;

    /// Loads the latest crawl-progress document, if any run has persisted
    /// one
    fn load_progress(&self) -> StorageResult<Option<CrawlProgress>>;

    // ===== Change log =====

    /// Appends a change event to the history
    fn append_change(&mut self, event: &ChangeEvent) -> StorageResult<()>;

    /// Lists all change events in insertion order
    fn list_changes(&self) -> StorageResult<Vec<ChangeEvent>>;

    /// Counts logged change events
    fn count_changes(&self) -> StorageResult<u64>;
}

/// Write-once archival of raw page content
///
/// Content is keyed by the caller and never read back by the crawler; the
/// returned id is recorded on the book for external consumers.
pub trait SnapshotStore: Send + Sync {
    fn store_snapshot(&self, key: &str, content: &[u8]) -> StorageResult<String>;
}
