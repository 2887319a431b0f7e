//! SQLite storage implementation

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::model::{Book, ChangeEvent, ChangeType, CrawlProgress, CrawlStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a database at the given path
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (useful for tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const BOOK_COLUMNS: &str = "url, name, description, category, price_excl_tax, price_incl_tax, \
     availability, num_reviews, rating, image_url, content_hash, crawled_at, crawl_status, \
     error_message, html_snapshot_id";

fn row_to_book(row: &Row) -> rusqlite::Result<Book> {
    let crawled_at_raw: String = row.get(11)?;
    let crawled_at = DateTime::parse_from_rfc3339(&crawled_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let status_raw: String = row.get(12)?;

    Ok(Book {
        url: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        price_excl_tax: row.get(4)?,
        price_incl_tax: row.get(5)?,
        availability: row.get(6)?,
        num_reviews: row.get(7)?,
        rating: row.get(8)?,
        image_url: row.get(9)?,
        content_hash: row.get(10)?,
        crawled_at,
        crawl_status: CrawlStatus::from_db_string(&status_raw).unwrap_or(CrawlStatus::Failed),
        error_message: row.get(13)?,
        html_snapshot_id: row.get(14)?,
    })
}

fn parse_timestamp(key: &str, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            message: format!("bad timestamp '{}': {}", raw, e),
        })
}

impl Store for SqliteStore {
    // ===== Book records =====

    fn upsert_book(&mut self, book: &Book) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO books (url, name, description, category, price_excl_tax, price_incl_tax,
                 availability, num_reviews, rating, image_url, content_hash, crawled_at,
                 crawl_status, error_message, html_snapshot_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(url) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 category = excluded.category,
                 price_excl_tax = excluded.price_excl_tax,
                 price_incl_tax = excluded.price_incl_tax,
                 availability = excluded.availability,
                 num_reviews = excluded.num_reviews,
                 rating = excluded.rating,
                 image_url = excluded.image_url,
                 content_hash = excluded.content_hash,
                 crawled_at = excluded.crawled_at,
                 crawl_status = excluded.crawl_status,
                 error_message = excluded.error_message,
                 html_snapshot_id = excluded.html_snapshot_id",
            params![
                book.url,
                book.name,
                book.description,
                book.category,
                book.price_excl_tax,
                book.price_incl_tax,
                book.availability,
                book.num_reviews,
                book.rating,
                book.image_url,
                book.content_hash,
                book.crawled_at.to_rfc3339(),
                book.crawl_status.to_db_string(),
                book.error_message,
                book.html_snapshot_id,
            ],
        )?;
        Ok(())
    }

    fn get_book(&self, url: &str) -> StorageResult<Option<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM books WHERE url = ?1", BOOK_COLUMNS))?;

        let row = stmt.query_row(params![url], row_to_book).optional()?;
        Ok(row)
    }

    fn all_book_urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT url FROM books ORDER BY url")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    fn all_books(&self) -> StorageResult<Vec<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM books ORDER BY url", BOOK_COLUMNS))?;

        let books = stmt
            .query_map([], row_to_book)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn count_books(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Progress document =====

    fn save_progress(&mut self, progress: &CrawlProgress) -> StorageResult<()> {
        let failed_pages = serde_json::to_string(&progress.failed_pages)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO crawl_progress
                 (id, timestamp, total_pages, completed_pages, failed_pages, status)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                progress.timestamp.to_rfc3339(),
                progress.total_pages,
                progress.completed_pages,
                failed_pages,
                progress.status.to_db_string(),
            ],
        )?;
        Ok(())
    }

    fn load_progress(&self) -> StorageResult<Option<CrawlProgress>> {
        let row = self
            .conn
            .query_row(
                "SELECT timestamp, total_pages, completed_pages, failed_pages, status
                 FROM crawl_progress WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((timestamp, total_pages, completed_pages, failed_raw, status_raw)) = row else {
            return Ok(None);
        };

        Ok(Some(CrawlProgress {
            timestamp: parse_timestamp("crawl_progress", &timestamp)?,
            total_pages,
            completed_pages,
            failed_pages: serde_json::from_str(&failed_raw)?,
            status: CrawlStatus::from_db_string(&status_raw).unwrap_or(CrawlStatus::Failed),
        }))
    }

    // ===== Change log =====

    fn append_change(&mut self, event: &ChangeEvent) -> StorageResult<()> {
        let old_value = event
            .old_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let new_value = serde_json::to_string(&event.new_value)?;

        self.conn.execute(
            "INSERT INTO change_log (book_id, book_name, change_type, old_value, new_value, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.book_id,
                event.book_name,
                event.change_type.to_db_string(),
                old_value,
                new_value,
                event.detected_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_changes(&self) -> StorageResult<Vec<ChangeEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT book_id, book_name, change_type, old_value, new_value, detected_at
             FROM change_log ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(book_id, book_name, type_raw, old_raw, new_raw, detected_raw)| {
                    let detected_at = parse_timestamp(&book_id, &detected_raw)?;
                    Ok(ChangeEvent {
                        book_name,
                        change_type: ChangeType::from_db_string(&type_raw)
                            .unwrap_or(ChangeType::Other),
                        old_value: old_raw
                            .as_deref()
                            .map(serde_json::from_str)
                            .transpose()?,
                        new_value: serde_json::from_str(&new_raw)?,
                        detected_at,
                        book_id,
                    })
                },
            )
            .collect()
    }

    fn count_changes(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM change_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
