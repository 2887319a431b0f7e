//! Database schema definition

use rusqlite::Connection;

/// Creates all tables and indexes if they do not exist
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS books (
            url TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            category TEXT NOT NULL,
            price_excl_tax REAL NOT NULL,
            price_incl_tax REAL NOT NULL,
            availability TEXT NOT NULL,
            num_reviews INTEGER NOT NULL,
            rating INTEGER NOT NULL,
            image_url TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            crawled_at TEXT NOT NULL,
            crawl_status TEXT NOT NULL,
            error_message TEXT,
            html_snapshot_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_books_category ON books(category);

        -- Single live progress document, overwritten in place
        CREATE TABLE IF NOT EXISTS crawl_progress (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            timestamp TEXT NOT NULL,
            total_pages INTEGER NOT NULL,
            completed_pages INTEGER NOT NULL,
            failed_pages TEXT NOT NULL,
            status TEXT NOT NULL
        );

        -- Append-only change history
        CREATE TABLE IF NOT EXISTS change_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id TEXT NOT NULL,
            book_name TEXT NOT NULL,
            change_type TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT NOT NULL,
            detected_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_change_log_book ON change_log(book_id);

        -- Raw page archive, write-once
        CREATE TABLE IF NOT EXISTS html_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            content BLOB NOT NULL,
            stored_at TEXT NOT NULL
        );
        ",
    )
}
