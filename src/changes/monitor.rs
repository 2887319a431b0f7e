//! Re-fetch-and-compare change monitoring
//!
//! The monitor re-fetches every stored record through the shared permit
//! pool, compares content fingerprints first, and only falls back to the
//! field-level diff when the fingerprints disagree. Changed records are
//! refreshed in the store and each detected change is appended to the
//! history. A fresh discovery pass reports addresses not yet stored.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::changes::{detect_changes, detect_new_books};
use crate::config::Config;
use crate::crawler::{CatalogExtractor, Discoverer, Extractor, Fetch, FetchError, HttpFetcher};
use crate::model::{Book, ModelError};
use crate::storage::{SharedStore, SqliteStore};

/// Outcome of one change-detection pass
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSummary {
    /// Stored records that were re-checked
    pub checked: usize,
    /// Records whose fingerprint was unchanged
    pub unchanged: usize,
    /// Records with at least one detected change
    pub changed: usize,
    /// Events appended to the change log
    pub events_logged: usize,
    /// Catalog addresses not yet present in the store
    pub new_books: Vec<String>,
    /// Addresses that could not be re-checked this pass
    pub failed: Vec<String>,
}

/// Failure to produce a fresh comparable record for one address
#[derive(Debug, Error)]
enum CheckError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no parsable record at {url}")]
    Parse { url: String },

    #[error(transparent)]
    Invalid(#[from] ModelError),
}

/// Drives a change-detection pass over the stored catalog
pub struct ChangeMonitor {
    fetcher: Arc<dyn Fetch>,
    extractor: Arc<dyn Extractor>,
    store: SharedStore,
    start_url: String,
}

impl ChangeMonitor {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        extractor: Arc<dyn Extractor>,
        store: SharedStore,
        start_url: String,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            start_url,
        }
    }

    /// Re-fetches every stored record, logs detected changes, and reports
    /// new catalog entries
    ///
    /// Individual re-check failures are counted and skipped; only storage
    /// failures are fatal to the pass.
    pub async fn run(&self) -> crate::Result<ChangeSummary> {
        let stored_books = self.store.lock().unwrap().all_books()?;
        tracing::info!("Checking {} stored books for changes", stored_books.len());

        let by_url: HashMap<String, Book> = stored_books
            .into_iter()
            .map(|book| (book.url.clone(), book))
            .collect();

        let mut workers = JoinSet::new();
        for url in by_url.keys() {
            let fetcher = self.fetcher.clone();
            let extractor = self.extractor.clone();
            let url = url.clone();

            workers.spawn(async move {
                let result = refetch_book(fetcher, extractor, &url).await;
                (url, result)
            });
        }

        let mut summary = ChangeSummary {
            checked: by_url.len(),
            unchanged: 0,
            changed: 0,
            events_logged: 0,
            new_books: Vec::new(),
            failed: Vec::new(),
        };

        // Single aggregator: all comparison and persistence happens here.
        while let Some(joined) = workers.join_next().await {
            let Ok((url, result)) = joined else {
                tracing::error!("Change-check task failed");
                continue;
            };

            let mut fresh = match result {
                Ok(book) => book,
                Err(e) => {
                    tracing::warn!("Could not re-check {}: {}", url, e);
                    summary.failed.push(url);
                    continue;
                }
            };

            let Some(old) = by_url.get(&url) else {
                continue;
            };

            // Fingerprints screen out cosmetically identical content
            // before any field comparison.
            if old.content_hash == fresh.content_hash {
                summary.unchanged += 1;
                continue;
            }

            let events = detect_changes(old, &fresh);

            // The monitor does not re-archive raw content; the refreshed
            // record keeps pointing at the original snapshot.
            fresh.html_snapshot_id = old.html_snapshot_id.clone();

            {
                let mut store = self.store.lock().unwrap();
                for event in &events {
                    store.append_change(event)?;
                    tracing::info!(
                        "Logged change: {} for {}",
                        event.change_type.to_db_string(),
                        event.book_name
                    );
                }
                store.upsert_book(&fresh)?;
            }

            summary.changed += 1;
            summary.events_logged += events.len();
        }
        summary.failed.sort();

        // New entries come from a fresh discovery pass; a discovery
        // failure degrades to skipping new-book detection.
        let discoverer = Discoverer::new(self.fetcher.clone(), self.extractor.clone());
        match discoverer.discover(&self.start_url).await {
            Ok(current) => {
                let current: HashSet<String> = current.into_iter().collect();
                let stored: HashSet<String> = by_url.keys().cloned().collect();
                summary.new_books = detect_new_books(&current, &stored);
            }
            Err(e) => tracing::warn!("Skipping new-book detection: {}", e),
        }

        tracing::info!(
            "Change detection completed: {} checked, {} changed, {} events, {} new books, {} failed",
            summary.checked,
            summary.changed,
            summary.events_logged,
            summary.new_books.len(),
            summary.failed.len()
        );

        Ok(summary)
    }
}

/// Fetches and parses a fresh comparable record for one stored address
async fn refetch_book(
    fetcher: Arc<dyn Fetch>,
    extractor: Arc<dyn Extractor>,
    url: &str,
) -> Result<Book, CheckError> {
    let html = fetcher.fetch(url).await?;

    let fields = extractor
        .extract_item(&html, url)
        .ok_or_else(|| CheckError::Parse {
            url: url.to_string(),
        })?;

    Ok(Book::from_fields(fields, Utc::now())?)
}

/// Runs a change-detection pass with the production collaborators wired
/// from the config
pub async fn run_change_detection(config: Config) -> crate::Result<ChangeSummary> {
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(&config.crawler)?);
    let extractor: Arc<dyn Extractor> = Arc::new(CatalogExtractor::new());

    let db_path = Path::new(&config.output.database_path);
    let store: SharedStore = Arc::new(Mutex::new(SqliteStore::open(db_path)?));

    let monitor = ChangeMonitor::new(fetcher, extractor, store, config.crawler.start_url.clone());
    monitor.run().await
}
