//! Crawl orchestration
//!
//! The orchestrator drives a full run: discovery, resume filtering,
//! concurrent per-item processing, and batched progress persistence.
//! Workers never touch shared counters; every outcome flows back through
//! the join loop, which is the single aggregator updating the tracker and
//! writing the progress snapshot.

use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::crawler::progress::ProgressTracker;
use crate::crawler::{CatalogExtractor, Discoverer, Extractor, Fetch, FetchError, HttpFetcher};
use crate::model::{Book, CrawlProgress, ModelError};
use crate::storage::{SharedStore, SnapshotStore, SqliteSnapshots, SqliteStore, StorageError};

/// Requests cooperative cancellation of a running crawl
///
/// In-flight fetches finish; no new item is scheduled after the flag is
/// set, and the final snapshot reports the run as partial.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run parameters not tied to a particular collaborator
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// First listing page of the catalog
    pub start_url: String,

    /// Items processed between progress snapshots
    pub batch_size: usize,
}

/// Failure of a single item's pipeline; recorded, never fatal to the run
#[derive(Debug, Error)]
enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no parsable record at {url}")]
    Parse { url: String },

    #[error(transparent)]
    Invalid(#[from] ModelError),

    #[error("snapshot store rejected content: {0}")]
    Snapshot(StorageError),

    #[error("upsert rejected: {0}")]
    Store(StorageError),
}

/// Top-level coordinator for a crawl run
pub struct Orchestrator {
    fetcher: Arc<dyn Fetch>,
    extractor: Arc<dyn Extractor>,
    store: SharedStore,
    snapshots: Arc<dyn SnapshotStore>,
    options: CrawlOptions,
    cancel: CancelHandle,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        extractor: Arc<dyn Extractor>,
        store: SharedStore,
        snapshots: Arc<dyn SnapshotStore>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            snapshots,
            options,
            cancel: CancelHandle::new(),
        }
    }

    /// Returns a handle that can cancel this run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs a full crawl and returns the final progress snapshot
    ///
    /// With `resume` set, addresses already present in the store are
    /// subtracted from the discovered set before any fetching begins;
    /// stored records are skipped regardless of staleness.
    ///
    /// Only a first-page discovery failure or a storage failure while
    /// persisting progress is fatal; individual item failures are
    /// recorded and the run continues.
    pub async fn run(&self, resume: bool) -> crate::Result<CrawlProgress> {
        tracing::info!("Starting catalog crawl (resume: {})", resume);

        let discoverer = Discoverer::new(self.fetcher.clone(), self.extractor.clone());
        let discovered = discoverer.discover(&self.options.start_url).await?;
        let total = discovered.len() as u32;

        let pending = if resume {
            let stored: HashSet<String> = self
                .store
                .lock()
                .unwrap()
                .all_book_urls()?
                .into_iter()
                .collect();

            let remaining: Vec<String> = discovered
                .into_iter()
                .filter(|url| !stored.contains(url))
                .collect();
            tracing::info!("Resuming crawl, {} books remaining", remaining.len());
            remaining
        } else {
            discovered
        };

        let mut tracker = ProgressTracker::new(total);

        for batch in pending.chunks(self.options.batch_size.max(1)) {
            if self.cancel.is_cancelled() {
                tracing::info!("Cancellation requested, no further items scheduled");
                tracker.mark_cancelled();
                break;
            }

            let mut workers = JoinSet::new();

            for url in batch {
                if self.cancel.is_cancelled() {
                    tracker.mark_cancelled();
                    break;
                }

                let fetcher = self.fetcher.clone();
                let extractor = self.extractor.clone();
                let store = self.store.clone();
                let snapshots = self.snapshots.clone();
                let url = url.clone();

                workers.spawn(async move {
                    let outcome = process_book(fetcher, extractor, store, snapshots, &url).await;
                    (url, outcome)
                });
            }

            // Single aggregator: outcomes are consumed here and nowhere
            // else, so counter updates cannot race.
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((_, Ok(()))) => tracker.record_success(),
                    Ok((url, Err(e))) => {
                        tracing::error!("Failed to process {}: {}", url, e);
                        tracker.record_failure(url);
                    }
                    Err(e) => tracing::error!("Worker task failed: {}", e),
                }
            }

            let progress = tracker.snapshot();
            self.store.lock().unwrap().save_progress(&progress)?;
            tracing::info!(
                "Progress: {}/{} completed, {} failed",
                tracker.completed(),
                tracker.total(),
                tracker.failed_count()
            );
        }

        let final_progress = tracker.snapshot();
        self.store.lock().unwrap().save_progress(&final_progress)?;

        tracing::info!(
            "Crawl completed: {}/{} books, {} failed",
            final_progress.completed_pages,
            final_progress.total_pages,
            final_progress.failed_pages.len()
        );

        Ok(final_progress)
    }
}

/// Processes one item: fetch, extract, validate, fingerprint, archive the
/// raw content, and upsert the structured record
async fn process_book(
    fetcher: Arc<dyn Fetch>,
    extractor: Arc<dyn Extractor>,
    store: SharedStore,
    snapshots: Arc<dyn SnapshotStore>,
    url: &str,
) -> Result<(), ItemError> {
    let html = fetcher.fetch(url).await?;

    let fields = extractor
        .extract_item(&html, url)
        .ok_or_else(|| ItemError::Parse {
            url: url.to_string(),
        })?;

    let mut book = Book::from_fields(fields, Utc::now())?;

    let snapshot_id = snapshots
        .store_snapshot(url, html.as_bytes())
        .map_err(ItemError::Snapshot)?;
    book.html_snapshot_id = Some(snapshot_id);

    store
        .lock()
        .unwrap()
        .upsert_book(&book)
        .map_err(ItemError::Store)?;

    tracing::info!("Stored book: {}", book.name);
    Ok(())
}

/// Runs a crawl with the production collaborators wired from the config
pub async fn run_crawl(config: Config, resume: bool) -> crate::Result<CrawlProgress> {
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(&config.crawler)?);
    let extractor: Arc<dyn Extractor> = Arc::new(CatalogExtractor::new());

    let db_path = Path::new(&config.output.database_path);
    let store: SharedStore = Arc::new(Mutex::new(SqliteStore::open(db_path)?));
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(SqliteSnapshots::open(db_path)?);

    let options = CrawlOptions {
        start_url: config.crawler.start_url.clone(),
        batch_size: config.crawler.batch_size as usize,
    };

    let orchestrator = Orchestrator::new(fetcher, extractor, store, snapshots, options);
    orchestrator.run(resume).await
}
