//! Storage layer
//!
//! Persistence for book records (keyed upsert), the single crawl-progress
//! document, the append-only change log, and archived raw-content
//! snapshots. The [`Store`] trait is the seam used by the orchestrator
//! and change monitor; [`SqliteStore`] is the production backend.

mod schema;
mod snapshot;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use snapshot::SqliteSnapshots;
pub use sqlite::SqliteStore;
pub use traits::{SnapshotStore, StorageError, StorageResult, Store};

use std::sync::{Arc, Mutex};

/// Shared handle to a store, safe to clone into worker tasks
pub type SharedStore = Arc<Mutex<dyn Store + Send>>;
