use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CrawlStatus;

/// The single mutable crawl-progress snapshot
///
/// Exactly one live snapshot exists; it is overwritten in place on every
/// save so observers always query the latest state. `completed_pages`
/// counts successes only, so `completed_pages + failed_pages.len() <=
/// total_pages` holds at every point in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlProgress {
    pub timestamp: DateTime<Utc>,
    pub total_pages: u32,
    pub completed_pages: u32,
    pub failed_pages: Vec<String>,
    pub status: CrawlStatus,
}

impl CrawlProgress {
    /// Percentage of items completed, 0.0 when nothing was discovered
    pub fn progress_percentage(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        (self.completed_pages as f64 / self.total_pages as f64) * 100.0
    }
}
