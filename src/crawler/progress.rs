//! Run-local progress accounting
//!
//! The tracker is owned exclusively by the orchestrator: workers report
//! outcomes through the join loop and only that loop mutates these
//! counters, so snapshots never observe a torn or decreasing state.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::model::{CrawlProgress, CrawlStatus};

/// Accumulates completion state for one crawl run
#[derive(Debug)]
pub struct ProgressTracker {
    total: u32,
    completed: u32,
    failed: BTreeSet<String>,
    cancelled: bool,
}

impl ProgressTracker {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: 0,
            failed: BTreeSet::new(),
            cancelled: false,
        }
    }

    /// Records one successfully processed item
    pub fn record_success(&mut self) {
        self.completed += 1;
    }

    /// Records a failed address; the set keeps each address once
    pub fn record_failure(&mut self, url: String) {
        self.failed.insert(url);
    }

    /// Marks the run as cancelled; the final snapshot reports partial
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Builds the snapshot to persist: success with an empty failed set,
    /// partial otherwise (and always partial once cancelled)
    pub fn snapshot(&self) -> CrawlProgress {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, timestamp: DateTime<Utc>) -> CrawlProgress {
        let status = if self.cancelled || !self.failed.is_empty() {
            CrawlStatus::Partial
        } else {
            CrawlStatus::Success
        };

        CrawlProgress {
            timestamp,
            total_pages: self.total,
            completed_pages: self.completed,
            failed_pages: self.failed.iter().cloned().collect(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_run_is_success() {
        let mut tracker = ProgressTracker::new(3);
        tracker.record_success();
        tracker.record_success();
        tracker.record_success();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.total_pages, 3);
        assert_eq!(snapshot.completed_pages, 3);
        assert!(snapshot.failed_pages.is_empty());
        assert_eq!(snapshot.status, CrawlStatus::Success);
    }

    #[test]
    fn test_any_failure_means_partial() {
        let mut tracker = ProgressTracker::new(3);
        tracker.record_success();
        tracker.record_success();
        tracker.record_failure("https://books.example.com/catalogue/broken.html".to_string());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed_pages, 2);
        assert_eq!(
            snapshot.failed_pages,
            vec!["https://books.example.com/catalogue/broken.html"]
        );
        assert_eq!(snapshot.status, CrawlStatus::Partial);
        assert!(snapshot.completed_pages as usize + snapshot.failed_pages.len() <= 3);
    }

    #[test]
    fn test_duplicate_failures_recorded_once() {
        let mut tracker = ProgressTracker::new(2);
        tracker.record_failure("https://books.example.com/x.html".to_string());
        tracker.record_failure("https://books.example.com/x.html".to_string());

        assert_eq!(tracker.failed_count(), 1);
    }

    #[test]
    fn test_failed_addresses_are_ordered() {
        let mut tracker = ProgressTracker::new(3);
        tracker.record_failure("https://books.example.com/b.html".to_string());
        tracker.record_failure("https://books.example.com/a.html".to_string());

        let snapshot = tracker.snapshot();
        assert_eq!(
            snapshot.failed_pages,
            vec![
                "https://books.example.com/a.html",
                "https://books.example.com/b.html"
            ]
        );
    }

    #[test]
    fn test_cancellation_forces_partial() {
        let mut tracker = ProgressTracker::new(10);
        tracker.record_success();
        tracker.mark_cancelled();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status, CrawlStatus::Partial);
        assert!(snapshot.failed_pages.is_empty());
    }

    #[test]
    fn test_completed_count_never_decreases() {
        let mut tracker = ProgressTracker::new(5);
        let mut last = 0;
        for _ in 0..5 {
            tracker.record_success();
            let snapshot = tracker.snapshot();
            assert!(snapshot.completed_pages > last);
            last = snapshot.completed_pages;
        }
    }
}
