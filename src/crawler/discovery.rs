//! Catalog discovery across paginated listings
//!
//! Discovery walks listing pages one at a time (pagination is ordered and
//! low-volume) and collects every item address. A failure on the first
//! page is fatal: nothing can proceed without the catalog root. A failure
//! on a later page stops pagination and returns the partial catalog,
//! which is preferable to aborting the whole run.

use std::sync::Arc;

use crate::crawler::{Extractor, Fetch};
use crate::ShelfwatchError;

/// Walks listing pages to build the full set of item addresses
pub struct Discoverer {
    fetcher: Arc<dyn Fetch>,
    extractor: Arc<dyn Extractor>,
}

impl Discoverer {
    pub fn new(fetcher: Arc<dyn Fetch>, extractor: Arc<dyn Extractor>) -> Self {
        Self { fetcher, extractor }
    }

    /// Discovers all item addresses reachable from the start page
    ///
    /// # Errors
    ///
    /// Returns [`ShelfwatchError::Discovery`] only when the first listing
    /// page cannot be fetched after retries are exhausted.
    pub async fn discover(&self, start_url: &str) -> Result<Vec<String>, ShelfwatchError> {
        let mut all_links = Vec::new();
        let mut current = Some(start_url.to_string());
        let mut first_page = true;

        tracing::info!("Discovering catalog from {}", start_url);

        while let Some(page_url) = current {
            let html = match self.fetcher.fetch(&page_url).await {
                Ok(html) => html,
                Err(e) if first_page => {
                    return Err(ShelfwatchError::Discovery {
                        url: page_url,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to fetch listing page {}, stopping pagination: {}",
                        page_url,
                        e
                    );
                    break;
                }
            };
            first_page = false;

            let links = self.extractor.extract_listing_links(&html, &page_url);
            tracing::info!("Found {} books on {}", links.len(), page_url);
            all_links.extend(links);

            current = self.extractor.extract_next_page(&html, &page_url);
        }

        tracing::info!("Total books discovered: {}", all_links.len());
        Ok(all_links)
    }
}
