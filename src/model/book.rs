use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint;

/// Validation errors for book records
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("price_incl_tax ({incl}) must be >= price_excl_tax ({excl})")]
    PriceOrder { incl: f64, excl: f64 },

    #[error("rating must be between 1 and 5, got {0}")]
    RatingRange(u8),

    #[error("name cannot be empty")]
    EmptyName,
}

/// Outcome of a crawl attempt, stored with each record and with the
/// progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Success,
    Failed,
    Partial,
}

impl CrawlStatus {
    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    /// Parses a status from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

/// Raw fields extracted from a book detail page, before validation and
/// fingerprinting
#[derive(Debug, Clone, PartialEq)]
pub struct BookFields {
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_excl_tax: f64,
    pub price_incl_tax: f64,
    pub availability: String,
    pub num_reviews: u32,
    pub rating: u8,
    pub image_url: String,
}

/// A book record with crawl metadata, keyed by its source URL
///
/// The URL is the natural key: upserting a record with an existing URL
/// fully replaces the stored fields. Records are never deleted by the
/// crawler.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_excl_tax: f64,
    pub price_incl_tax: f64,
    pub availability: String,
    pub num_reviews: u32,
    pub rating: u8,
    pub image_url: String,

    /// Hash over the change-relevant field subset
    pub content_hash: String,

    pub crawled_at: DateTime<Utc>,
    pub crawl_status: CrawlStatus,
    pub error_message: Option<String>,
    pub html_snapshot_id: Option<String>,
}

impl Book {
    /// Builds a validated record from extracted fields, stamping the
    /// content fingerprint and crawl metadata
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if the fields violate the record
    /// invariants (empty name, rating outside 1..=5, incl-tax price below
    /// excl-tax price).
    pub fn from_fields(fields: BookFields, crawled_at: DateTime<Utc>) -> Result<Self, ModelError> {
        if fields.name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        if !(1..=5).contains(&fields.rating) {
            return Err(ModelError::RatingRange(fields.rating));
        }
        if fields.price_incl_tax < fields.price_excl_tax {
            return Err(ModelError::PriceOrder {
                incl: fields.price_incl_tax,
                excl: fields.price_excl_tax,
            });
        }

        let content_hash = fingerprint::content_fingerprint(
            &fields.name,
            fields.price_incl_tax,
            fields.price_excl_tax,
            &fields.availability,
            fields.description.as_deref(),
        );

        Ok(Self {
            url: fields.url,
            name: fields.name,
            description: fields.description,
            category: fields.category,
            price_excl_tax: fields.price_excl_tax,
            price_incl_tax: fields.price_incl_tax,
            availability: fields.availability,
            num_reviews: fields.num_reviews,
            rating: fields.rating,
            image_url: fields.image_url,
            content_hash,
            crawled_at,
            crawl_status: CrawlStatus::Success,
            error_message: None,
            html_snapshot_id: None,
        })
    }
}
