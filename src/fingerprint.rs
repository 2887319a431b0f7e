//! Content fingerprinting for change detection
//!
//! A fingerprint is a SHA-256 hash over the canonical JSON form of the
//! fields that matter for change detection: name, both prices,
//! availability, and description. Volatile fields (timestamps, review
//! counts, ratings, image URLs) are deliberately excluded so unrelated
//! churn never looks like a content change.

use serde_json::json;
use sha2::{Digest, Sha256};

/// Computes the deterministic content fingerprint for a record
///
/// The canonical form serializes keys in sorted order, so the same
/// logical content always hashes identically no matter how the caller
/// assembled the fields, and any difference in an included field changes
/// the output.
pub fn content_fingerprint(
    name: &str,
    price_incl_tax: f64,
    price_excl_tax: f64,
    availability: &str,
    description: Option<&str>,
) -> String {
    // serde_json maps keep keys in sorted order, which makes the
    // serialized form canonical.
    let relevant = json!({
        "availability": availability,
        "description": description,
        "name": name,
        "price_excl_tax": price_excl_tax,
        "price_incl_tax": price_incl_tax,
    });

    let mut hasher = Sha256::new();
    hasher.update(relevant.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
