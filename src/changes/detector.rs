//! Field-level change comparison
//!
//! Each field group is compared independently: the price pair as a unit,
//! then availability, then description. Several categories can fire for
//! one comparison and each produces its own event; exact equality
//! (including both values absent) produces nothing.

use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;

use crate::model::{Book, ChangeEvent, ChangeType};

/// Compares two versions of the same record and returns one event per
/// changed field group
///
/// The payloads carry only the fields belonging to the group: a price
/// event holds both old and new price pairs, availability and description
/// events hold the single differing field.
pub fn detect_changes(old: &Book, new: &Book) -> Vec<ChangeEvent> {
    let mut changes = Vec::new();
    let detected_at = Utc::now();

    if old.price_incl_tax != new.price_incl_tax || old.price_excl_tax != new.price_excl_tax {
        changes.push(ChangeEvent {
            book_id: new.url.clone(),
            book_name: new.name.clone(),
            change_type: ChangeType::PriceChange,
            old_value: Some(json!({
                "price_incl_tax": old.price_incl_tax,
                "price_excl_tax": old.price_excl_tax,
            })),
            new_value: json!({
                "price_incl_tax": new.price_incl_tax,
                "price_excl_tax": new.price_excl_tax,
            }),
            detected_at,
        });
    }

    if old.availability != new.availability {
        changes.push(ChangeEvent {
            book_id: new.url.clone(),
            book_name: new.name.clone(),
            change_type: ChangeType::AvailabilityChange,
            old_value: Some(json!({ "availability": old.availability })),
            new_value: json!({ "availability": new.availability }),
            detected_at,
        });
    }

    if old.description != new.description {
        changes.push(ChangeEvent {
            book_id: new.url.clone(),
            book_name: new.name.clone(),
            change_type: ChangeType::DescriptionChange,
            old_value: Some(json!({ "description": old.description })),
            new_value: json!({ "description": new.description }),
            detected_at,
        });
    }

    changes
}

/// Returns the addresses present in the current catalog but not yet
/// stored, in sorted order
///
/// New-item detection is a plain set difference, separate from the
/// field-level comparison above.
pub fn detect_new_books(current: &HashSet<String>, stored: &HashSet<String>) -> Vec<String> {
    let mut new_books: Vec<String> = current.difference(stored).cloned().collect();
    new_books.sort();
    new_books
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookFields;

    fn book(price_incl: f64, price_excl: f64, availability: &str, description: Option<&str>) -> Book {
        Book::from_fields(
            BookFields {
                url: "https://books.example.com/catalogue/sample.html".to_string(),
                name: "Sample Book".to_string(),
                description: description.map(str::to_string),
                category: "Fiction".to_string(),
                price_excl_tax: price_excl,
                price_incl_tax: price_incl,
                availability: availability.to_string(),
                num_reviews: 1,
                rating: 3,
                image_url: "https://books.example.com/img.jpg".to_string(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_identical_records_yield_no_events() {
        let old = book(10.99, 9.99, "In stock", Some("x"));
        let new = book(10.99, 9.99, "In stock", Some("x"));
        assert!(detect_changes(&old, &new).is_empty());
    }

    #[test]
    fn test_price_change_carries_both_pairs() {
        let old = book(10.99, 9.99, "In stock", Some("x"));
        let new = book(12.99, 11.99, "In stock", Some("x"));

        let changes = detect_changes(&old, &new);
        assert_eq!(changes.len(), 1);

        let event = &changes[0];
        assert_eq!(event.change_type, ChangeType::PriceChange);
        assert_eq!(
            event.old_value,
            Some(json!({"price_incl_tax": 10.99, "price_excl_tax": 9.99}))
        );
        assert_eq!(
            event.new_value,
            json!({"price_incl_tax": 12.99, "price_excl_tax": 11.99})
        );
    }

    #[test]
    fn test_excl_only_price_change_still_fires() {
        let old = book(10.99, 9.99, "In stock", None);
        let new = book(10.99, 10.99, "In stock", None);

        let changes = detect_changes(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::PriceChange);
    }

    #[test]
    fn test_availability_change() {
        let old = book(10.99, 9.99, "In stock", None);
        let new = book(10.99, 9.99, "Out of stock", None);

        let changes = detect_changes(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::AvailabilityChange);
        assert_eq!(
            changes[0].old_value,
            Some(json!({"availability": "In stock"}))
        );
        assert_eq!(changes[0].new_value, json!({"availability": "Out of stock"}));
    }

    #[test]
    fn test_description_transition_from_none() {
        let old = book(10.99, 9.99, "In stock", None);
        let new = book(10.99, 9.99, "In stock", Some("now described"));

        let changes = detect_changes(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::DescriptionChange);
        assert_eq!(changes[0].old_value, Some(json!({"description": null})));
        assert_eq!(
            changes[0].new_value,
            json!({"description": "now described"})
        );
    }

    #[test]
    fn test_both_absent_descriptions_are_equal() {
        let old = book(10.99, 9.99, "In stock", None);
        let new = book(10.99, 9.99, "In stock", None);
        assert!(detect_changes(&old, &new).is_empty());
    }

    #[test]
    fn test_multiple_groups_fire_separately() {
        let old = book(10.99, 9.99, "In stock", Some("x"));
        let new = book(12.99, 11.99, "Out of stock", Some("y"));

        let changes = detect_changes(&old, &new);
        let types: Vec<ChangeType> = changes.iter().map(|c| c.change_type).collect();
        assert_eq!(
            types,
            vec![
                ChangeType::PriceChange,
                ChangeType::AvailabilityChange,
                ChangeType::DescriptionChange
            ]
        );
    }

    #[test]
    fn test_detect_new_books_is_set_difference() {
        let current: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let stored: HashSet<String> = ["b"].iter().map(|s| s.to_string()).collect();

        assert_eq!(detect_new_books(&current, &stored), vec!["a", "c"]);
    }

    #[test]
    fn test_detect_new_books_empty_when_all_stored() {
        let current: HashSet<String> = ["a"].iter().map(|s| s.to_string()).collect();
        let stored = current.clone();
        assert!(detect_new_books(&current, &stored).is_empty());
    }
}
