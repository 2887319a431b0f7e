use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a detected change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    NewBook,
    PriceChange,
    AvailabilityChange,
    DescriptionChange,
    Other,
}

impl ChangeType {
    /// Converts the change type to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::NewBook => "new_book",
            Self::PriceChange => "price_change",
            Self::AvailabilityChange => "availability_change",
            Self::DescriptionChange => "description_change",
            Self::Other => "other",
        }
    }

    /// Parses a change type from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new_book" => Some(Self::NewBook),
            "price_change" => Some(Self::PriceChange),
            "availability_change" => Some(Self::AvailabilityChange),
            "description_change" => Some(Self::DescriptionChange),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// A single detected change for one book
///
/// Immutable once created; the change log is append-only. `old_value` and
/// `new_value` carry only the fields that differ for this category.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Natural key of the book (its source URL)
    pub book_id: String,
    pub book_name: String,
    pub change_type: ChangeType,
    pub old_value: Option<Value>,
    pub new_value: Value,
    pub detected_at: DateTime<Utc>,
}
