//! Change detection
//!
//! [`detector`] holds the pure field-level comparison primitives;
//! [`monitor`] wires them into a genuine re-fetch-and-compare pass over
//! the stored catalog.

mod detector;
mod monitor;

pub use detector::{detect_changes, detect_new_books};
pub use monitor::{run_change_detection, ChangeMonitor, ChangeSummary};
