//! Tag classification heuristics for execution records.
//!
//! Tags are derived from a record's free text and metadata. Every rule is
//! evaluated independently, so a record may carry several tags.
//!
//! # Rules
//!
//! - **airbnb**: label or instructions mention "airbnb" (case-insensitive), or
//!   `metadata.source` is exactly `"airbnb"`
//! - **automation**: label or instructions mention "automation" (case-insensitive)
//! - **source passthrough**: a non-empty `metadata.source` not already derived is
//!   appended verbatim
//!
//! Classification is additive metadata. Only the tagged-only export filters on
//! it, and that filter looks at the keyword heuristics alone.
//!
//! # Example
//!
//! ```
//! use tilt::models::Record;
//! use tilt::models::classifier::classify;
//!
//! let mut record = Record::new("tk-0001".to_string(), None);
//! record.label = Some("Book an Airbnb flow".to_string());
//!
//! assert_eq!(classify(&record), vec!["airbnb".to_string()]);
//! ```

use super::Record;

/// Tag for records touching the Airbnb flows.
pub const AIRBNB_TAG: &str = "airbnb";

/// Tag for records about automation.
pub const AUTOMATION_TAG: &str = "automation";

/// Derive the full tag set for a record, in rule order.
pub fn classify(record: &Record) -> Vec<String> {
    let mut tags = heuristic_tags(record);

    if let Some(source) = record.source() {
        if !tags.iter().any(|t| t == source) {
            tags.push(source.to_string());
        }
    }

    tags
}

/// Derive only the keyword-heuristic tags (no source passthrough).
pub fn heuristic_tags(record: &Record) -> Vec<String> {
    let mut tags = Vec::new();

    if is_airbnb(record) {
        tags.push(AIRBNB_TAG.to_string());
    }
    if is_automation(record) {
        tags.push(AUTOMATION_TAG.to_string());
    }

    tags
}

/// Whether a record qualifies for the tagged-only export.
pub fn is_tagged(record: &Record) -> bool {
    is_airbnb(record) || is_automation(record)
}

fn is_airbnb(record: &Record) -> bool {
    mentions(record, AIRBNB_TAG) || record.metadata.source.as_deref() == Some(AIRBNB_TAG)
}

fn is_automation(record: &Record) -> bool {
    mentions(record, AUTOMATION_TAG)
}

/// Case-insensitive keyword match against label and instructions.
fn mentions(record: &Record, keyword: &str) -> bool {
    contains_ignore_case(record.label.as_deref(), keyword)
        || contains_ignore_case(record.instructions.as_deref(), keyword)
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}
