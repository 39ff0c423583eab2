//! Command implementations for the Tilt CLI and HTTP surface.
//!
//! This module contains the business logic for each operation.
//! Commands are organized by entity type:
//! - `tags` - Tag registry and cascading delete
//! - `tests` - Reconciled test listing, stored test CRUD, bulk tagging
//! - `records` - Execution record lifecycle
//! - `bootstrap` - One-time fixture seeding
//! - `reset` - Bulk run-state reset
//! - `export` - Test-suite snapshot
//! - `settings` - UI key/value settings
//! - `system` - Store status overview
//!
//! Every command works against an open [`Storage`](crate::storage::Storage), so the
//! CLI and the server share one code path.

pub mod bootstrap;
pub mod export;
pub mod records;
pub mod reset;
pub mod settings;
pub mod system;
pub mod tags;
pub mod tests;

pub use bootstrap::{BootstrapOutcome, DEMO_DATA_FLAG, SkipReason, bootstrap, run_startup_bootstrap};
pub use export::{ExportOutcome, export_tests, export_to};
pub use records::{
    RecordList, parse_payload, record_complete, record_create, record_fail, record_list,
    record_show, record_start,
};
pub use reset::{ResetOutcome, reset_all};
pub use settings::{SettingValue, SettingsList, setting_get, setting_list, setting_set};
pub use system::{AppStateView, SystemStatus, app_state_show, system_status};
pub use tags::{TagCreated, TagDeleted, TagList, tag_create, tag_delete, tag_list, validate_tag_name};
pub use tests::{
    BulkTagAction, BulkTagResult, TestDeleted, TestList, bulk_tag, normalize_tags, test_create,
    test_delete, test_list, test_show, test_update,
};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Serialize any command result, falling back to an empty object.
pub(crate) fn json_string<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
