//! Bulk reset of run state.
//!
//! Reset is the only writer of the app state singleton. Its two mutations are
//! independent: if the process dies between them, the records are already
//! pending and the next reset replaces the singleton anyway.

use super::{Output, json_string};
use crate::models::{AppState, StatusCounts};
use crate::storage::Storage;
use crate::Result;
use chrono::Utc;
use serde::Serialize;

/// Result of a reset.
#[derive(Debug, Serialize)]
pub struct ResetOutcome {
    /// Records whose run state actually changed
    pub modified_count: usize,
    pub app_state: AppState,
    /// True if the app state document did not exist before
    pub created: bool,
    /// Record counts after the reset
    pub summary: StatusCounts,
}

impl Output for ResetOutcome {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Reset {} record(s) to pending", self.modified_count)];
        lines.push(format!(
            "App state {} (last reset {})",
            if self.created { "created" } else { "replaced" },
            self.app_state.last_reset.to_rfc3339()
        ));
        lines.push(format!(
            "Records: {} total, {} pending, {} running, {} completed, {} error",
            self.summary.total,
            self.summary.pending,
            self.summary.running,
            self.summary.completed,
            self.summary.error
        ));
        lines.join("\n")
    }
}

/// Force every record back to pending and replace the app state with idle.
pub fn reset_all(storage: &mut Storage) -> Result<ResetOutcome> {
    let modified_count = storage.reset_records()?;

    let app_state = AppState::idle(Utc::now());
    let created = storage.replace_app_state(&app_state)?;

    let summary = storage.count_records_by_status()?;
    tracing::info!(modified_count, created, total = summary.total, "reset complete");

    Ok(ResetOutcome {
        modified_count,
        app_state,
        created,
        summary,
    })
}
