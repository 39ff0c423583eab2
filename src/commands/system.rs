//! Store status and app state readers.

use super::bootstrap::DEMO_DATA_FLAG;
use super::{Output, json_string};
use crate::models::{AppState, StatusCounts};
use crate::storage::Storage;
use crate::Result;
use serde::Serialize;
use std::path::PathBuf;

/// Overview of a data directory.
#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub data_dir: PathBuf,
    pub schema_version: Option<String>,
    pub records: StatusCounts,
    pub stored_tests: usize,
    pub tags: usize,
    pub demo_data_loaded: bool,
    pub app_state: Option<AppState>,
}

impl Output for SystemStatus {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Data directory: {}", self.data_dir.display())];
        lines.push(format!(
            "Records: {} ({} pending, {} running, {} completed, {} error)",
            self.records.total,
            self.records.pending,
            self.records.running,
            self.records.completed,
            self.records.error
        ));
        lines.push(format!("Stored tests: {}", self.stored_tests));
        lines.push(format!("Tags: {}", self.tags));
        lines.push(format!(
            "Demo data: {}",
            if self.demo_data_loaded { "loaded" } else { "not loaded" }
        ));
        match &self.app_state {
            Some(state) => lines.push(format!(
                "Run state: {:?} (last reset {})",
                state.run_state,
                state.last_reset.to_rfc3339()
            )),
            None => lines.push("Run state: never reset".to_string()),
        }
        lines.join("\n")
    }
}

/// Summarize the store.
pub fn system_status(storage: &Storage) -> Result<SystemStatus> {
    Ok(SystemStatus {
        data_dir: storage.root().to_path_buf(),
        schema_version: storage.get_config("schema_version")?,
        records: storage.count_records_by_status()?,
        stored_tests: storage.list_tests()?.len(),
        tags: storage.list_tags()?.len(),
        demo_data_loaded: storage.has_flag(DEMO_DATA_FLAG)?,
        app_state: storage.app_state()?,
    })
}

/// The app state singleton, if any reset has written it.
#[derive(Debug, Serialize)]
pub struct AppStateView {
    pub app_state: Option<AppState>,
}

impl Output for AppStateView {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match &self.app_state {
            Some(state) => format!(
                "{:?}, last reset {}, active task {}",
                state.run_state,
                state.last_reset.to_rfc3339(),
                state.active_task_id.as_deref().unwrap_or("none")
            ),
            None => "No app state recorded.".to_string(),
        }
    }
}

/// Read the app state singleton.
pub fn app_state_show(storage: &Storage) -> Result<AppStateView> {
    Ok(AppStateView {
        app_state: storage.app_state()?,
    })
}
