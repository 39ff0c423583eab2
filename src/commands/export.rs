//! Test-suite export.

use super::Output;
use crate::models::classifier;
use crate::models::DerivedTest;
use crate::storage::Storage;
use crate::Result;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// Project every record into its test shape, in store order.
///
/// With `tagged_only`, keep only records matching the airbnb or automation
/// heuristics. A bare `metadata.source` does not qualify a record.
pub fn export_tests(storage: &Storage, tagged_only: bool) -> Result<Vec<DerivedTest>> {
    let now = Utc::now();
    let tests = storage
        .list_records()?
        .iter()
        .filter(|record| !tagged_only || classifier::is_tagged(record))
        .map(|record| DerivedTest::from_record(record, now))
        .collect();
    Ok(tests)
}

/// An export, either printed or written to a file.
#[derive(Debug)]
pub struct ExportOutcome {
    pub tests: Vec<DerivedTest>,
    pub written_to: Option<PathBuf>,
}

impl Output for ExportOutcome {
    fn to_json(&self) -> String {
        match &self.written_to {
            Some(path) => serde_json::json!({
                "exported": self.tests.len(),
                "path": path,
            })
            .to_string(),
            None => serde_json::to_string_pretty(&self.tests).unwrap_or_else(|_| "[]".to_string()),
        }
    }

    fn to_human(&self) -> String {
        match &self.written_to {
            Some(path) => format!("Exported {} test(s) to {}", self.tests.len(), path.display()),
            None => self.to_json(),
        }
    }
}

/// Export tests, writing pretty JSON to `output` when given.
pub fn export_to(storage: &Storage, tagged_only: bool, output: Option<&Path>) -> Result<ExportOutcome> {
    let tests = export_tests(storage, tagged_only)?;

    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&tests)?)?;
        tracing::info!(count = tests.len(), path = %path.display(), tagged_only, "tests exported");
    }

    Ok(ExportOutcome {
        tests,
        written_to: output.map(Path::to_path_buf),
    })
}
