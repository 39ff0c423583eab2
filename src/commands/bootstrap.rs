//! One-time seeding of the record store from a fixture file.
//!
//! A persisted system flag guards the import. Once the flag exists, bootstrap
//! never runs again, even if every seeded record has since been removed.
//!
//! The flag check and the insert are not atomic. Two processes booting at the
//! same time can both seed; the flag write itself is an idempotent upsert.

use super::{Output, json_string};
use crate::models::{Fixture, FixtureEntry, Record};
use crate::storage::{RECORD_ID_PREFIX, Storage, generate_id};
use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// System flag marking that the fixture was imported.
pub const DEMO_DATA_FLAG: &str = "demo_data_loaded";

/// Why a bootstrap run did not import anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyLoaded,
    FixtureMissing,
    FixtureUnreadable,
}

/// Result of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapOutcome {
    pub inserted: usize,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

impl BootstrapOutcome {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            inserted: 0,
            skipped: true,
            reason: Some(reason),
        }
    }
}

impl Output for BootstrapOutcome {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match self.reason {
            None => format!("Bootstrap imported {} record(s)", self.inserted),
            Some(SkipReason::AlreadyLoaded) => {
                "Bootstrap skipped: demo data was already loaded".to_string()
            }
            Some(SkipReason::FixtureMissing) => {
                "Bootstrap skipped: fixture file not found".to_string()
            }
            Some(SkipReason::FixtureUnreadable) => {
                "Bootstrap skipped: fixture file could not be read".to_string()
            }
        }
    }
}

/// Read and parse a fixture file.
pub fn load_fixture(path: &Path) -> Result<Fixture> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::FixtureMissing(path.to_path_buf()));
        }
        Err(e) => {
            return Err(Error::FixtureUnreadable(format!("{}: {}", path.display(), e)));
        }
    };

    serde_json::from_str(&contents)
        .map_err(|e| Error::FixtureUnreadable(format!("{}: {}", path.display(), e)))
}

/// Render the instructions an agent receives for a fixture entry.
pub fn render_instructions(label: &str, steps: &[String]) -> String {
    let mut text = format!("Execute the following test steps for: {}\n", label);
    for (i, step) in steps.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, step));
    }
    text
}

/// Turn a fixture entry into a pending record.
pub fn fixture_record(entry: &FixtureEntry) -> Record {
    let mut record = Record::new(
        generate_id(RECORD_ID_PREFIX, &entry.label),
        Some(render_instructions(&entry.label, &entry.steps)),
    );
    record.label = Some(entry.label.clone());
    record.metadata.original_steps = Some(entry.steps.clone());
    record
}

/// Seed the record store from `fixture_path` unless it was seeded before.
///
/// A missing or unparseable fixture is a skip, not an error, and leaves the
/// flag unwritten so a later run with a valid fixture still seeds. Store
/// failures are returned.
pub fn bootstrap(storage: &mut Storage, fixture_path: &Path) -> Result<BootstrapOutcome> {
    if storage.has_flag(DEMO_DATA_FLAG)? {
        tracing::info!("demo data already loaded, skipping bootstrap");
        return Ok(BootstrapOutcome::skipped(SkipReason::AlreadyLoaded));
    }

    let fixture = match load_fixture(fixture_path) {
        Ok(fixture) => fixture,
        Err(Error::FixtureMissing(path)) => {
            tracing::warn!(path = %path.display(), "fixture not found, skipping bootstrap");
            return Ok(BootstrapOutcome::skipped(SkipReason::FixtureMissing));
        }
        Err(Error::FixtureUnreadable(msg)) => {
            tracing::warn!(error = %msg, "fixture unreadable, skipping bootstrap");
            return Ok(BootstrapOutcome::skipped(SkipReason::FixtureUnreadable));
        }
        Err(e) => return Err(e),
    };

    let records: Vec<Record> = fixture.tests.iter().map(fixture_record).collect();
    let inserted = if records.is_empty() {
        0
    } else {
        storage.insert_records(&records)?
    };

    // Written even for an empty fixture so startup never retries
    storage.set_flag_if_absent(DEMO_DATA_FLAG)?;

    tracing::info!(inserted, path = %fixture_path.display(), "bootstrap complete");
    Ok(BootstrapOutcome {
        inserted,
        skipped: false,
        reason: None,
    })
}

/// Run bootstrap as a startup hook. Errors are logged and swallowed.
pub fn run_startup_bootstrap(storage: &mut Storage, fixture_path: &Path) -> Option<BootstrapOutcome> {
    match bootstrap(storage, fixture_path) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(error = %e, "bootstrap failed, continuing startup");
            None
        }
    }
}
