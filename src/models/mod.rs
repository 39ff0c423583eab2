//! Data models for Tilt entities.
//!
//! This module defines the core data structures:
//! - `Record` - Raw agent-execution entries ("tasks") with status and results
//! - `Tag` - Registry entries with display color and description
//! - `StoredTest` - User-authored tests kept in their own collection
//! - `DerivedTest` - The test projection computed from a `Record`
//! - `AppState` - The global run-state singleton
//! - `Fixture` - Bootstrap input format

pub mod classifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Color assigned to tags that have no registry entry or no explicit color.
pub const DEFAULT_TAG_COLOR: &str = "#3b82f6";

/// Record status in the execution lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Pending,
    Running,
    /// Older agents reported successful runs as "passed"
    #[serde(alias = "passed")]
    Completed,
    #[serde(alias = "failed")]
    Error,
}

impl RecordStatus {
    /// Parse a status string, accepting the legacy spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "passed" => Some(Self::Completed),
            "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Free-form metadata attached to a record.
///
/// Only `source` and `original_steps` carry meaning here; any other keys written
/// by the execution service are preserved untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// External tag hint (also the legacy single-tag slot)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Steps the record was generated from, in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_steps: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RecordMetadata {
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.original_steps.is_none() && self.extra.is_empty()
    }
}

/// A raw agent-execution entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identifier (e.g., "tk-1a2b3c4d")
    pub id: String,

    /// Short display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Free-text instructions handed to the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default)]
    pub status: RecordStatus,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Result payload reported by the agent
    #[serde(default)]
    pub result: Option<serde_json::Value>,

    /// Error payload reported by the agent
    #[serde(default)]
    pub error: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "RecordMetadata::is_empty")]
    pub metadata: RecordMetadata,
}

impl Record {
    /// Create a new pending record.
    pub fn new(id: String, instructions: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            label: None,
            instructions,
            status: RecordStatus::Pending,
            created_at: Some(now),
            updated_at: Some(now),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            metadata: RecordMetadata::default(),
        }
    }

    /// The external tag hint, ignoring empty values.
    pub fn source(&self) -> Option<&str> {
        self.metadata
            .source
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// Mark the record as picked up by an agent.
    pub fn start(&mut self) {
        let now = Utc::now();
        self.status = RecordStatus::Running;
        self.started_at = Some(now);
        self.completed_at = None;
        self.result = None;
        self.error = None;
        self.updated_at = Some(now);
    }

    /// Mark the record as finished successfully.
    pub fn complete(&mut self, result: Option<serde_json::Value>) {
        let now = Utc::now();
        self.status = RecordStatus::Completed;
        self.completed_at = Some(now);
        self.result = result;
        self.updated_at = Some(now);
    }

    /// Mark the record as failed.
    pub fn fail(&mut self, error: serde_json::Value) {
        let now = Utc::now();
        self.status = RecordStatus::Error;
        self.completed_at = Some(now);
        self.error = Some(error);
        self.updated_at = Some(now);
    }

    /// Force the record back to pending, clearing all run state.
    pub fn reset(&mut self) {
        self.status = RecordStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.result = None;
        self.error = None;
    }

    /// Whether the record satisfies the pending invariant.
    pub fn is_clean_pending(&self) -> bool {
        self.status == RecordStatus::Pending
            && self.started_at.is_none()
            && self.completed_at.is_none()
            && self.result.is_none()
            && self.error.is_none()
    }
}

/// A tag registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique tag name
    pub name: String,

    /// Display color (CSS color string)
    pub color: String,

    #[serde(default)]
    pub description: String,

    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Create a tag with the default description.
    pub fn new(name: String, color: Option<String>) -> Self {
        Self {
            name,
            color: color.unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string()),
            description: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// A tag as shown to callers, whether or not it has a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub color: String,
    pub description: String,
}

impl TagInfo {
    /// A tag known only from references, with no registry enrichment.
    pub fn synthesized(name: String) -> Self {
        Self {
            name,
            color: DEFAULT_TAG_COLOR.to_string(),
            description: String::new(),
        }
    }
}

/// A user-authored test stored in the `tests` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTest {
    /// Unique identifier (e.g., "ts-1a2b3c4d")
    pub id: String,

    pub name: String,

    /// Tag names, unique, in insertion order
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub steps: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl StoredTest {
    /// Create a new stored test.
    pub fn new(id: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            tags: Vec::new(),
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a tag if not already present. Returns true if it was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }
}

/// The test projection of a record, as exported and listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTest {
    pub name: String,
    pub steps: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: RecordStatus,
    #[serde(rename = "lastRun")]
    pub last_run: Option<DateTime<Utc>>,
    pub original_task_id: String,
    pub metadata: Option<RecordMetadata>,
}

/// Max characters of instructions used when a record has no label.
pub const DERIVED_NAME_MAX_CHARS: usize = 100;

impl DerivedTest {
    /// Project a record into its test shape.
    ///
    /// `now` stands in for timestamps the record never had.
    pub fn from_record(record: &Record, now: DateTime<Utc>) -> Self {
        let created_at = record.created_at.unwrap_or(now);
        Self {
            name: derived_name(record),
            steps: derived_steps(record),
            tags: classifier::classify(record),
            created_at,
            updated_at: record.updated_at.or(record.created_at).unwrap_or(now),
            status: record.status,
            last_run: record.completed_at,
            original_task_id: record.id.clone(),
            metadata: (!record.metadata.is_empty()).then(|| record.metadata.clone()),
        }
    }
}

/// Display name for a record: label, else truncated instructions, else a placeholder.
pub fn derived_name(record: &Record) -> String {
    if let Some(label) = record.label.as_deref().filter(|l| !l.is_empty()) {
        return label.to_string();
    }
    match record.instructions.as_deref().filter(|i| !i.is_empty()) {
        Some(instructions) => {
            let head: String = instructions.chars().take(DERIVED_NAME_MAX_CHARS).collect();
            format!("{}...", head)
        }
        None => "Untitled Test".to_string(),
    }
}

/// Steps for a record: the original steps if kept, else non-blank instruction lines.
pub fn derived_steps(record: &Record) -> Vec<String> {
    if let Some(steps) = &record.metadata.original_steps {
        return steps.clone();
    }
    record
        .instructions
        .as_deref()
        .map(|text| {
            text.lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// One entry of the reconciled test listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestView {
    /// Projected from a record; `id` is the record id
    Derived {
        id: String,
        #[serde(flatten)]
        test: DerivedTest,
    },
    Stored(StoredTest),
}

impl TestView {
    pub fn id(&self) -> &str {
        match self {
            Self::Derived { id, .. } => id,
            Self::Stored(test) => &test.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Derived { test, .. } => &test.name,
            Self::Stored(test) => &test.name,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Derived { test, .. } => &test.tags,
            Self::Stored(test) => &test.tags,
        }
    }
}

/// Global run state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// Key of the one and only app state document.
pub const APP_STATE_ID: &str = "global";

/// The global run-state singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(rename = "_id")]
    pub id: String,
    pub run_state: RunState,
    pub last_reset: DateTime<Utc>,
    /// Weak reference; the record may no longer exist
    #[serde(default)]
    pub active_task_id: Option<String>,
}

impl AppState {
    /// The state written by a reset.
    pub fn idle(now: DateTime<Utc>) -> Self {
        Self {
            id: APP_STATE_ID.to_string(),
            run_state: RunState::Idle,
            last_reset: now,
            active_task_id: None,
        }
    }
}

/// Bootstrap fixture file: `{ "tests": [ { "label": ..., "steps": [...] } ] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub tests: Vec<FixtureEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureEntry {
    pub label: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Record counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    /// Count one record with the given status.
    pub fn add(&mut self, status: RecordStatus, n: usize) {
        self.total += n;
        match status {
            RecordStatus::Pending => self.pending += n,
            RecordStatus::Running => self.running += n,
            RecordStatus::Completed => self.completed += n,
            RecordStatus::Error => self.error += n,
        }
    }
}
