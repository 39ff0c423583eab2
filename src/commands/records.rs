//! Execution record commands.
//!
//! Records are normally written by the agent-execution service; these commands
//! expose the same lifecycle transitions for operators and scripted setups.

use super::tags::validate_tag_name;
use super::{Output, json_string};
use crate::models::Record;
use crate::storage::{RECORD_ID_PREFIX, Storage, generate_id, parse_status};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Interpret a CLI payload: JSON if it parses, otherwise a plain string.
pub fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

impl Output for Record {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} [{}]", self.id, self.status)];
        if let Some(label) = &self.label {
            lines.push(format!("  Label: {}", label));
        }
        if let Some(source) = self.source() {
            lines.push(format!("  Source: {}", source));
        }
        if let Some(started) = self.started_at {
            lines.push(format!("  Started: {}", started.to_rfc3339()));
        }
        if let Some(completed) = self.completed_at {
            lines.push(format!("  Completed: {}", completed.to_rfc3339()));
        }
        if let Some(result) = &self.result {
            lines.push(format!("  Result: {}", result));
        }
        if let Some(error) = &self.error {
            lines.push(format!("  Error: {}", error));
        }
        if let Some(instructions) = &self.instructions {
            lines.push(String::new());
            lines.extend(instructions.lines().map(|l| format!("  {}", l)));
        }
        lines.join("\n")
    }
}

/// Create a pending record.
pub fn record_create(
    storage: &mut Storage,
    label: Option<String>,
    instructions: &str,
    source: Option<String>,
) -> Result<Record> {
    if instructions.trim().is_empty() {
        return Err(Error::InvalidArgument("Instructions are required".to_string()));
    }

    let source = match source.filter(|s| !s.trim().is_empty()) {
        Some(source) => Some(validate_tag_name(&source)?),
        None => None,
    };

    let mut record = Record::new(
        generate_id(RECORD_ID_PREFIX, instructions),
        Some(instructions.to_string()),
    );
    record.label = label.filter(|l| !l.trim().is_empty());
    record.metadata.source = source;

    storage.insert_record(&record)?;
    tracing::debug!(id = %record.id, "record created");
    Ok(record)
}

/// Records in insertion order.
#[derive(Debug, Serialize)]
pub struct RecordList {
    pub records: Vec<Record>,
    pub count: usize,
}

impl Output for RecordList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.records.is_empty() {
            return "No records.".to_string();
        }
        let mut lines = vec![format!("{} record(s):", self.count)];
        for record in &self.records {
            lines.push(format!(
                "  {} [{}] {}",
                record.id,
                record.status,
                crate::models::derived_name(record)
            ));
        }
        lines.join("\n")
    }
}

/// List records, optionally filtered by status.
pub fn record_list(storage: &Storage, status: Option<&str>) -> Result<RecordList> {
    let status = status.map(parse_status).transpose()?;
    let records: Vec<Record> = storage
        .list_records()?
        .into_iter()
        .filter(|r| status.is_none_or(|s| r.status == s))
        .collect();

    Ok(RecordList {
        count: records.len(),
        records,
    })
}

/// Show a record.
pub fn record_show(storage: &Storage, id: &str) -> Result<Record> {
    storage.get_record(id)
}

/// Mark a record as running.
pub fn record_start(storage: &mut Storage, id: &str) -> Result<Record> {
    let mut record = storage.get_record(id)?;
    record.start();
    storage.update_record(&record)?;
    Ok(record)
}

/// Mark a record as completed with an optional result payload.
pub fn record_complete(storage: &mut Storage, id: &str, result: Option<Value>) -> Result<Record> {
    let mut record = storage.get_record(id)?;
    record.complete(result);
    storage.update_record(&record)?;
    Ok(record)
}

/// Mark a record as failed with an error payload.
pub fn record_fail(storage: &mut Storage, id: &str, error: Value) -> Result<Record> {
    let mut record = storage.get_record(id)?;
    record.fail(error);
    storage.update_record(&record)?;
    Ok(record)
}
