//! Tag registry commands.
//!
//! Tag identity is the name. Deleting a tag cascades through the two places a
//! tag name is denormalized (record `metadata.source` and stored test tags)
//! before the registry entry goes. The cascade is sequential and best-effort:
//! each step is idempotent, the registry entry is removed last, and a failed
//! step stops the cascade with the counts gathered so far.

use super::{Output, json_string};
use crate::models::{Tag, TagInfo};
use crate::storage::Storage;
use crate::{Error, Result};
use serde::Serialize;

/// Longest accepted tag name, in characters.
pub const MAX_TAG_NAME_CHARS: usize = 100;

/// Validate a tag name and return its trimmed form.
pub fn validate_tag_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("Tag name is required".to_string()));
    }
    if trimmed.chars().count() > MAX_TAG_NAME_CHARS {
        return Err(Error::InvalidArgument(format!(
            "Tag name must be {} characters or fewer",
            MAX_TAG_NAME_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Result of creating a tag.
#[derive(Debug, Serialize)]
pub struct TagCreated {
    pub success: bool,
    /// False when the tag already existed and was left untouched
    pub created: bool,
    pub name: String,
    pub color: String,
}

impl Output for TagCreated {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.created {
            format!("Created tag '{}' ({})", self.name, self.color)
        } else {
            format!("Tag '{}' already exists ({})", self.name, self.color)
        }
    }
}

/// Create a registry entry if absent. Never overwrites an existing tag.
pub fn tag_create(storage: &mut Storage, name: &str, color: Option<String>) -> Result<TagCreated> {
    let name = validate_tag_name(name)?;
    let color = color
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let created = storage.insert_tag_if_absent(&Tag::new(name.clone(), color))?;
    let tag = storage
        .get_tag(&name)?
        .ok_or_else(|| Error::Other(format!("Tag '{}' vanished after insert", name)))?;

    tracing::debug!(tag = %name, created, "tag create");

    Ok(TagCreated {
        success: true,
        created,
        name,
        color: tag.color,
    })
}

/// Result of a cascading tag delete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDeleted {
    /// False if a cascade step failed; the counts show how far it got
    pub success: bool,
    pub name: String,
    pub modified_tasks: usize,
    pub modified_tests: usize,
    pub deleted_tag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Output for TagDeleted {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Tag '{}': {} record(s) untagged, {} test(s) untagged, registry entry {}",
            self.name,
            self.modified_tasks,
            self.modified_tests,
            if self.deleted_tag { "deleted" } else { "not present" }
        )];
        if let Some(err) = &self.error {
            lines.push(format!("Cascade incomplete: {}", err));
            lines.push("Re-run the delete to finish; every step is safe to repeat.".to_string());
        }
        lines.join("\n")
    }
}

/// Delete a tag everywhere it is referenced: records, then stored tests, then
/// the registry.
///
/// The name is matched exactly as stored, so any name `tag_list` shows can be
/// deleted.
pub fn tag_delete(storage: &mut Storage, name: &str) -> Result<TagDeleted> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("Tag name is required".to_string()));
    }
    let mut outcome = TagDeleted {
        success: false,
        name: name.to_string(),
        modified_tasks: 0,
        modified_tests: 0,
        deleted_tag: false,
        error: None,
    };

    match cascade(storage, &mut outcome) {
        Ok(()) => {
            outcome.success = true;
            tracing::info!(
                tag = %outcome.name,
                modified_tasks = outcome.modified_tasks,
                modified_tests = outcome.modified_tests,
                deleted_tag = outcome.deleted_tag,
                "tag deleted"
            );
        }
        Err(e) => {
            tracing::error!(
                tag = %outcome.name,
                modified_tasks = outcome.modified_tasks,
                modified_tests = outcome.modified_tests,
                error = %e,
                "tag delete cascade stopped early"
            );
            outcome.error = Some(e.to_string());
        }
    }

    Ok(outcome)
}

fn cascade(storage: &mut Storage, outcome: &mut TagDeleted) -> Result<()> {
    outcome.modified_tasks = storage.unset_source_everywhere(&outcome.name)?;
    outcome.modified_tests = storage.pull_tag_everywhere(&outcome.name)?;
    outcome.deleted_tag = storage.delete_tag(&outcome.name)?;
    Ok(())
}

/// All known tags.
#[derive(Debug, Serialize)]
pub struct TagList {
    pub tags: Vec<TagInfo>,
    pub count: usize,
}

impl Output for TagList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.tags.is_empty() {
            return "No tags.".to_string();
        }
        let mut lines = vec![format!("{} tag(s):", self.count)];
        for tag in &self.tags {
            if tag.description.is_empty() {
                lines.push(format!("  {} {}", tag.color, tag.name));
            } else {
                lines.push(format!("  {} {} - {}", tag.color, tag.name, tag.description));
            }
        }
        lines.join("\n")
    }
}

/// List every tag from the registry, record sources, and stored tests.
pub fn tag_list(storage: &Storage) -> Result<TagList> {
    let tags = storage.list_tags()?;
    Ok(TagList {
        count: tags.len(),
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_TAG_COLOR, Record, StoredTest};
    use crate::test_utils::TestEnv;

    fn seed_references(storage: &mut Storage, tag: &str) {
        let mut tagged = Record::new("tk-1".to_string(), Some("a".to_string()));
        tagged.metadata.source = Some(tag.to_string());
        let mut other = Record::new("tk-2".to_string(), Some("b".to_string()));
        other.metadata.source = Some("other".to_string());
        storage.insert_records(&[tagged, other]).unwrap();

        let mut test = StoredTest::new("ts-1".to_string(), "T".to_string());
        test.tags = vec![tag.to_string(), "keep".to_string()];
        storage.insert_test(&test).unwrap();
    }

    #[test]
    fn test_validate_tag_name() {
        assert_eq!(validate_tag_name("  smoke ").unwrap(), "smoke");
        assert!(matches!(validate_tag_name("   "), Err(Error::InvalidArgument(_))));
        assert!(validate_tag_name(&"a".repeat(100)).is_ok());
        assert!(matches!(
            validate_tag_name(&"a".repeat(101)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_tag_create_twice_keeps_first() {
        let env = TestEnv::new();
        let mut storage = env.storage();

        let first = tag_create(&mut storage, "x", Some("#ff0000".to_string())).unwrap();
        assert!(first.created);
        let second = tag_create(&mut storage, "x", Some("#00ff00".to_string())).unwrap();
        assert!(!second.created);
        assert_eq!(second.color, "#ff0000");

        let registered: Vec<_> = tag_list(&storage)
            .unwrap()
            .tags
            .into_iter()
            .filter(|t| t.name == "x")
            .collect();
        assert_eq!(registered.len(), 1);
    }

    #[test]
    fn test_tag_create_blank_color_uses_default() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let result = tag_create(&mut storage, "x", Some("  ".to_string())).unwrap();
        assert_eq!(result.color, DEFAULT_TAG_COLOR);
    }

    #[test]
    fn test_tag_create_rejects_blank_name() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        assert!(matches!(
            tag_create(&mut storage, " ", None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_tag_delete_cascades_everywhere() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        tag_create(&mut storage, "x", None).unwrap();
        seed_references(&mut storage, "x");

        let result = tag_delete(&mut storage, "x").unwrap();
        assert!(result.success);
        assert_eq!(result.modified_tasks, 1);
        assert_eq!(result.modified_tests, 1);
        assert!(result.deleted_tag);

        assert!(storage.get_record("tk-1").unwrap().metadata.source.is_none());
        assert_eq!(
            storage.get_record("tk-2").unwrap().metadata.source.as_deref(),
            Some("other")
        );
        assert_eq!(storage.get_test("ts-1").unwrap().tags, vec!["keep"]);
        assert!(storage.get_tag("x").unwrap().is_none());
        assert!(tag_list(&storage).unwrap().tags.iter().all(|t| t.name != "x"));
    }

    #[test]
    fn test_tag_delete_unregistered_tag_still_cascades() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        seed_references(&mut storage, "legacy");

        let result = tag_delete(&mut storage, "legacy").unwrap();
        assert!(result.success);
        assert_eq!(result.modified_tasks, 1);
        assert_eq!(result.modified_tests, 1);
        assert!(!result.deleted_tag);
    }

    #[test]
    fn test_tag_delete_is_repeatable() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        tag_create(&mut storage, "x", None).unwrap();
        seed_references(&mut storage, "x");

        tag_delete(&mut storage, "x").unwrap();
        let again = tag_delete(&mut storage, "x").unwrap();
        assert!(again.success);
        assert_eq!(again.modified_tasks, 0);
        assert_eq!(again.modified_tests, 0);
        assert!(!again.deleted_tag);
    }

    #[test]
    fn test_tag_delete_matches_stored_name_exactly() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let long = "a".repeat(101);
        let mut record = Record::new("tk-1".to_string(), Some("a".to_string()));
        record.metadata.source = Some(" padded ".to_string());
        storage.insert_record(&record).unwrap();
        let mut test = StoredTest::new("ts-1".to_string(), "T".to_string());
        test.tags = vec![long.clone()];
        storage.insert_test(&test).unwrap();

        let padded = tag_delete(&mut storage, " padded ").unwrap();
        assert!(padded.success);
        assert_eq!(padded.modified_tasks, 1);

        let long_result = tag_delete(&mut storage, &long).unwrap();
        assert!(long_result.success);
        assert_eq!(long_result.modified_tests, 1);

        assert_eq!(tag_list(&storage).unwrap().count, 0);
    }

    #[test]
    fn test_tag_delete_rejects_empty_name() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        assert!(matches!(
            tag_delete(&mut storage, ""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_tag_delete_stops_when_a_step_fails() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        tag_create(&mut storage, "x", None).unwrap();
        seed_references(&mut storage, "x");
        storage
            .conn()
            .execute_batch(
                "CREATE TRIGGER hold_test_tags BEFORE DELETE ON test_tags
                 BEGIN SELECT RAISE(ABORT, 'test tags are locked'); END;",
            )
            .unwrap();

        let result = tag_delete(&mut storage, "x").unwrap();
        assert!(!result.success);
        assert_eq!(result.modified_tasks, 1);
        assert_eq!(result.modified_tests, 0);
        assert!(!result.deleted_tag);
        assert!(result.error.as_deref().unwrap().contains("test tags are locked"));

        // Records were untagged; the test and the registry entry were not
        assert!(storage.get_record("tk-1").unwrap().metadata.source.is_none());
        assert_eq!(storage.get_test("ts-1").unwrap().tags, vec!["x", "keep"]);
        assert!(storage.get_tag("x").unwrap().is_some());

        let json: serde_json::Value = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }

    #[test]
    fn test_tag_deleted_json_uses_camel_case() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let json: serde_json::Value =
            serde_json::from_str(&tag_delete(&mut storage, "x").unwrap().to_json()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["modifiedTasks"], 0);
        assert_eq!(json["modifiedTests"], 0);
        assert_eq!(json["deletedTag"], false);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_tag_list_synthesizes_referenced_names() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        seed_references(&mut storage, "x");

        let list = tag_list(&storage).unwrap();
        let names: Vec<&str> = list.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["keep", "other", "x"]);
        assert!(list.tags.iter().all(|t| t.color == DEFAULT_TAG_COLOR));
    }
}
