//! Test commands: the reconciled listing plus CRUD for stored tests.
//!
//! The listing merges two shapes. Every record projects into a derived test
//! (id = record id), followed by the user-authored tests from the `tests`
//! collection.

use super::tags::validate_tag_name;
use super::{Output, json_string};
use crate::models::{DerivedTest, StoredTest, TestView};
use crate::storage::{Storage, TEST_ID_PREFIX, generate_id};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trim tags, drop blanks, collapse duplicates, keep first-seen order.
///
/// Every kept tag must pass [`validate_tag_name`].
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if tag.trim().is_empty() {
            continue;
        }
        let tag = validate_tag_name(&tag)?;
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    Ok(normalized)
}

fn validate_test_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("Test name is required".to_string()));
    }
    Ok(name.to_string())
}

/// The reconciled test listing.
#[derive(Debug, Serialize)]
pub struct TestList {
    pub tests: Vec<TestView>,
    pub count: usize,
}

impl Output for TestList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.tests.is_empty() {
            return "No tests.".to_string();
        }
        let mut lines = vec![format!("{} test(s):", self.count)];
        for view in &self.tests {
            let kind = match view {
                TestView::Derived { .. } => "derived",
                TestView::Stored(_) => "stored",
            };
            let tags = if view.tags().is_empty() {
                String::new()
            } else {
                format!(" [{}]", view.tags().join(", "))
            };
            lines.push(format!("  {} ({}) {}{}", view.id(), kind, view.name(), tags));
        }
        lines.join("\n")
    }
}

/// List derived tests followed by stored tests, optionally filtered by tag.
pub fn test_list(storage: &Storage, tag: Option<&str>) -> Result<TestList> {
    let now = Utc::now();
    let derived = storage.list_records()?.into_iter().map(|record| TestView::Derived {
        id: record.id.clone(),
        test: DerivedTest::from_record(&record, now),
    });
    let stored = storage.list_tests()?.into_iter().map(TestView::Stored);

    let tests: Vec<TestView> = derived
        .chain(stored)
        .filter(|view| tag.is_none_or(|t| view.tags().iter().any(|vt| vt == t)))
        .collect();

    Ok(TestList {
        count: tests.len(),
        tests,
    })
}

impl Output for StoredTest {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} {}", self.id, self.name)];
        if !self.tags.is_empty() {
            lines.push(format!("  Tags: {}", self.tags.join(", ")));
        }
        for (i, step) in self.steps.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, step));
        }
        lines.push(format!("  Updated: {}", self.updated_at.to_rfc3339()));
        lines.join("\n")
    }
}

impl Output for TestView {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match self {
            TestView::Stored(test) => test.to_human(),
            TestView::Derived { id, test } => {
                let mut lines = vec![
                    format!("{} {} (derived, {})", id, test.name, test.status),
                ];
                if !test.tags.is_empty() {
                    lines.push(format!("  Tags: {}", test.tags.join(", ")));
                }
                for (i, step) in test.steps.iter().enumerate() {
                    lines.push(format!("  {}. {}", i + 1, step));
                }
                if let Some(last_run) = test.last_run {
                    lines.push(format!("  Last run: {}", last_run.to_rfc3339()));
                }
                lines.join("\n")
            }
        }
    }
}

/// Create a stored test.
pub fn test_create(
    storage: &mut Storage,
    name: &str,
    tags: Vec<String>,
    steps: Vec<String>,
) -> Result<StoredTest> {
    let name = validate_test_name(name)?;
    let mut test = StoredTest::new(generate_id(TEST_ID_PREFIX, &name), name);
    test.tags = normalize_tags(tags)?;
    test.steps = steps;

    storage.insert_test(&test)?;
    tracing::debug!(id = %test.id, "stored test created");
    Ok(test)
}

/// Show a stored test, or the derived projection of a record with that id.
pub fn test_show(storage: &Storage, id: &str) -> Result<TestView> {
    match storage.get_test(id) {
        Ok(test) => Ok(TestView::Stored(test)),
        Err(Error::NotFound(_)) => {
            let record = storage.get_record(id).map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(format!("Test not found: {}", id)),
                other => other,
            })?;
            Ok(TestView::Derived {
                id: record.id.clone(),
                test: DerivedTest::from_record(&record, Utc::now()),
            })
        }
        Err(e) => Err(e),
    }
}

/// Update fields of a stored test. Bumps `updated_at`.
pub fn test_update(
    storage: &mut Storage,
    id: &str,
    name: Option<String>,
    tags: Option<Vec<String>>,
    steps: Option<Vec<String>>,
) -> Result<StoredTest> {
    if name.is_none() && tags.is_none() && steps.is_none() {
        return Err(Error::InvalidArgument(
            "Nothing to update: provide name, tags, or steps".to_string(),
        ));
    }

    let mut test = storage.get_test(id)?;
    if let Some(name) = name {
        test.name = validate_test_name(&name)?;
    }
    if let Some(tags) = tags {
        test.tags = normalize_tags(tags)?;
    }
    if let Some(steps) = steps {
        test.steps = steps;
    }
    test.updated_at = Utc::now();

    storage.update_test(&test)?;
    Ok(test)
}

/// Result of deleting a stored test.
#[derive(Debug, Serialize)]
pub struct TestDeleted {
    pub success: bool,
    pub id: String,
}

impl Output for TestDeleted {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!("Deleted test {}", self.id)
    }
}

/// Delete a stored test. Derived tests cannot be deleted.
pub fn test_delete(storage: &mut Storage, id: &str) -> Result<TestDeleted> {
    storage.delete_test(id)?;
    Ok(TestDeleted {
        success: true,
        id: id.to_string(),
    })
}

/// Direction of a bulk tag operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkTagAction {
    Add,
    Remove,
}

impl FromStr for BulkTagAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            other => Err(Error::InvalidArgument(format!(
                "Invalid action '{}': expected add or remove",
                other
            ))),
        }
    }
}

/// Result of a bulk tag operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTagResult {
    pub success: bool,
    pub tests_modified: usize,
    pub tasks_modified: usize,
    pub total_modified: usize,
}

impl Output for BulkTagResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Modified {} test(s) and {} record(s)",
            self.tests_modified, self.tasks_modified
        )
    }
}

/// Add or remove a tag across a mix of stored test ids and record ids.
///
/// Stored tests gain or lose the tag in their tag set. Records have their
/// `metadata.source` set to the tag, or cleared where it equals the tag.
pub fn bulk_tag(
    storage: &mut Storage,
    ids: &[String],
    tag: &str,
    action: BulkTagAction,
) -> Result<BulkTagResult> {
    if ids.is_empty() {
        return Err(Error::InvalidArgument(
            "At least one test id is required".to_string(),
        ));
    }
    let tag = validate_tag_name(tag)?;

    let (tests_modified, tasks_modified) = match action {
        BulkTagAction::Add => (
            storage.add_tag_to_tests(ids, &tag)?,
            storage.set_source_for(ids, &tag)?,
        ),
        BulkTagAction::Remove => (
            storage.remove_tag_from_tests(ids, &tag)?,
            storage.unset_source_for(ids, &tag)?,
        ),
    };

    tracing::info!(tag = %tag, ?action, tests_modified, tasks_modified, "bulk tag");

    Ok(BulkTagResult {
        success: true,
        tests_modified,
        tasks_modified,
        total_modified: tests_modified + tasks_modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " a ".to_string(),
            "".to_string(),
            "b".to_string(),
            "a".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(normalize_tags(tags).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_create_requires_name() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        assert!(matches!(
            test_create(&mut storage, "  ", vec![], vec![]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_create_and_show_stored() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let created = test_create(
            &mut storage,
            "Checkout",
            vec!["smoke".to_string(), "smoke".to_string()],
            vec!["open cart".to_string()],
        )
        .unwrap();
        assert!(created.id.starts_with("ts-"));
        assert_eq!(created.tags, vec!["smoke"]);

        match test_show(&storage, &created.id).unwrap() {
            TestView::Stored(test) => assert_eq!(test.steps, vec!["open cart"]),
            other => panic!("expected stored test, got {:?}", other),
        }
    }

    #[test]
    fn test_show_falls_back_to_record() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let mut record = Record::new("tk-1".to_string(), Some("step one".to_string()));
        record.label = Some("Airbnb search".to_string());
        storage.insert_record(&record).unwrap();

        match test_show(&storage, "tk-1").unwrap() {
            TestView::Derived { id, test } => {
                assert_eq!(id, "tk-1");
                assert_eq!(test.tags, vec!["airbnb"]);
            }
            other => panic!("expected derived test, got {:?}", other),
        }
        assert!(matches!(
            test_show(&storage, "nope"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_show_keeps_store_errors() {
        let env = TestEnv::new();
        let storage = env.storage();
        storage.conn().execute_batch("DROP TABLE tasks").unwrap();

        assert!(matches!(
            test_show(&storage, "tk-1"),
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_normalize_tags_rejects_long_tag() {
        assert!(matches!(
            normalize_tags(vec!["ok".to_string(), "a".repeat(101)]),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(normalize_tags(vec!["a".repeat(100)]).unwrap().len(), 1);
    }

    #[test]
    fn test_create_and_update_reject_long_tag() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        assert!(matches!(
            test_create(&mut storage, "A", vec!["a".repeat(101)], vec![]),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(storage.list_tests().unwrap().len(), 0);

        let created = test_create(&mut storage, "A", vec!["ok".to_string()], vec![]).unwrap();
        assert!(matches!(
            test_update(&mut storage, &created.id, None, Some(vec!["a".repeat(101)]), None),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(storage.get_test(&created.id).unwrap().tags, vec!["ok"]);
    }

    #[test]
    fn test_list_reconciles_derived_then_stored() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let mut record = Record::new("tk-1".to_string(), Some("x".to_string()));
        record.metadata.source = Some("nightly".to_string());
        storage.insert_record(&record).unwrap();
        test_create(&mut storage, "Manual", vec!["smoke".to_string()], vec![]).unwrap();

        let list = test_list(&storage, None).unwrap();
        assert_eq!(list.count, 2);
        assert!(matches!(list.tests[0], TestView::Derived { .. }));
        assert!(matches!(list.tests[1], TestView::Stored(_)));

        let filtered = test_list(&storage, Some("nightly")).unwrap();
        assert_eq!(filtered.count, 1);
        assert_eq!(filtered.tests[0].id(), "tk-1");
    }

    #[test]
    fn test_update_changes_fields_and_bumps_timestamp() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let created = test_create(&mut storage, "A", vec![], vec![]).unwrap();

        let updated = test_update(
            &mut storage,
            &created.id,
            Some("B".to_string()),
            Some(vec!["t".to_string()]),
            None,
        )
        .unwrap();
        assert_eq!(updated.name, "B");
        assert_eq!(updated.tags, vec!["t"]);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(storage.get_test(&created.id).unwrap().name, "B");
    }

    #[test]
    fn test_update_requires_a_field() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let created = test_create(&mut storage, "A", vec![], vec![]).unwrap();
        assert!(matches!(
            test_update(&mut storage, &created.id, None, None, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            test_update(&mut storage, "ts-missing", Some("x".to_string()), None, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_stored() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        let created = test_create(&mut storage, "A", vec![], vec![]).unwrap();
        assert!(test_delete(&mut storage, &created.id).unwrap().success);
        assert!(matches!(
            test_delete(&mut storage, &created.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_bulk_tag_action_parse() {
        assert_eq!("ADD".parse::<BulkTagAction>().unwrap(), BulkTagAction::Add);
        assert_eq!(
            "remove".parse::<BulkTagAction>().unwrap(),
            BulkTagAction::Remove
        );
        assert!("toggle".parse::<BulkTagAction>().is_err());
    }

    #[test]
    fn test_bulk_tag_add_and_remove_across_collections() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        storage
            .insert_record(&Record::new("tk-1".to_string(), Some("x".to_string())))
            .unwrap();
        let stored = test_create(&mut storage, "A", vec![], vec![]).unwrap();
        let ids = vec!["tk-1".to_string(), stored.id.clone()];

        let added = bulk_tag(&mut storage, &ids, "regression", BulkTagAction::Add).unwrap();
        assert_eq!(added.tests_modified, 1);
        assert_eq!(added.tasks_modified, 1);
        assert_eq!(added.total_modified, 2);
        assert_eq!(
            storage.get_record("tk-1").unwrap().metadata.source.as_deref(),
            Some("regression")
        );
        assert_eq!(storage.get_test(&stored.id).unwrap().tags, vec!["regression"]);

        let removed = bulk_tag(&mut storage, &ids, "regression", BulkTagAction::Remove).unwrap();
        assert_eq!(removed.total_modified, 2);
        assert!(storage.get_record("tk-1").unwrap().metadata.source.is_none());
        assert!(storage.get_test(&stored.id).unwrap().tags.is_empty());
    }

    #[test]
    fn test_bulk_tag_validates_input() {
        let env = TestEnv::new();
        let mut storage = env.storage();
        assert!(matches!(
            bulk_tag(&mut storage, &[], "x", BulkTagAction::Add),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            bulk_tag(&mut storage, &["tk-1".to_string()], " ", BulkTagAction::Add),
            Err(Error::InvalidArgument(_))
        ));
    }
}
