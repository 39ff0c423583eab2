//! Integration tests for test operations via CLI.
//!
//! These tests verify:
//! - `tilt test create/list/show/update/delete` work for stored tests
//! - Records show up as derived tests with classified tags
//! - `tilt test bulk-tag` touches stored tests and records together

mod common;

use common::TestEnv;
use predicates::prelude::*;

// === Create / Show ===

#[test]
fn test_test_create_json() {
    let env = TestEnv::new();

    env.tilt()
        .args(["test", "create", "Login works", "-t", "auth", "-s", "Open login"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\":\"ts-"))
        .stdout(predicate::str::contains("\"name\":\"Login works\""));
}

#[test]
fn test_test_create_human() {
    let env = TestEnv::new();

    env.tilt()
        .args(["-H", "test", "create", "Login works", "-s", "Open login", "-s", "Submit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Login works"))
        .stdout(predicate::str::contains("1. Open login"))
        .stdout(predicate::str::contains("2. Submit"));
}

#[test]
fn test_test_create_dedupes_tags() {
    let env = TestEnv::new();
    let id = env.create_test("Login", &["auth", " auth ", "", "smoke"]);

    let test = env.json(&["test", "show", &id]);
    assert_eq!(test["kind"], "stored");
    assert_eq!(test["tags"], serde_json::json!(["auth", "smoke"]));
}

#[test]
fn test_test_show_record_is_derived() {
    let env = TestEnv::new();
    let id = env.create_record("Open airbnb.com\nSearch Lisbon", Some("Airbnb search"), None);

    let test = env.json(&["test", "show", &id]);
    assert_eq!(test["kind"], "derived");
    assert_eq!(test["id"], id.as_str());
    assert_eq!(test["name"], "Airbnb search");
    assert_eq!(test["tags"], serde_json::json!(["airbnb"]));
    assert_eq!(
        test["steps"],
        serde_json::json!(["Open airbnb.com", "Search Lisbon"])
    );
    assert_eq!(test["original_task_id"], id.as_str());
    assert!(test["lastRun"].is_null());
}

#[test]
fn test_test_show_unknown_fails() {
    let env = TestEnv::new();

    env.tilt()
        .args(["test", "show", "ts-missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// === List ===

#[test]
fn test_test_list_derived_then_stored() {
    let env = TestEnv::new();
    let stored = env.create_test("Stored one", &[]);
    let record = env.create_record("Do it", Some("Derived one"), None);

    let list = env.json(&["test", "list"]);
    let tests = list["tests"].as_array().unwrap();
    assert_eq!(list["count"], 2);
    assert_eq!(tests[0]["id"], record.as_str());
    assert_eq!(tests[0]["kind"], "derived");
    assert_eq!(tests[1]["id"], stored.as_str());
    assert_eq!(tests[1]["kind"], "stored");
}

#[test]
fn test_test_list_filter_by_tag() {
    let env = TestEnv::new();
    env.create_test("Tagged", &["smoke"]);
    env.create_test("Untagged", &[]);
    env.create_record("Nightly automation run", None, None);
    env.create_record("Plain", None, Some("smoke"));

    let list = env.json(&["test", "list", "--tag", "smoke"]);
    assert_eq!(list["count"], 2);

    let list = env.json(&["test", "list", "--tag", "automation"]);
    assert_eq!(list["count"], 1);
}

#[test]
fn test_test_list_human_empty() {
    let env = TestEnv::new();

    env.tilt()
        .args(["-H", "test", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tests."));
}

// === Update / Delete ===

#[test]
fn test_test_update_replaces_fields() {
    let env = TestEnv::new();
    let id = env.create_test("Login", &["auth"]);

    let updated = env.json(&["test", "update", &id, "--name", "Login v2", "-t", "smoke"]);
    assert_eq!(updated["name"], "Login v2");
    assert_eq!(updated["tags"], serde_json::json!(["smoke"]));
}

#[test]
fn test_test_update_without_fields_fails() {
    let env = TestEnv::new();
    let id = env.create_test("Login", &[]);

    env.tilt()
        .args(["test", "update", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to update"));
}

#[test]
fn test_test_delete() {
    let env = TestEnv::new();
    let id = env.create_test("Login", &["auth"]);

    env.tilt()
        .args(["test", "delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\":true"));

    env.tilt().args(["test", "show", &id]).assert().failure();
}

// === Bulk tag ===

#[test]
fn test_bulk_tag_add_and_remove() {
    let env = TestEnv::new();
    let test = env.create_test("Login", &[]);
    let record = env.create_record("Do it", None, None);

    let added = env.json(&["test", "bulk-tag", "smoke", &test, &record]);
    assert_eq!(added["success"], true);
    assert_eq!(added["testsModified"], 1);
    assert_eq!(added["tasksModified"], 1);
    assert_eq!(added["totalModified"], 2);

    let derived = env.json(&["test", "show", &record]);
    assert_eq!(derived["tags"], serde_json::json!(["smoke"]));

    let removed = env.json(&["test", "bulk-tag", "smoke", "--action", "remove", &test, &record]);
    assert_eq!(removed["testsModified"], 1);
    assert_eq!(removed["tasksModified"], 1);

    let stored = env.json(&["test", "show", &test]);
    assert_eq!(stored["tags"], serde_json::json!([]));
}

#[test]
fn test_bulk_tag_remove_leaves_other_source() {
    let env = TestEnv::new();
    let record = env.create_record("Do it", None, Some("keep"));

    let removed = env.json(&["test", "bulk-tag", "smoke", "--action", "remove", &record]);
    assert_eq!(removed["tasksModified"], 0);

    let shown = env.json(&["record", "show", &record]);
    assert_eq!(shown["metadata"]["source"], "keep");
}

#[test]
fn test_bulk_tag_requires_ids() {
    let env = TestEnv::new();

    env.tilt().args(["test", "bulk-tag", "smoke"]).assert().failure();
}

#[test]
fn test_bulk_tag_rejects_unknown_action() {
    let env = TestEnv::new();

    env.tilt()
        .args(["test", "bulk-tag", "smoke", "--action", "toggle", "ts-1"])
        .assert()
        .failure();
}
