//! Common test utilities for tilt integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch
//! the user's real data directory or system config.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// The `tilt()` method returns a `Command` that sets `TILT_DATA_DIR` and
/// points `TILT_CONFIG` at a file that doesn't exist, so neither the
/// caller's data nor their config leaks into a test.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the tilt binary with an isolated data directory.
    pub fn tilt(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tilt"));
        cmd.current_dir(self.data_dir.path());
        cmd.env("TILT_DATA_DIR", self.data_dir.path());
        cmd.env("TILT_CONFIG", self.data_dir.path().join("no-system-config.kdl"));
        cmd.env_remove("TILT_FIXTURE");
        cmd.env_remove("TILT_PORT");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    /// Write a bootstrap fixture and return its path.
    pub fn write_fixture(&self, contents: &str) -> PathBuf {
        let path = self.data_dir.path().join("fixture.json");
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Run a command that must succeed and parse its stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.tilt().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "tilt {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Create a record and return its id.
    pub fn create_record(&self, instructions: &str, label: Option<&str>, source: Option<&str>) -> String {
        let mut args = vec!["record", "create", instructions];
        if let Some(label) = label {
            args.extend(["--label", label]);
        }
        if let Some(source) = source {
            args.extend(["--source", source]);
        }
        self.json(&args)["id"].as_str().unwrap().to_string()
    }

    /// Create a stored test and return its id.
    pub fn create_test(&self, name: &str, tags: &[&str]) -> String {
        let mut args = vec!["test", "create", name];
        for tag in tags {
            args.extend(["--tag", tag]);
        }
        self.json(&args)["id"].as_str().unwrap().to_string()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
