//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The Rust struct representing the KDL schema
//! - Serialization/deserialization to/from KDL format
//! - Validation
//! - Loading from disk (a missing file is an empty config)

use crate::{Error, Result};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tilt settings stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// fixture-path "/srv/tilt/demo_tests.json"
/// request-timeout-ms 5000
/// server-host "127.0.0.1"
/// server-port 3040
/// log-level "info"
/// action-log #true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiltConfig {
    /// Bootstrap fixture file
    pub fixture_path: Option<PathBuf>,

    /// Upper bound on how long a request waits for the store
    pub request_timeout_ms: Option<u64>,

    pub server_host: Option<String>,

    pub server_port: Option<u16>,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: Option<String>,

    /// Whether CLI commands are appended to the action log
    pub action_log: Option<bool>,
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl TiltConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.request_timeout_ms == Some(0) {
            return Err("request-timeout-ms must be greater than 0".to_string());
        }
        if self.server_port == Some(0) {
            return Err("server-port must be 1-65535".to_string());
        }
        if let Some(level) = &self.log_level {
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(format!(
                    "log-level must be one of {}, got {}",
                    LOG_LEVELS.join(", "),
                    level
                ));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        config.fixture_path = first_value(doc, "fixture-path")
            .and_then(|v| v.as_string())
            .map(PathBuf::from);

        config.request_timeout_ms = first_value(doc, "request-timeout-ms")
            .and_then(|v| v.as_integer())
            .and_then(|i| u64::try_from(i).ok());

        config.server_host = first_value(doc, "server-host")
            .and_then(|v| v.as_string())
            .map(str::to_string);

        config.server_port = first_value(doc, "server-port")
            .and_then(|v| v.as_integer())
            .and_then(|i| u16::try_from(i).ok());

        config.log_level = first_value(doc, "log-level")
            .and_then(|v| v.as_string())
            .map(str::to_string);

        config.action_log = first_value(doc, "action-log").and_then(|v| v.as_bool());

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref path) = self.fixture_path {
            push_node(
                &mut doc,
                "fixture-path",
                KdlValue::String(path.display().to_string()),
            );
        }
        if let Some(ms) = self.request_timeout_ms {
            push_node(&mut doc, "request-timeout-ms", KdlValue::Integer(ms as i128));
        }
        if let Some(ref host) = self.server_host {
            push_node(&mut doc, "server-host", KdlValue::String(host.clone()));
        }
        if let Some(port) = self.server_port {
            push_node(&mut doc, "server-port", KdlValue::Integer(port as i128));
        }
        if let Some(ref level) = self.log_level {
            push_node(&mut doc, "log-level", KdlValue::String(level.clone()));
        }
        if let Some(enabled) = self.action_log {
            push_node(&mut doc, "action-log", KdlValue::Bool(enabled));
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &TiltConfig) {
        if other.fixture_path.is_some() {
            self.fixture_path = other.fixture_path.clone();
        }
        if other.request_timeout_ms.is_some() {
            self.request_timeout_ms = other.request_timeout_ms;
        }
        if other.server_host.is_some() {
            self.server_host = other.server_host.clone();
        }
        if other.server_port.is_some() {
            self.server_port = other.server_port;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level.clone();
        }
        if other.action_log.is_some() {
            self.action_log = other.action_log;
        }
    }

    /// Load config.kdl from `path`. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };

        let doc: KdlDocument = contents
            .parse()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))?;
        Ok(config)
    }
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}
