//! Tilt - task-to-test lifecycle and tag consistency for agent execution records.
//!
//! This library provides the core functionality for the `tilt` CLI tool and its
//! HTTP surface: classifying execution records into tests, keeping tag identity
//! consistent across collections, one-time bootstrap seeding, bulk reset, and
//! test-suite export.

pub mod action_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;

use std::path::PathBuf;


/// Library-level error type for Tilt operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Fixture not found: {}", .0.display())]
    FixtureMissing(PathBuf),

    #[error("Fixture unreadable: {0}")]
    FixtureUnreadable(String),

    #[error("Timed out waiting for the store")]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout | Error::StoreUnavailable(_))
    }
}

/// Result type alias for Tilt operations.
pub type Result<T> = std::result::Result<T, Error>;
