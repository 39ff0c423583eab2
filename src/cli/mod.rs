//! CLI argument definitions for Tilt.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tilt - task-to-test lifecycle and tag consistency for agent execution records.
#[derive(Parser, Debug)]
#[command(name = "tilt")]
#[command(author, about = "Turn agent execution records into taggable tests", long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TILT_GIT_COMMIT"), " ", env!("TILT_BUILD_TIMESTAMP"), ")"))]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Data directory holding tilt.db.
    /// Can also be set via TILT_DATA_DIR environment variable.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tag registry commands
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// Test commands (derived from records, or stored)
    Test {
        #[command(subcommand)]
        command: TestCommands,
    },

    /// Execution record commands
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Maintenance commands (bootstrap, reset, export)
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },

    /// UI settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Run the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (also TILT_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Fixture used by the startup bootstrap (also TILT_FIXTURE)
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
}

/// Tag subcommands
#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// List every tag: registry entries plus names used by records and tests
    List,

    /// Create a tag (no-op if it already exists)
    Create {
        /// Tag name (1-100 characters)
        name: String,

        /// Display color, e.g. "#ff8800"
        #[arg(short, long)]
        color: Option<String>,
    },

    /// Delete a tag and remove it from every record and test
    Delete {
        /// Tag name
        name: String,
    },
}

/// Test subcommands
#[derive(Subcommand, Debug)]
pub enum TestCommands {
    /// List derived and stored tests
    List {
        /// Only tests carrying this tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Create a stored test
    Create {
        /// Test name
        name: String,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Step (repeatable, kept in order)
        #[arg(short, long = "step")]
        steps: Vec<String>,
    },

    /// Show a stored test, or the test derived from a record
    Show {
        /// Stored test ID (ts-...) or record ID (tk-...)
        id: String,
    },

    /// Update a stored test
    Update {
        /// Stored test ID
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// Replace tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,

        /// Replace steps (repeatable)
        #[arg(short, long = "step")]
        steps: Option<Vec<String>>,
    },

    /// Delete a stored test
    Delete {
        /// Stored test ID
        id: String,
    },

    /// Add or remove a tag on many tests and records at once
    BulkTag {
        /// Tag name
        tag: String,

        /// Action to apply
        #[arg(long, default_value = "add", value_parser = ["add", "remove"])]
        action: String,

        /// Stored test or record IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// Record subcommands
#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    /// List records in store order
    List {
        /// Filter by status (pending, running, completed, error)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Create a pending record
    Create {
        /// Instructions for the agent
        instructions: String,

        /// Short display label
        #[arg(short, long)]
        label: Option<String>,

        /// External tag hint stored as metadata.source
        #[arg(long)]
        source: Option<String>,
    },

    /// Show a record
    Show {
        /// Record ID
        id: String,
    },

    /// Mark a record as running
    Start {
        /// Record ID
        id: String,
    },

    /// Mark a record as completed
    Complete {
        /// Record ID
        id: String,

        /// Result payload (JSON, or plain text)
        #[arg(short, long)]
        result: Option<String>,
    },

    /// Mark a record as failed
    Fail {
        /// Record ID
        id: String,

        /// Error payload (JSON, or plain text)
        error: String,
    },
}

/// System subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Seed records from the fixture file (runs at most once)
    Bootstrap {
        /// Fixture file (also TILT_FIXTURE)
        #[arg(long)]
        fixture: Option<PathBuf>,
    },

    /// Reset every record to pending and the run state to idle
    Reset,

    /// Export records as a test suite
    Export {
        /// Only records matching the airbnb/automation heuristics
        #[arg(long)]
        tagged_only: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show store status
    Status,

    /// Show the global app state
    AppState,
}

/// Settings subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Get a setting
    Get {
        /// Setting key
        key: String,
    },

    /// Set a setting
    Set {
        /// Setting key
        key: String,

        /// Value (JSON, or plain text)
        value: String,
    },

    /// List all settings
    List,
}
