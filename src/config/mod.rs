//! Configuration for Tilt.
//!
//! Settings live in `config.kdl`, read from two places:
//! - System: `~/.config/tilt/config.kdl` (or the path in `TILT_CONFIG`)
//! - Data dir: `<data_dir>/config.kdl`
//!
//! Keys:
//! - `fixture-path` - Bootstrap fixture file
//! - `request-timeout-ms` - Bound on waiting for the store
//! - `server-host` / `server-port` - HTTP bind address
//! - `log-level` - Default tracing filter
//! - `action-log` - Whether CLI commands are journaled
//!
//! ## Precedence
//!
//! CLI flag > env var > data-dir config > system config > defaults
//!
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedConfig, ValueSource, resolve_config, resolve_with_env,
};
pub use schema::TiltConfig;
