//! Shopdesk: edit shop documents on remote hosts with versioned backups.
//!
//! The binaries share configuration loading and the HTTP router defined here;
//! the document model and persistence live in `shopdesk-core`.

pub mod config;
pub mod server;

pub use config::{Config, ConfigError, ConfigSource, ConfigValue};
