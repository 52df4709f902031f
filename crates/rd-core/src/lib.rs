//! Core types, errors, and utilities for rundog.
//!
//! This crate provides the foundational pieces shared across the workspace:
//!
//! - [`Config`] and its sections ([`WatchConfig`], [`FilterConfig`],
//!   [`ProcessConfig`], [`DebounceConfig`], [`DriverConfig`])
//! - [`ConfigError`] for configuration-time failures
//! - [`resolve_watch_paths`] for turning `--path` arguments into a validated,
//!   de-duplicated set of directories, and [`redirect_targets`] for the
//!   output files that must never trigger a restart
//! - [`VERSION`], injected at build time

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod paths;

pub use config::{Config, DebounceConfig, DriverConfig, FilterConfig, ProcessConfig, WatchConfig};
pub use error::ConfigError;
pub use paths::{redirect_targets, resolve_watch_paths};

/// Version of the rundog workspace, taken from `Cargo.toml` at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
