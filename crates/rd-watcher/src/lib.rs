//! Recursive directory watcher with glob filtering and async event streaming.
//!
//! This crate provides file change detection via the `notify` crate, filtered
//! by shell globs and bridged to an async tokio context for the restart
//! coordinator.
//!
//! # Overview
//!
//! - [`FileWatcher`] registers each distinct directory once and streams
//!   [`FileEvent`]s over a bounded channel
//! - [`FilterSpec`] decides which events qualify (`--only`, `--exclude`,
//!   `--exclude-dir`)
//! - No debouncing happens here: every qualifying event is forwarded, and the
//!   coordinator in `rd-runner` owns the quiet-period logic
//!
//! # Crate Dependencies
//!
//! ```text
//! rd-cli ──► rd-runner ──► rd-watcher ────► rd-core
//!                     └──► rd-supervisor ──►
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camino::Utf8PathBuf;
//! use rd_core::{FilterConfig, WatchConfig};
//! use rd_watcher::{FileWatcher, FilterSpec};
//!
//! # async fn example() -> Result<(), rd_watcher::WatchError> {
//! let filter = Arc::new(FilterSpec::from_config(&FilterConfig::default())?);
//! let paths = vec![Utf8PathBuf::from("./src")];
//! let mut watcher = FileWatcher::new(&paths, &WatchConfig::default(), filter).await?;
//!
//! while let Some(event) = watcher.recv().await {
//!     println!("{} {}", event.kind, event.path());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

pub use error::WatchError;
pub use events::{FileEvent, FileEventKind};
pub use filter::{AcceptAllFilter, FileFilter, FilterSpec};
pub use watcher::FileWatcher;
