//! Error types for the rd-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while building filters or watching directories.

use camino::Utf8PathBuf;

/// Errors that can occur during file watching operations.
///
/// Every variant is fatal. Events whose paths are not valid UTF-8 are
/// skipped with a warning instead of surfacing as errors.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The specified path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// A glob pattern could not be compiled.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern as given on the command line.
        pattern: String,
        /// The underlying glob error.
        #[source]
        source: globset::Error,
    },

    /// The event channel was closed unexpectedly.
    ///
    /// This indicates the watcher thread died or panicked.
    #[error("event channel closed unexpectedly")]
    ChannelClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::InvalidPattern`] error.
    #[inline]
    pub fn invalid_pattern(pattern: impl Into<String>, source: globset::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) => Some(path),
            Self::Notify(_)
            | Self::InvalidPattern { .. }
            | Self::ChannelClosed
            | Self::Io(_) => None,
        }
    }
}
