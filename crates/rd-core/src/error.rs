//! Error types for the rd-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related errors
//! that can occur across the workspace. Every variant is fatal: rundog refuses
//! to start when its configuration is unusable.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration building and validation.
///
/// # Examples
///
/// ```
/// use rd_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::NotADirectory(Utf8PathBuf::from("/some/file"));
/// assert_eq!(error.to_string(), "/some/file is not a directory.");
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A watch path does not resolve to a directory.
    #[error("{0} is not a directory.")]
    NotADirectory(Utf8PathBuf),

    /// No command was given to supervise.
    #[error("missing command")]
    MissingCommand,

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while resolving a path.
    #[error("failed to resolve path {path}: {source}")]
    Io {
        /// The path being resolved.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[must_use]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::NotADirectory(path) | Self::Io { path, .. } => Some(path),
            Self::MissingCommand | Self::InvalidOption { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_directory_display() {
        let error = ConfigError::NotADirectory(Utf8PathBuf::from("/tmp/app.py"));
        insta::assert_snapshot!(error.to_string(), @"/tmp/app.py is not a directory.");
        assert_eq!(error.path().map(|p| p.as_str()), Some("/tmp/app.py"));
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("wait", "must be a finite, non-negative number");
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid configuration option 'wait': must be a finite, non-negative number"
        );
        assert!(error.path().is_none());
    }

    #[test]
    fn test_io_display_includes_path() {
        let error = ConfigError::Io {
            path: Utf8PathBuf::from("/missing"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let msg = error.to_string();
        assert!(msg.contains("/missing"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_missing_command_display() {
        assert_eq!(ConfigError::MissingCommand.to_string(), "missing command");
    }
}
