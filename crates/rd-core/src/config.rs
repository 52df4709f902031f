//! Configuration structures for rundog.
//!
//! This module provides configuration types for all components of the application:
//!
//! - [`WatchConfig`] - Directories to watch and watcher channel sizing
//! - [`FilterConfig`] - Include/exclude globs and directory exclusion
//! - [`ProcessConfig`] - The supervised command and its output redirection
//! - [`DebounceConfig`] - The quiet period before a restart
//! - [`DriverConfig`] - Persist mode and the liveness poll interval
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] with the values the command
//! line falls back to.

use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use rd_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.recursive);
/// assert_eq!(config.channel_capacity, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directories to watch. Already resolved and de-duplicated.
    pub paths: Vec<Utf8PathBuf>,

    /// Whether to watch subdirectories recursively.
    pub recursive: bool,

    /// Capacity of the bounded event channel between the watcher thread and
    /// the coordinator.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            recursive: true,
            channel_capacity: 100,
        }
    }
}

/// Which filesystem events qualify for a restart.
///
/// Empty `only` means every path is included. Patterns are shell globs
/// matched against the full event path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Only paths matching one of these globs qualify.
    pub only: Vec<String>,

    /// Paths matching any of these globs never qualify.
    pub exclude: Vec<String>,

    /// Drop events on directories.
    pub exclude_dirs: bool,

    /// Match globs case-sensitively. Off by default.
    pub case_sensitive: bool,

    /// Exact paths that never qualify, such as the child's own output files.
    pub ignore_paths: Vec<Utf8PathBuf>,
}

/// The supervised command and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Executable followed by its arguments.
    pub command: Vec<String>,

    /// Redirect the child's stdout to this file (truncated on every start).
    pub stdout: Option<Utf8PathBuf>,

    /// Redirect the child's stderr to this file (truncated on every start).
    pub stderr: Option<Utf8PathBuf>,

    /// Grace period between SIGTERM and SIGKILL when stopping the child.
    /// `None` waits for the child indefinitely.
    pub kill_timeout_ms: Option<u64>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            stdout: None,
            stderr: None,
            kill_timeout_ms: Some(5_000),
        }
    }
}

impl ProcessConfig {
    /// Returns the kill grace period as a [`Duration`].
    #[must_use]
    pub fn kill_timeout(&self) -> Option<Duration> {
        self.kill_timeout_ms.map(Duration::from_millis)
    }
}

/// Configuration for the restart debouncer.
///
/// # Examples
///
/// ```
/// use rd_core::DebounceConfig;
///
/// assert_eq!(DebounceConfig::default().wait_ms, 500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Quiet period, in milliseconds, that must pass after the last
    /// qualifying event before the command is restarted.
    pub wait_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { wait_ms: 500 }
    }
}

impl DebounceConfig {
    /// Returns the quiet period as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Configuration for the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Keep watching after the child process exits.
    pub persist: bool,

    /// How often the driver polls the child for liveness, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            persist: false,
            poll_interval_ms: 1_000,
        }
    }
}

impl DriverConfig {
    /// Returns the poll interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Root configuration for rundog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File watcher configuration.
    pub watch: WatchConfig,

    /// Event filter configuration.
    pub filter: FilterConfig,

    /// Supervised process configuration.
    pub process: ProcessConfig,

    /// Debounce configuration.
    pub debounce: DebounceConfig,

    /// Driver loop configuration.
    pub driver: DriverConfig,
}

impl Config {
    /// Checks the invariants the rest of the workspace relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCommand`] if no executable is set, or
    /// [`ConfigError::InvalidOption`] for zero-sized intervals and capacities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.process.command.first() {
            Some(program) if !program.is_empty() => {}
            _ => return Err(ConfigError::MissingCommand),
        }

        if self.watch.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "channel_capacity",
                "must be at least 1",
            ));
        }

        if self.driver.poll_interval_ms == 0 {
            return Err(ConfigError::invalid_option(
                "poll_interval_ms",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Converts a user-supplied number of seconds into whole milliseconds.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOption`] naming `option` if `seconds` is
/// negative, NaN, or too large to represent.
///
/// # Examples
///
/// ```
/// use rd_core::config::seconds_to_millis;
///
/// assert_eq!(seconds_to_millis("wait", 0.5).ok(), Some(500));
/// assert!(seconds_to_millis("wait", -1.0).is_err());
/// ```
pub fn seconds_to_millis(option: &str, seconds: f64) -> Result<u64, ConfigError> {
    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
        ConfigError::invalid_option(option, "must be a finite, non-negative number")
    })?;
    u64::try_from(duration.as_millis())
        .map_err(|_| ConfigError::invalid_option(option, "is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_command(command: &[&str]) -> Config {
        let mut config = Config::default();
        config.process.command = command.iter().map(|s| (*s).to_owned()).collect();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.debounce.wait(), Duration::from_millis(500));
        assert_eq!(config.driver.poll_interval(), Duration::from_secs(1));
        assert!(!config.driver.persist);
        assert_eq!(config.process.kill_timeout(), Some(Duration::from_secs(5)));
        assert!(config.filter.only.is_empty());
        assert!(!config.filter.case_sensitive);
    }

    #[test]
    fn test_validate_requires_command() {
        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::MissingCommand)
        ));
        assert!(matches!(
            config_with_command(&[""]).validate(),
            Err(ConfigError::MissingCommand)
        ));
        assert!(config_with_command(&["python", "app.py"]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = config_with_command(&["true"]);
        config.driver.poll_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOption { option, .. }) if option == "poll_interval_ms"
        ));
    }

    #[test]
    fn test_seconds_to_millis() {
        assert_eq!(seconds_to_millis("wait", 0.0).ok(), Some(0));
        assert_eq!(seconds_to_millis("wait", 1.25).ok(), Some(1_250));
        assert!(seconds_to_millis("wait", f64::NAN).is_err());
        assert!(seconds_to_millis("wait", f64::INFINITY).is_err());
        assert!(seconds_to_millis("wait", -0.5).is_err());
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"process": {"command": ["make", "run"]}, "debounce": {"wait_ms": 250}}"#;
        let config: Config = serde_json::from_str(json).expect("valid config json");
        assert_eq!(config.process.command, vec!["make", "run"]);
        assert_eq!(config.debounce.wait_ms, 250);
        // Other fields should have defaults
        assert_eq!(config.process.kill_timeout_ms, Some(5_000));
        assert_eq!(config.watch.channel_capacity, 100);
    }
}
