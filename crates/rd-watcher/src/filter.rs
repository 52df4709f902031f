//! File filtering for watch events.
//!
//! The [`FileFilter`] trait decides whether an event is a *qualifying* event,
//! i.e. one that may trigger a restart. [`FilterSpec`] is the implementation
//! built from the `--only`, `--exclude`, and `--exclude-dir` options.
//!
//! Patterns are shell globs matched against the full event path. As with
//! `fnmatch`, `*` also matches `/`, so `*.py` matches `/srv/app/main.py`.
//!
//! # Examples
//!
//! ```
//! use rd_core::FilterConfig;
//! use rd_watcher::FilterSpec;
//! use camino::Utf8Path;
//!
//! let config = FilterConfig {
//!     only: vec!["*.py".to_owned()],
//!     exclude: vec!["*/migrations/*".to_owned()],
//!     ..FilterConfig::default()
//! };
//! let filter = FilterSpec::from_config(&config)?;
//!
//! assert!(filter.matches_path(Utf8Path::new("/srv/app/views.py")));
//! assert!(!filter.matches_path(Utf8Path::new("/srv/app/README.md")));
//! assert!(!filter.matches_path(Utf8Path::new("/srv/app/migrations/0001.py")));
//! # Ok::<(), rd_watcher::WatchError>(())
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use rd_core::FilterConfig;
use rustc_hash::FxHashSet;

use crate::error::WatchError;
use crate::events::FileEvent;

/// A filter for determining which file events qualify.
///
/// Filters must be [`Send`] and [`Sync`] because they are consulted from the
/// blocking watcher thread as well as the coordinator task.
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if the event should be processed.
    fn should_process(&self, event: &FileEvent) -> bool;
}

/// A filter that accepts all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _event: &FileEvent) -> bool {
        true
    }
}

/// Immutable include/exclude configuration compiled to glob sets.
///
/// An empty include set means "match everything"; an empty exclude set
/// excludes nothing. Neither is an error.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    /// Compiled `--only` globs. `None` when no include pattern was given.
    only: Option<GlobSet>,

    /// Compiled `--exclude` globs. `None` when no exclude pattern was given.
    exclude: Option<GlobSet>,

    /// Drop events on directories.
    exclude_dirs: bool,

    /// Exact paths that never qualify.
    ignored: FxHashSet<Utf8PathBuf>,
}

impl FilterSpec {
    /// Compiles a [`FilterSpec`] from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPattern`] if a glob does not compile.
    pub fn from_config(config: &FilterConfig) -> Result<Self, WatchError> {
        Ok(Self {
            only: compile(&config.only, config.case_sensitive)?,
            exclude: compile(&config.exclude, config.case_sensitive)?,
            exclude_dirs: config.exclude_dirs,
            ignored: config.ignore_paths.iter().cloned().collect(),
        })
    }

    /// Returns `true` if `path` is included and not excluded.
    #[must_use]
    pub fn matches_path(&self, path: &Utf8Path) -> bool {
        if self.ignored.contains(path) {
            return false;
        }

        if self
            .exclude
            .as_ref()
            .is_some_and(|set| set.is_match(path.as_std_path()))
        {
            return false;
        }

        self.only
            .as_ref()
            .is_none_or(|set| set.is_match(path.as_std_path()))
    }
}

impl FileFilter for FilterSpec {
    fn should_process(&self, event: &FileEvent) -> bool {
        if self.exclude_dirs && event.is_directory {
            return false;
        }

        // A move qualifies if either end of it does.
        event.paths.iter().any(|path| self.matches_path(path))
    }
}

/// Compiles `patterns` into one set. An empty list compiles to `None`.
fn compile(patterns: &[String], case_sensitive: bool) -> Result<Option<GlobSet>, WatchError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .literal_separator(false)
            .build()
            .map_err(|e| WatchError::invalid_pattern(pattern.as_str(), e))?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| WatchError::invalid_pattern(patterns.join(", "), e))
}

impl<F: FileFilter + ?Sized> FileFilter for Box<F> {
    fn should_process(&self, event: &FileEvent) -> bool {
        (**self).should_process(event)
    }
}

// Shared filters: the watcher and the coordinator hold the same spec.
impl<F: FileFilter + ?Sized> FileFilter for std::sync::Arc<F> {
    fn should_process(&self, event: &FileEvent) -> bool {
        (**self).should_process(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FileEventKind;

    fn spec(only: &[&str], exclude: &[&str], exclude_dirs: bool) -> FilterSpec {
        let config = FilterConfig {
            only: only.iter().map(|s| (*s).to_owned()).collect(),
            exclude: exclude.iter().map(|s| (*s).to_owned()).collect(),
            exclude_dirs,
            case_sensitive: false,
            ignore_paths: Vec::new(),
        };
        FilterSpec::from_config(&config).expect("valid patterns")
    }

    fn modified(path: &str) -> FileEvent {
        FileEvent::new(FileEventKind::Modified, Utf8PathBuf::from(path))
    }

    #[test]
    fn test_accept_all_filter() {
        assert!(AcceptAllFilter.should_process(&modified("anything.txt")));
    }

    #[test]
    fn test_empty_spec_matches_everything() {
        let filter = FilterSpec::default();
        assert!(filter.should_process(&modified("/srv/app/main.py")));
        assert!(filter.should_process(&modified("/srv/app/build").directory(true)));
    }

    #[test]
    fn test_only_patterns() {
        let filter = spec(&["*.py"], &[], false);
        assert!(filter.should_process(&modified("/srv/app/main.py")));
        assert!(!filter.should_process(&modified("/srv/app/foo.txt")));
    }

    #[test]
    fn test_only_patterns_are_case_insensitive_by_default() {
        let filter = spec(&["*.py"], &[], false);
        assert!(filter.should_process(&modified("/srv/app/MAIN.PY")));

        let config = FilterConfig {
            only: vec!["*.py".to_owned()],
            case_sensitive: true,
            ..FilterConfig::default()
        };
        let strict = FilterSpec::from_config(&config).expect("valid patterns");
        assert!(!strict.should_process(&modified("/srv/app/MAIN.PY")));
    }

    #[test]
    fn test_exclude_wins_over_only() {
        let filter = spec(&["*.py"], &["*_test.py"], false);
        assert!(filter.should_process(&modified("/srv/app/main.py")));
        assert!(!filter.should_process(&modified("/srv/app/main_test.py")));
    }

    #[test]
    fn test_exclude_matches_across_directories() {
        let filter = spec(&[], &["*/.git/*"], false);
        assert!(!filter.should_process(&modified("/srv/app/.git/index")));
        assert!(filter.should_process(&modified("/srv/app/src/lib.rs")));
    }

    #[test]
    fn test_exclude_dirs() {
        let filter = spec(&[], &[], true);
        assert!(!filter.should_process(&modified("/srv/app/build").directory(true)));
        assert!(filter.should_process(&modified("/srv/app/build.sh")));
    }

    #[test]
    fn test_move_qualifies_on_either_path() {
        let filter = spec(&["*.py"], &[], false);
        let event = FileEvent::moved(
            Utf8PathBuf::from("/srv/app/.main.py.swp"),
            Utf8PathBuf::from("/srv/app/main.py"),
        );
        assert!(filter.should_process(&event));

        let unrelated = FileEvent::moved(
            Utf8PathBuf::from("/srv/app/a.log"),
            Utf8PathBuf::from("/srv/app/b.log"),
        );
        assert!(!filter.should_process(&unrelated));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = FilterConfig {
            exclude: vec!["[unclosed".to_owned()],
            ..FilterConfig::default()
        };
        let err = FilterSpec::from_config(&config).expect_err("bad glob");
        assert!(matches!(err, WatchError::InvalidPattern { pattern, .. } if pattern == "[unclosed"));
    }

    #[test]
    fn test_ignored_paths_never_qualify() {
        let config = FilterConfig {
            ignore_paths: vec![Utf8PathBuf::from("/srv/app/out.log")],
            ..FilterConfig::default()
        };
        let filter = FilterSpec::from_config(&config).expect("valid patterns");

        assert!(!filter.should_process(&modified("/srv/app/out.log")));
        assert!(filter.should_process(&modified("/srv/app/logs/out.log")));
        assert!(filter.should_process(&modified("/srv/app/main.py")));

        // Renaming the file away still counts through the destination
        let rotated = FileEvent::moved(
            Utf8PathBuf::from("/srv/app/out.log"),
            Utf8PathBuf::from("/srv/app/out.log.1"),
        );
        assert!(filter.should_process(&rotated));
    }

    #[test]
    fn test_arc_filter() {
        let filter = std::sync::Arc::new(spec(&["*.rs"], &[], false));
        assert!(filter.should_process(&modified("src/lib.rs")));
        assert!(!filter.should_process(&modified("src/lib.py")));
    }
}
