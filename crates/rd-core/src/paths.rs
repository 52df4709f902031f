//! Watch path resolution.
//!
//! Turns the raw `--path` arguments into the set of directories the watcher
//! registers. When no path is given, the directory containing the command is
//! watched instead, so `rundog ./server/run.sh` watches `./server`.
//!
//! Also locates the child's redirect files, which never trigger a restart.

use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashSet;

use crate::config::ProcessConfig;
use crate::error::ConfigError;

/// Resolves the directories to watch.
///
/// 1. With no `paths`, falls back to the parent directory of `command`.
/// 2. Expands a leading `~` to the home directory.
/// 3. Replaces an empty path with `.`.
/// 4. Requires every path to be a directory.
/// 5. Canonicalizes and drops duplicates, keeping first-seen order.
///
/// # Errors
///
/// Returns [`ConfigError::NotADirectory`] for the first path that is not a
/// directory, or [`ConfigError::Io`] if canonicalization fails.
pub fn resolve_watch_paths(
    paths: &[String],
    command: &str,
) -> Result<Vec<Utf8PathBuf>, ConfigError> {
    let raw: Vec<Utf8PathBuf> = if paths.is_empty() {
        let parent = Utf8Path::new(command)
            .parent()
            .map(Utf8Path::as_str)
            .unwrap_or_default();
        vec![normalize(parent)]
    } else {
        paths.iter().map(|p| normalize(p)).collect()
    };

    let mut seen = FxHashSet::default();
    let mut resolved = Vec::with_capacity(raw.len());

    for path in raw {
        if !path.is_dir() {
            return Err(ConfigError::NotADirectory(path));
        }

        let canonical = path
            .canonicalize_utf8()
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;

        if seen.insert(canonical.clone()) {
            resolved.push(canonical);
        }
    }

    Ok(resolved)
}

/// Applies `~` expansion and the empty-path default to a single path.
fn normalize(path: &str) -> Utf8PathBuf {
    let expanded = expand_home(path);
    if expanded.as_str().is_empty() {
        Utf8PathBuf::from(".")
    } else {
        expanded
    }
}

/// Expands `~` and `~/...`. Other forms (`~user`) are left untouched.
fn expand_home(path: &str) -> Utf8PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return Utf8PathBuf::from(path),
    };

    let Some(home) = dirs::home_dir().and_then(|h| Utf8PathBuf::from_path_buf(h).ok()) else {
        return Utf8PathBuf::from(path);
    };

    let rest = rest.trim_start_matches('/');
    if rest.is_empty() { home } else { home.join(rest) }
}

/// Absolute locations of the stdout/stderr redirect files, in the form the
/// watcher reports them (parent directory canonicalized).
///
/// A target whose parent directory cannot be resolved is left out; opening
/// it fails at launch anyway.
#[must_use]
pub fn redirect_targets(process: &ProcessConfig) -> Vec<Utf8PathBuf> {
    let mut targets: Vec<Utf8PathBuf> = [process.stdout.as_deref(), process.stderr.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(resolve_file)
        .collect();
    targets.dedup();
    targets
}

fn resolve_file(path: &Utf8Path) -> Option<Utf8PathBuf> {
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let parent = parent.canonicalize_utf8().ok()?;
    Some(parent.join(name))
}
