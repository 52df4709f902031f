//! File watcher with async event streaming.
//!
//! This module provides the [`FileWatcher`] type that bridges the synchronous
//! `notify` file watching crate to the async tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Blocking Thread (spawn_blocking)             │
//! │  ┌───────────────────┐    ┌──────────────┐    ┌───────────┐  │
//! │  │ RecommendedWatcher│ -> │ convert_event│ -> │ FileFilter│  │
//! │  │ (notify, N paths) │    │ (UTF-8, kind)│    │           │  │
//! │  └───────────────────┘    └──────────────┘    └─────┬─────┘  │
//! └─────────────────────────────────────────────────────│────────┘
//!                                                       │
//!                                         blocking_send │
//!                                                       ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                     │
//! │  ┌──────────────────┐    ┌────────────────┐                  │
//! │  │ FileWatcher      │    │ mpsc::Receiver │ -> coordinator   │
//! │  │ (shutdown ctrl)  │    │ (bounded)      │                  │
//! │  └──────────────────┘    └────────────────┘                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use rd_core::WatchConfig;

use crate::error::WatchError;
use crate::events::{FileEvent, FileEventKind, notify_kind_is_directory};
use crate::filter::FileFilter;

/// Default channel capacity for file events.
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// A recursive watcher over one or more directories that streams events to
/// an async context.
///
/// # Lifecycle
///
/// 1. **Creation**: `FileWatcher::new()` validates and de-duplicates the
///    paths, creates channels, and spawns a blocking task with the notify
///    watcher. Each distinct directory is registered exactly once.
///
/// 2. **Event Reception**: Use `recv()`. Events are already
///    filtered according to the provided filter.
///
/// 3. **Shutdown**: `shutdown()` stops the watcher and waits for its thread.
///    Dropping the watcher sends the stop signal without waiting.
pub struct FileWatcher {
    /// Shutdown signal sender. `None` after shutdown is initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the blocking watcher task.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// Event receiver for async consumption.
    event_rx: mpsc::Receiver<FileEvent>,

    /// Canonical, de-duplicated directories being watched.
    watch_paths: Vec<Utf8PathBuf>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watch_paths", &self.watch_paths)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Creates a new watcher over `paths`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if a path doesn't exist, or
    /// [`WatchError::Io`] if it cannot be canonicalized. Failures registering
    /// the paths with the OS surface from [`FileWatcher::shutdown`].
    #[allow(clippy::unused_async)] // Async for API consistency with shutdown()
    pub async fn new<F: FileFilter>(
        paths: &[Utf8PathBuf],
        config: &WatchConfig,
        filter: F,
    ) -> Result<Self, WatchError> {
        Self::with_capacity(paths, config, filter, DEFAULT_CHANNEL_CAPACITY).await
    }

    /// Creates a watcher with a custom channel capacity.
    ///
    /// When the channel is full the watcher thread blocks until the consumer
    /// catches up.
    #[allow(clippy::unused_async)] // Async for API consistency with shutdown()
    pub async fn with_capacity<F: FileFilter>(
        paths: &[Utf8PathBuf],
        config: &WatchConfig,
        filter: F,
        channel_capacity: usize,
    ) -> Result<Self, WatchError> {
        let watch_paths = canonical_unique(paths)?;

        let (event_tx, event_rx) = mpsc::channel(channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task_paths = watch_paths.clone();
        let recursive = config.recursive;

        let task_handle = tokio::task::spawn_blocking(move || {
            run_watcher_loop(task_paths, recursive, event_tx, shutdown_rx, filter)
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
            event_rx,
            watch_paths,
        })
    }

    /// Receives the next file event.
    ///
    /// Returns `None` once the watcher thread has stopped.
    pub async fn recv(&mut self) -> Option<FileEvent> {
        self.event_rx.recv().await
    }

    /// Returns the registered directories.
    #[must_use]
    pub fn watch_paths(&self) -> &[Utf8PathBuf] {
        &self.watch_paths
    }

    /// Returns `true` if the watcher is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops accepting events and waits for the watcher thread to finish.
    ///
    /// # Errors
    ///
    /// Returns the error the watcher thread stopped with, or
    /// [`WatchError::ChannelClosed`] if it panicked.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Receiver is gone if the thread already exited
            let _ = tx.send(());
        }

        // Unblock a watcher thread stuck in blocking_send
        self.event_rx.close();

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_join_error) => return Err(WatchError::ChannelClosed),
            }
        }

        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Canonicalizes `paths` and drops duplicates, keeping first-seen order.
fn canonical_unique(paths: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>, WatchError> {
    let mut seen = FxHashSet::default();
    let mut unique = Vec::with_capacity(paths.len());

    for path in paths {
        if !path.exists() {
            return Err(WatchError::path_not_found(path.clone()));
        }
        let canonical = path.canonicalize_utf8()?;
        if seen.insert(canonical.clone()) {
            unique.push(canonical);
        }
    }

    Ok(unique)
}

/// Converts a raw notify event into a [`FileEvent`].
///
/// Returns `None` for events that do not describe a change, and for events
/// whose paths are all non-UTF-8.
pub(crate) fn convert_event(event: notify::Event) -> Option<FileEvent> {
    let kind = FileEventKind::from_notify(&event.kind)?;
    let declared_dir = notify_kind_is_directory(&event.kind);

    let paths: SmallVec<[Utf8PathBuf; 2]> = event
        .paths
        .into_iter()
        .filter_map(|path| match Utf8PathBuf::from_path_buf(path) {
            Ok(p) => Some(p),
            Err(invalid_path) => {
                tracing::warn!(
                    path = %invalid_path.display(),
                    "Skipping non-UTF-8 path in file event"
                );
                None
            }
        })
        .collect();

    let last = paths.last()?;
    // Deleted paths can no longer be inspected; they count as files.
    let is_directory = declared_dir.unwrap_or_else(|| last.is_dir());

    Some(FileEvent {
        kind,
        paths,
        is_directory,
    })
}

/// Runs the notify watcher in a blocking context until shutdown.
#[allow(clippy::needless_pass_by_value)] // Owned for the blocking task lifetime
fn run_watcher_loop<F: FileFilter>(
    paths: Vec<Utf8PathBuf>,
    recursive: bool,
    event_tx: mpsc::Sender<FileEvent>,
    shutdown_rx: oneshot::Receiver<()>,
    filter: F,
) -> Result<(), WatchError> {
    let tx = event_tx;
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let Some(file_event) = convert_event(event) else {
                    return;
                };

                if !filter.should_process(&file_event) {
                    tracing::trace!(path = %file_event.path(), "Filtered out file event");
                    return;
                }

                if tx.blocking_send(file_event).is_err() {
                    tracing::debug!("Event channel closed, dropping event");
                }
            }
            Err(error) => tracing::warn!(error = %error, "Watcher error"),
        }
    })?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    for path in &paths {
        register(&mut watcher, path, mode)?;
    }

    // Block until the shutdown signal arrives or the FileWatcher is dropped
    let _ = shutdown_rx.blocking_recv();

    drop(watcher);
    tracing::info!(paths = paths.len(), "File watcher stopped");

    Ok(())
}

fn register(
    watcher: &mut RecommendedWatcher,
    path: &Utf8Path,
    mode: RecursiveMode,
) -> Result<(), WatchError> {
    watcher.watch(path.as_std_path(), mode)?;
    tracing::info!(path = %path, recursive = matches!(mode, RecursiveMode::Recursive), "Watching");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AcceptAllFilter;
    use notify::event::{CreateKind, ModifyKind, RenameMode};
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_temp_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid path");
        (dir, path)
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let (_dir, path) = create_temp_dir();
        let watcher = FileWatcher::new(&[path], &WatchConfig::default(), AcceptAllFilter)
            .await
            .expect("Watcher should be created");
        assert!(watcher.is_running());
        watcher.shutdown().await.expect("Shutdown failed");
    }

    #[tokio::test]
    async fn test_watcher_path_not_found() {
        let path = Utf8PathBuf::from("/nonexistent/path/that/does/not/exist");
        let result = FileWatcher::new(&[path], &WatchConfig::default(), AcceptAllFilter).await;

        match result {
            Err(WatchError::PathNotFound(_)) => {}
            other => panic!("Expected PathNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_paths_register_once() {
        let (_dir, path) = create_temp_dir();
        fs::create_dir(path.join("src")).expect("mkdir");

        let paths = vec![path.join("src"), path.join("src/../src"), path.join("src")];
        let watcher = FileWatcher::new(&paths, &WatchConfig::default(), AcceptAllFilter)
            .await
            .expect("Failed to create watcher");

        assert_eq!(watcher.watch_paths().len(), 1);
        watcher.shutdown().await.expect("Shutdown failed");
    }

    #[tokio::test]
    async fn test_watcher_receives_events() {
        let (dir, path) = create_temp_dir();
        let mut watcher = FileWatcher::with_capacity(&[path], &WatchConfig::default(), AcceptAllFilter, 16)
            .await
            .expect("Failed to create watcher");

        // Backends may register asynchronously; keep writing until one lands
        let target = dir.path().join("test.txt");
        let event = tokio::time::timeout(Duration::from_secs(5), async {
            let mut round = 0_u32;
            loop {
                fs::write(&target, format!("hello {round}")).expect("Failed to write file");
                round += 1;
                if let Ok(event) = tokio::time::timeout(Duration::from_millis(250), watcher.recv()).await {
                    break event;
                }
            }
        })
        .await
        .expect("an event arrives within five seconds")
        .expect("channel still open");

        assert!(event.path().as_str().ends_with("test.txt"), "unexpected path {}", event.path());
        watcher.shutdown().await.expect("Shutdown failed");
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_event_skips_non_utf8_paths() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let garbled = PathBuf::from(OsStr::from_bytes(b"/srv/app/\xff.py"));

        let mixed = notify::Event::new(notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(garbled.clone())
            .add_path(PathBuf::from("/srv/app/main.py"));
        let converted = convert_event(mixed).expect("valid path survives");
        assert_eq!(converted.paths.len(), 1);
        assert_eq!(converted.path().as_str(), "/srv/app/main.py");

        let only_garbled = notify::Event::new(notify::EventKind::Create(CreateKind::File)).add_path(garbled);
        assert!(convert_event(only_garbled).is_none());
    }

    #[test]
    fn test_convert_event_create_folder() {
        let event = notify::Event::new(notify::EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/srv/app/build"));
        let converted = convert_event(event).expect("create converts");
        assert_eq!(converted.kind, FileEventKind::Created);
        assert!(converted.is_directory);
    }

    #[test]
    fn test_convert_event_rename_both() {
        let event = notify::Event::new(notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/srv/app/a.tmp"))
            .add_path(PathBuf::from("/srv/app/a.py"));
        let converted = convert_event(event).expect("rename converts");
        assert_eq!(converted.kind, FileEventKind::Moved);
        assert_eq!(converted.dest_path().map(Utf8Path::as_str), Some("/srv/app/a.py"));
        assert!(!converted.is_directory);
    }

    #[test]
    fn test_convert_event_ignores_access() {
        let event = notify::Event::new(notify::EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/srv/app/a.py"));
        assert!(convert_event(event).is_none());
    }

    #[test]
    fn test_convert_event_without_paths() {
        let event = notify::Event::new(notify::EventKind::Any);
        assert!(convert_event(event).is_none());
    }
}
