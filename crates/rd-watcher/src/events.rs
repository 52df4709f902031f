//! Event types for file change notifications.
//!
//! # Event Flow
//!
//! ```text
//! File System Change
//!        │
//!        ▼
//!   notify::Event (raw, per OS backend)
//!        │
//!        ▼
//!   FileEvent (kind + UTF-8 paths + directory flag)
//!        │
//!        ▼
//!   Sent via bounded channel to the coordinator
//! ```

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::EventKind;
use smallvec::SmallVec;

/// The kind of change a [`FileEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    /// A file or directory was created.
    Created,
    /// A file or directory was written to, or its metadata changed.
    Modified,
    /// A file or directory was removed.
    Deleted,
    /// A file or directory was renamed or moved.
    Moved,
}

impl FileEventKind {
    /// Maps a raw notify event kind. Access events and backend-specific
    /// `Other` events do not describe a change and map to `None`.
    #[must_use]
    pub const fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Moved),
            EventKind::Modify(_) | EventKind::Any => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Deleted),
            EventKind::Access(_) | EventKind::Other => None,
        }
    }

    /// Returns the lowercase label used in log output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Moved => "moved",
        }
    }
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns what a raw notify kind says about the target being a directory,
/// if anything. Only create and remove events carry that information.
#[must_use]
pub(crate) const fn notify_kind_is_directory(kind: &EventKind) -> Option<bool> {
    match kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
            Some(true)
        }
        EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => Some(false),
        _ => None,
    }
}

/// A file change event with a UTF-8 path guarantee.
///
/// Most events carry a single path. Moves reported as one event carry the
/// source path followed by the destination path.
///
/// # Examples
///
/// ```
/// use rd_watcher::{FileEvent, FileEventKind};
/// use camino::Utf8PathBuf;
///
/// let event = FileEvent::new(FileEventKind::Modified, Utf8PathBuf::from("src/app.py"));
/// assert_eq!(event.path().as_str(), "src/app.py");
/// assert!(event.dest_path().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// What happened.
    pub kind: FileEventKind,

    /// Affected paths: the source path first, then the destination for moves.
    /// Never empty.
    pub paths: SmallVec<[Utf8PathBuf; 2]>,

    /// Whether the event concerns a directory.
    pub is_directory: bool,
}

impl FileEvent {
    /// Creates a new event for a single file path.
    #[inline]
    #[must_use]
    pub fn new(kind: FileEventKind, path: Utf8PathBuf) -> Self {
        let mut paths = SmallVec::new();
        paths.push(path);
        Self {
            kind,
            paths,
            is_directory: false,
        }
    }

    /// Creates a move event from `from` to `to`.
    #[must_use]
    pub fn moved(from: Utf8PathBuf, to: Utf8PathBuf) -> Self {
        let mut paths = SmallVec::new();
        paths.push(from);
        paths.push(to);
        Self {
            kind: FileEventKind::Moved,
            paths,
            is_directory: false,
        }
    }

    /// Marks this event as concerning a directory.
    #[inline]
    #[must_use]
    pub fn directory(mut self, is_directory: bool) -> Self {
        self.is_directory = is_directory;
        self
    }

    /// Returns the source path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.paths[0]
    }

    /// Returns the destination path for two-path move events.
    #[inline]
    #[must_use]
    pub fn dest_path(&self) -> Option<&Utf8Path> {
        self.paths.get(1).map(Utf8PathBuf::as_path)
    }

    /// Returns the file name of the source path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path().file_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, RenameMode};

    #[test]
    fn test_file_event_new() {
        let event = FileEvent::new(FileEventKind::Created, Utf8PathBuf::from("src/app.py"));
        assert_eq!(event.kind, FileEventKind::Created);
        assert_eq!(event.path().as_str(), "src/app.py");
        assert_eq!(event.file_name(), Some("app.py"));
        assert!(!event.is_directory);
    }

    #[test]
    fn test_file_event_moved() {
        let event = FileEvent::moved(Utf8PathBuf::from("a.tmp"), Utf8PathBuf::from("a.py"));
        assert_eq!(event.kind, FileEventKind::Moved);
        assert_eq!(event.path().as_str(), "a.tmp");
        assert_eq!(event.dest_path().map(Utf8Path::as_str), Some("a.py"));
    }

    #[test]
    fn test_directory_builder() {
        let event = FileEvent::new(FileEventKind::Deleted, Utf8PathBuf::from("build")).directory(true);
        assert!(event.is_directory);
    }

    #[test]
    fn test_kind_from_notify() {
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Create(CreateKind::File)),
            Some(FileEventKind::Created)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(FileEventKind::Modified)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(FileEventKind::Moved)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Remove(RemoveKind::Any)),
            Some(FileEventKind::Deleted)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Access(AccessKind::Any)),
            None
        );
    }

    #[test]
    fn test_notify_kind_is_directory() {
        assert_eq!(
            notify_kind_is_directory(&EventKind::Create(CreateKind::Folder)),
            Some(true)
        );
        assert_eq!(
            notify_kind_is_directory(&EventKind::Remove(RemoveKind::File)),
            Some(false)
        );
        assert_eq!(
            notify_kind_is_directory(&EventKind::Modify(ModifyKind::Any)),
            None
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(FileEventKind::Moved.to_string(), "moved");
    }
}
