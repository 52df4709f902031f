//! Error types for the rd-supervisor crate.
//!
//! Every [`SupervisorError`] is a launch-time failure and is fatal: the child
//! cannot be (re)started, so rundog stops. Errors while signalling or reaping
//! a process that is already gone are expected races and never surface here.

use camino::Utf8PathBuf;

/// Errors that can occur while launching the supervised process.
///
/// # Examples
///
/// ```
/// use rd_supervisor::SupervisorError;
///
/// let err = SupervisorError::launch(
///     "serve",
///     std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
/// );
/// assert_eq!(err.to_string(), "failed to start process serve: No such file or directory");
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SupervisorError {
    /// The command vector is empty.
    #[error("no command to run")]
    EmptyCommand,

    /// The executable could not be found or spawned.
    #[error("failed to start process {program}: {source}")]
    Launch {
        /// The executable that failed to start.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// A stdout/stderr redirect file could not be opened.
    #[error("failed to open output file {path}: {source}")]
    OutputFile {
        /// The redirect target.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl SupervisorError {
    /// Creates a new [`SupervisorError::Launch`] error.
    #[must_use]
    pub fn launch(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            program: program.into(),
            source,
        }
    }

    /// Creates a new [`SupervisorError::OutputFile`] error.
    #[must_use]
    pub fn output_file(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::OutputFile {
            path: path.into(),
            source,
        }
    }
}
