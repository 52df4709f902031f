//! The supervised child process and how it is launched and stopped.

use std::fs::{File, OpenOptions};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use rd_core::ProcessConfig;
use tokio::process::{Child, Command};

use crate::error::SupervisorError;

/// Where one of the child's output streams goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// Share the supervisor's own stream.
    #[default]
    Inherit,
    /// Write to this file, truncating it on every start.
    File(Utf8PathBuf),
}

impl OutputTarget {
    /// `Some(path)` redirects to a file, `None` inherits.
    #[must_use]
    pub fn from_path(path: Option<Utf8PathBuf>) -> Self {
        path.map_or(Self::Inherit, Self::File)
    }

    /// Opens the target, returning the handle to keep and the [`Stdio`] to
    /// hand to the child.
    fn open(&self) -> Result<(Option<File>, Stdio), SupervisorError> {
        match self {
            Self::Inherit => Ok((None, Stdio::inherit())),
            Self::File(path) => {
                let file = open_truncated(path)
                    .map_err(|source| SupervisorError::output_file(path.clone(), source))?;
                let child_end = file
                    .try_clone()
                    .map_err(|source| SupervisorError::output_file(path.clone(), source))?;
                Ok((Some(file), Stdio::from(child_end)))
            }
        }
    }
}

/// Write-only, create-or-truncate, `0o644`.
fn open_truncated(path: &Utf8Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    options.open(path.as_std_path())
}

/// What to run and where its output goes. Fixed for the whole session.
///
/// # Examples
///
/// ```
/// use rd_supervisor::{OutputTarget, ProcessSpec};
///
/// let spec = ProcessSpec::new(["python", "-m", "http.server"])
///     .with_stdout(OutputTarget::File("server.log".into()));
/// assert_eq!(spec.display_command(), "python -m http.server");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Executable followed by its arguments.
    pub command: Vec<String>,
    /// Target for the child's stdout.
    pub stdout: OutputTarget,
    /// Target for the child's stderr.
    pub stderr: OutputTarget,
}

impl ProcessSpec {
    /// Creates a spec that inherits both output streams.
    #[must_use]
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            stdout: OutputTarget::Inherit,
            stderr: OutputTarget::Inherit,
        }
    }

    /// Builds a spec from the process section of the configuration.
    #[must_use]
    pub fn from_config(config: &ProcessConfig) -> Self {
        Self {
            command: config.command.clone(),
            stdout: OutputTarget::from_path(config.stdout.clone()),
            stderr: OutputTarget::from_path(config.stderr.clone()),
        }
    }

    /// Sets the stdout target.
    #[must_use]
    pub fn with_stdout(mut self, target: OutputTarget) -> Self {
        self.stdout = target;
        self
    }

    /// Sets the stderr target.
    #[must_use]
    pub fn with_stderr(mut self, target: OutputTarget) -> Self {
        self.stderr = target;
        self
    }

    /// The command line as echoed before each start.
    #[must_use]
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }
}

/// The currently running child.
///
/// Owns the OS process handle and the redirect files opened for it. Dropping
/// a `ManagedProcess` closes those files; `kill_on_drop` makes sure the child
/// never outlives its handle.
#[derive(Debug)]
pub struct ManagedProcess {
    child: Child,
    pid: Option<u32>,
    stdout: Option<File>,
    stderr: Option<File>,
    started_at: Instant,
    exit_status: Option<i32>,
}

impl ManagedProcess {
    /// Opens the redirect targets and spawns the command.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(spec: &ProcessSpec) -> Result<Self, SupervisorError> {
        let (program, args) = spec
            .command
            .split_first()
            .ok_or(SupervisorError::EmptyCommand)?;

        let (stdout, stdout_stdio) = spec.stdout.open()?;
        let (stderr, stderr_stdio) = spec.stderr.open()?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(stdout_stdio)
            .stderr(stderr_stdio)
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|source| SupervisorError::launch(program.as_str(), source))?;

        Ok(Self {
            pid: child.id(),
            child,
            stdout,
            stderr,
            started_at: Instant::now(),
            exit_status: None,
        })
    }

    /// OS process id, captured at spawn time.
    #[inline]
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When this instance was started.
    #[inline]
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Number of redirect files this instance holds open.
    #[must_use]
    pub fn open_outputs(&self) -> usize {
        usize::from(self.stdout.is_some()) + usize::from(self.stderr.is_some())
    }

    /// Non-blocking exit check. Remembers the status once seen.
    pub(crate) fn try_exit(&mut self) -> std::io::Result<Option<i32>> {
        if self.exit_status.is_none() {
            self.exit_status = self.child.try_wait()?.map(exit_code);
        }
        Ok(self.exit_status)
    }

    /// Stops the process and releases everything it owns.
    ///
    /// Sends SIGTERM and waits. With a `grace` period, a process still alive
    /// when it elapses is killed. Errors from a process that is already gone
    /// are swallowed.
    pub(crate) async fn stop(mut self, grace: Option<Duration>) -> Option<i32> {
        match self.try_exit() {
            Ok(Some(code)) => return Some(code),
            Ok(None) => {}
            Err(error) => {
                tracing::trace!(pid = ?self.pid, %error, "Process already gone");
                return None;
            }
        }

        self.signal_terminate();

        let status = match grace {
            Some(grace) => {
                if let Ok(result) = tokio::time::timeout(grace, self.child.wait()).await {
                    result
                } else {
                    tracing::warn!(
                        pid = ?self.pid,
                        grace_ms = grace.as_millis(),
                        "Process did not exit after SIGTERM, killing"
                    );
                    if let Err(error) = self.child.start_kill() {
                        tracing::trace!(pid = ?self.pid, %error, "Kill failed");
                    }
                    self.child.wait().await
                }
            }
            None => self.child.wait().await,
        };

        match status {
            Ok(status) => Some(exit_code(status)),
            Err(error) => {
                tracing::trace!(pid = ?self.pid, %error, "Failed to reap process");
                None
            }
        }
    }

    #[cfg(unix)]
    fn signal_terminate(&mut self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        // `id()` is `None` once the child has been reaped
        let Some(raw) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return;
        };

        if let Err(errno) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
            tracing::trace!(pid = raw, %errno, "SIGTERM failed");
        }
    }

    #[cfg(not(unix))]
    fn signal_terminate(&mut self) {
        if let Err(error) = self.child.start_kill() {
            tracing::trace!(pid = ?self.pid, %error, "Terminate failed");
        }
    }
}

/// Maps an exit status to an integer code. A process killed by a signal
/// reports the negated signal number.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_target_from_path() {
        assert_eq!(OutputTarget::from_path(None), OutputTarget::Inherit);
        assert_eq!(
            OutputTarget::from_path(Some(Utf8PathBuf::from("out.log"))),
            OutputTarget::File(Utf8PathBuf::from("out.log"))
        );
    }

    #[test]
    fn test_spec_from_config() {
        let config = ProcessConfig {
            command: vec!["make".to_owned(), "serve".to_owned()],
            stdout: Some(Utf8PathBuf::from("out.log")),
            ..ProcessConfig::default()
        };
        let spec = ProcessSpec::from_config(&config);
        assert_eq!(spec.display_command(), "make serve");
        assert_eq!(spec.stdout, OutputTarget::File(Utf8PathBuf::from("out.log")));
        assert_eq!(spec.stderr, OutputTarget::Inherit);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code() {
        let status = std::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .status()
            .expect("sh runs");
        assert_eq!(exit_code(status), 7);

        let killed = std::process::Command::new("sh")
            .args(["-c", "kill -TERM $$"])
            .status()
            .expect("sh runs");
        assert_eq!(exit_code(killed), -15);
    }

    #[test]
    fn test_open_truncated_replaces_contents() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("out.log")).expect("UTF-8");
        std::fs::write(&path, "previous run\n").expect("seed");

        drop(open_truncated(&path).expect("open"));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "");
    }
}
