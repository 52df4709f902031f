//! The [`Supervisor`]: start, poll, restart, and stop exactly one child.
//!
//! All state lives behind a single async mutex, so a restart triggered by the
//! debouncer can never interleave with another restart, a terminate, or a
//! poll from the driver loop. At most one [`ManagedProcess`] exists at a time:
//! the previous instance is stopped and dropped (closing its redirect files)
//! before the next one is spawned.

use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::SupervisorError;
use crate::process::{ManagedProcess, ProcessSpec};

/// Tunables for how the supervisor stops its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Grace period between SIGTERM and SIGKILL. `None` waits forever.
    pub kill_timeout: Option<Duration>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            kill_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl SupervisorOptions {
    /// Reads the stop grace period from the process section of the config.
    #[must_use]
    pub fn from_config(config: &rd_core::ProcessConfig) -> Self {
        Self {
            kill_timeout: config.kill_timeout(),
        }
    }
}

/// Snapshot taken by [`Supervisor::try_poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStatus {
    /// Exit code of the tracked child, once it has terminated.
    pub exit_code: Option<i32>,
    /// Launch number of the tracked child, starting at 1.
    pub launch: u64,
}

#[derive(Debug)]
struct State {
    spec: ProcessSpec,
    process: Option<ManagedProcess>,
    closed: bool,
    launches: u64,
}

impl State {
    fn exit_code(&mut self) -> Option<i32> {
        let process = self.process.as_mut()?;

        match process.try_exit() {
            Ok(status) => status,
            Err(error) => {
                tracing::debug!(%error, "Lost track of process");
                self.process = None;
                None
            }
        }
    }
}

/// Owner of the single supervised child process.
///
/// # Examples
///
/// ```no_run
/// use rd_supervisor::{ProcessSpec, Supervisor, SupervisorOptions};
///
/// # async fn example() -> Result<(), rd_supervisor::SupervisorError> {
/// let supervisor = Supervisor::start(
///     ProcessSpec::new(["python", "app.py"]),
///     SupervisorOptions::default(),
/// )?;
///
/// supervisor.restart().await?;
/// if let Some(code) = supervisor.poll().await {
///     println!("exited with {code}");
/// }
/// supervisor.terminate().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Supervisor {
    state: Mutex<State>,
    options: SupervisorOptions,
}

impl Supervisor {
    /// Launches `spec` and returns the supervisor tracking it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] if the command is empty, a redirect file
    /// cannot be opened, or the executable cannot be spawned.
    pub fn start(spec: ProcessSpec, options: SupervisorOptions) -> Result<Self, SupervisorError> {
        let process = launch(&spec)?;
        Ok(Self {
            state: Mutex::new(State {
                spec,
                process: Some(process),
                closed: false,
                launches: 1,
            }),
            options,
        })
    }

    /// Returns the exit code if the child has terminated.
    ///
    /// `None` while it is running or when no child is tracked. If the OS
    /// can no longer report on the child, it is forgotten and later polls
    /// return `None`.
    pub async fn poll(&self) -> Option<i32> {
        self.state.lock().await.exit_code()
    }

    /// Like [`Supervisor::poll`], but never waits.
    ///
    /// Returns `None` when a restart or stop currently holds the supervisor,
    /// for instance while a child is given its grace period after SIGTERM.
    pub fn try_poll(&self) -> Option<PollStatus> {
        let mut state = self.state.try_lock().ok()?;
        Some(PollStatus {
            exit_code: state.exit_code(),
            launch: state.launches,
        })
    }

    /// Stops the tracked child, if any, and waits for it to exit.
    ///
    /// A no-op when nothing is tracked. Afterwards no child is tracked and
    /// its redirect files are closed.
    pub async fn terminate(&self) {
        let mut state = self.state.lock().await;
        self.stop_current(&mut state).await;
    }

    /// Stops the current child and starts a fresh one with the same spec.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] if the new instance cannot be launched. No
    /// child is tracked in that case.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        let spec = state.spec.clone();
        self.relaunch(&mut state, spec).await
    }

    /// Stops the current child and starts `spec`, which becomes the spec for
    /// later restarts.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::restart`].
    pub async fn restart_with(&self, spec: ProcessSpec) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        self.relaunch(&mut state, spec).await
    }

    /// Terminates the child and refuses any later restart.
    ///
    /// A restart that was already waiting on the lock when shutdown began
    /// becomes a no-op instead of resurrecting the child.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        self.stop_current(&mut state).await;
    }

    /// Process id of the tracked child.
    pub async fn pid(&self) -> Option<u32> {
        self.state.lock().await.process.as_ref().and_then(ManagedProcess::pid)
    }

    /// Returns `true` if a child is tracked and has not exited.
    pub async fn is_running(&self) -> bool {
        let mut state = self.state.lock().await;
        state
            .process
            .as_mut()
            .is_some_and(|p| matches!(p.try_exit(), Ok(None)))
    }

    /// How many times a child has been launched, including the first start.
    pub async fn launch_count(&self) -> u64 {
        self.state.lock().await.launches
    }

    /// Number of redirect files currently held open.
    pub async fn open_outputs(&self) -> usize {
        self.state
            .lock()
            .await
            .process
            .as_ref()
            .map_or(0, ManagedProcess::open_outputs)
    }

    /// The [`ProcessSpec`] used for restarts.
    pub async fn spec(&self) -> ProcessSpec {
        self.state.lock().await.spec.clone()
    }

    async fn stop_current(&self, state: &mut State) {
        if let Some(process) = state.process.take() {
            let pid = process.pid();
            let uptime = process.started_at().elapsed();
            let code = process.stop(self.options.kill_timeout).await;
            tracing::debug!(
                pid = ?pid,
                exit_code = ?code,
                uptime_ms = uptime.as_millis(),
                "Process stopped"
            );
        }
    }

    async fn relaunch(&self, state: &mut State, spec: ProcessSpec) -> Result<(), SupervisorError> {
        if state.closed {
            tracing::debug!("Supervisor is shut down, ignoring restart");
            return Ok(());
        }

        self.stop_current(state).await;
        state.spec = spec;

        let process = launch(&state.spec)?;
        state.process = Some(process);
        state.launches += 1;
        Ok(())
    }
}

fn launch(spec: &ProcessSpec) -> Result<ManagedProcess, SupervisorError> {
    tracing::info!("$ {}", spec.display_command());
    let process = ManagedProcess::spawn(spec)?;
    tracing::debug!(pid = ?process.pid(), "Process started");
    Ok(process)
}
