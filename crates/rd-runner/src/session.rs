//! The driver loop tying the watcher, the debouncer and the supervisor
//! together.
//!
//! # Lifecycle
//!
//! ```text
//! Session::start ──► Running ──┬── child exited (persist off) ──┐
//!                       ▲      ├── interrupt ───────────────────┤
//!                       │      └── restart failed ──────────────┤
//!                  events/ticks                                 ▼
//!                                                          ShuttingDown
//!                                   cancel timer ─► stop child ─► stop watcher
//! ```

use std::sync::Arc;
use std::time::Duration;

use rd_core::Config;
use rd_supervisor::{ProcessSpec, Supervisor, SupervisorError, SupervisorOptions};
use rd_watcher::{FileWatcher, FilterSpec, WatchError};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::debounce::Debouncer;
use crate::error::RunError;

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The child exited on its own and persist mode was off.
    ChildExited(i32),
    /// The session was interrupted (Ctrl-C or SIGTERM).
    Interrupted,
}

/// State of the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Watching and supervising.
    Running,
    /// Tearing down.
    ShuttingDown(ShutdownReason),
}

/// Transition taken on each poll tick.
///
/// A terminated child ends the session unless `persist` is set, in which
/// case rundog keeps waiting for the next change.
#[must_use]
pub const fn next_state(exit_status: Option<i32>, persist: bool) -> DriverState {
    match exit_status {
        Some(code) if !persist => DriverState::ShuttingDown(ShutdownReason::ChildExited(code)),
        _ => DriverState::Running,
    }
}

/// A running rundog session.
pub struct Session {
    supervisor: Arc<Supervisor>,
    watcher: FileWatcher,
    debouncer: Debouncer<Supervisor>,
    failures: mpsc::Receiver<SupervisorError>,
    persist: bool,
    poll_interval: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("watcher", &self.watcher)
            .field("debouncer", &self.debouncer)
            .field("persist", &self.persist)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Compiles the filter, launches the command and starts watching.
    ///
    /// `config.watch.paths` must already be resolved (see
    /// [`rd_core::resolve_watch_paths`]).
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] if the configuration is invalid, a glob does not
    /// compile, the command cannot be launched, or a watch path is missing.
    pub async fn start(config: &Config) -> Result<Self, RunError> {
        config.validate()?;

        let mut filter_config = config.filter.clone();
        let redirects = rd_core::redirect_targets(&config.process);
        if !redirects.is_empty() {
            tracing::debug!(paths = ?redirects, "Ignoring changes to output files");
        }
        filter_config.ignore_paths.extend(redirects);
        let filter = Arc::new(FilterSpec::from_config(&filter_config)?);

        let supervisor = Arc::new(Supervisor::start(
            ProcessSpec::from_config(&config.process),
            SupervisorOptions::from_config(&config.process),
        )?);

        let watcher = match FileWatcher::with_capacity(
            &config.watch.paths,
            &config.watch,
            Arc::clone(&filter),
            config.watch.channel_capacity,
        )
        .await
        {
            Ok(watcher) => watcher,
            Err(error) => {
                supervisor.shutdown().await;
                return Err(error.into());
            }
        };

        let (failures_tx, failures) = mpsc::channel(1);
        let debouncer = Debouncer::new(
            Arc::clone(&supervisor),
            filter,
            config.debounce.wait(),
            failures_tx,
        );

        Ok(Self {
            supervisor,
            watcher,
            debouncer,
            failures,
            persist: config.driver.persist,
            poll_interval: config.driver.poll_interval(),
        })
    }

    /// The supervisor driven by this session.
    #[must_use]
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Runs until the child exits (persist off), `shutdown` is cancelled, or
    /// a restart fails. Always tears everything down before returning.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Supervisor`] if a restart could not launch the
    /// command, or [`RunError::Watch`] if the watcher stopped on its own.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<ShutdownReason, RunError> {
        tracing::info!(
            paths = ?self.watcher.watch_paths(),
            wait_ms = self.debouncer.wait().as_millis(),
            persist = self.persist,
            "Watching for changes"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reported_launch = None;

        let outcome = loop {
            tokio::select! {
                () = shutdown.cancelled() => break Ok(ShutdownReason::Interrupted),

                Some(error) = self.failures.recv() => break Err(RunError::from(error)),

                event = self.watcher.recv() => match event {
                    Some(event) => {
                        self.debouncer.on_event(&event);
                    }
                    None => break Err(RunError::Watch(WatchError::ChannelClosed)),
                },

                _ = ticker.tick() => {
                    // Busy with a restart; look again on the next tick.
                    let Some(status) = self.supervisor.try_poll() else {
                        continue;
                    };
                    match next_state(status.exit_code, self.persist) {
                        DriverState::ShuttingDown(reason) => break Ok(reason),
                        DriverState::Running => {
                            if let Some(code) = status.exit_code {
                                if reported_launch != Some(status.launch) {
                                    tracing::info!(exit_code = code, "Process exited, waiting for changes");
                                    reported_launch = Some(status.launch);
                                }
                            }
                        }
                    }
                }
            }
        };

        match &outcome {
            Ok(ShutdownReason::ChildExited(code)) => {
                tracing::info!(exit_code = *code, "Process exited, shutting down");
            }
            Ok(ShutdownReason::Interrupted) => tracing::info!("Shutting down"),
            Err(error) => tracing::debug!(%error, "Session failed"),
        }

        self.debouncer.cancel_pending();
        self.supervisor.shutdown().await;
        let stopped = self.watcher.shutdown().await;
        tracing::debug!("Watcher stopped");

        match (outcome, stopped) {
            // The channel closed because the watcher thread failed; report why
            (Err(RunError::Watch(WatchError::ChannelClosed)), Err(error)) => Err(error.into()),
            (outcome, Err(error)) => {
                tracing::warn!(%error, "Watcher stopped with an error");
                outcome
            }
            (outcome, Ok(())) => outcome,
        }
    }
}
