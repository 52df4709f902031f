//! Sliding-window restart coordination.
//!
//! Every qualifying event pushes the pending restart `wait` further into the
//! future, so a burst of saves produces a single restart `wait` after the last
//! event of the burst.
//!
//! ```text
//!  events:   x   x   x
//!  time:     0  .2  .4                 .9
//!  timers:   [--cancelled--)
//!                [--cancelled--)
//!                    [-------wait------] -> trigger_restart()
//! ```
//!
//! The "current timer" slot sits behind a synchronous lock. Replacing the
//! pending timer (cancel old, record new) is one critical section, and a
//! timer claims the slot under the same lock before restarting. Once a timer
//! has claimed the slot it can no longer be cancelled, and cancelling a timer
//! that already fired does nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rd_supervisor::{Supervisor, SupervisorError};
use rd_watcher::{FileEvent, FileFilter, FilterSpec};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Something the debouncer can restart.
pub trait RestartTarget: Send + Sync + 'static {
    /// Error produced when a restart fails.
    type Error: std::error::Error + Send + 'static;

    /// Stops whatever is running and starts it again.
    fn trigger_restart(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl RestartTarget for Supervisor {
    type Error = SupervisorError;

    fn trigger_restart(&self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.restart()
    }
}

#[derive(Debug)]
struct PendingRestart {
    generation: u64,
    deadline: Instant,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    pending: Option<PendingRestart>,
}

struct Shared<T: RestartTarget> {
    target: Arc<T>,
    filter: Arc<FilterSpec>,
    wait: Duration,
    failures: mpsc::Sender<T::Error>,
    slot: Mutex<Slot>,
    restarts: AtomicU64,
}

impl<T: RestartTarget> Shared<T> {
    /// Takes ownership of the slot for `generation`. Fails if a newer event
    /// replaced the timer or it was cancelled.
    fn claim(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        let current = slot
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation && !p.cancel.is_cancelled());
        if current {
            slot.pending = None;
        }
        current
    }
}

/// Turns a stream of file events into debounced restarts of a
/// [`RestartTarget`].
///
/// Timers run as tokio tasks, so [`Debouncer::on_event`] must be called from
/// within a runtime. Restart failures are sent to the `failures` channel
/// given at construction.
pub struct Debouncer<T: RestartTarget> {
    shared: Arc<Shared<T>>,
}

impl<T: RestartTarget> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("wait", &self.shared.wait)
            .field("pending_deadline", &self.pending_deadline())
            .field("restart_count", &self.restart_count())
            .finish_non_exhaustive()
    }
}

impl<T: RestartTarget> Debouncer<T> {
    /// Creates a debouncer with nothing pending.
    #[must_use]
    pub fn new(
        target: Arc<T>,
        filter: Arc<FilterSpec>,
        wait: Duration,
        failures: mpsc::Sender<T::Error>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                target,
                filter,
                wait,
                failures,
                slot: Mutex::new(Slot::default()),
                restarts: AtomicU64::new(0),
            }),
        }
    }

    /// Feeds one filesystem event to the coordinator.
    ///
    /// Events rejected by the filter are ignored. A qualifying event cancels
    /// the pending restart, if any, and schedules a new one `wait` from now.
    /// Returns whether the event qualified.
    pub fn on_event(&self, event: &FileEvent) -> bool {
        if !self.shared.filter.should_process(event) {
            tracing::trace!(path = %event.path(), kind = %event.kind, "Event filtered out");
            return false;
        }

        match event.dest_path() {
            Some(dest) => {
                tracing::debug!(path = %event.path(), dest = %dest, kind = %event.kind, "Change detected");
            }
            None => tracing::debug!(path = %event.path(), kind = %event.kind, "Change detected"),
        }

        let deadline = Instant::now() + self.shared.wait;
        let cancel = CancellationToken::new();

        let generation = {
            let mut slot = self.shared.slot.lock();
            if let Some(previous) = slot.pending.take() {
                previous.cancel.cancel();
            }
            slot.generation += 1;
            slot.pending = Some(PendingRestart {
                generation: slot.generation,
                deadline,
                cancel: cancel.clone(),
            });
            slot.generation
        };

        tokio::spawn(fire(Arc::clone(&self.shared), generation, deadline, cancel));
        true
    }

    /// Cancels the pending restart, if one has not fired yet.
    pub fn cancel_pending(&self) {
        if let Some(pending) = self.shared.slot.lock().pending.take() {
            pending.cancel.cancel();
            tracing::trace!(generation = pending.generation, "Pending restart cancelled");
        }
    }

    /// When the pending restart will fire, if one is scheduled.
    #[must_use]
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.shared.slot.lock().pending.as_ref().map(|p| p.deadline)
    }

    /// How many restarts this debouncer has triggered.
    #[must_use]
    pub fn restart_count(&self) -> u64 {
        self.shared.restarts.load(Ordering::Relaxed)
    }

    /// The quiet period.
    #[must_use]
    pub fn wait(&self) -> Duration {
        self.shared.wait
    }
}

async fn fire<T: RestartTarget>(
    shared: Arc<Shared<T>>,
    generation: u64,
    deadline: Instant,
    cancel: CancellationToken,
) {
    let elapsed = tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep_until(deadline) => true,
    };

    if !elapsed || !shared.claim(generation) {
        return;
    }

    shared.restarts.fetch_add(1, Ordering::Relaxed);
    tracing::info!("Restarting");

    if let Err(error) = shared.target.trigger_restart().await {
        tracing::debug!(%error, "Restart failed");
        if shared.failures.try_send(error).is_err() {
            tracing::trace!("Restart failure dropped, driver already stopping");
        }
    }
}
