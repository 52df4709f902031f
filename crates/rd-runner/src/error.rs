//! Error types for the rd-runner crate.

use rd_core::ConfigError;
use rd_supervisor::SupervisorError;
use rd_watcher::WatchError;

/// Everything that can end a rundog session abnormally.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RunError {
    /// The configuration was rejected before anything started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The watcher could not be set up or stopped unexpectedly.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// The supervised command could not be (re)started.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}
