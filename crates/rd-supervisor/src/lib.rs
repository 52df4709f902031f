//! Lifecycle management for the single process rundog supervises.
//!
//! - [`Supervisor`] starts, polls, restarts, and stops the child
//! - [`ProcessSpec`] describes what to run and where its output goes
//! - [`OutputTarget`] redirect files are truncated on every start and closed
//!   whenever the instance that opened them is stopped

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod process;
pub mod supervisor;

pub use error::SupervisorError;
pub use process::{ManagedProcess, OutputTarget, ProcessSpec, exit_code};
pub use supervisor::{PollStatus, Supervisor, SupervisorOptions};
