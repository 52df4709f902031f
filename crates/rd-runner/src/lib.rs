//! Debounced restart coordination and the rundog driver loop.
//!
//! - [`Debouncer`] turns file events into restarts, one per burst
//! - [`RestartTarget`] is what the debouncer restarts; [`Supervisor`] is the
//!   production implementation
//! - [`Session`] runs the watcher, the debouncer and the supervisor until the
//!   child exits or the user interrupts
//!
//! [`Supervisor`]: rd_supervisor::Supervisor
//!
//! # Usage
//!
//! ```no_run
//! use rd_core::Config;
//! use rd_runner::Session;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(config: Config) -> Result<(), rd_runner::RunError> {
//! let session = Session::start(&config).await?;
//! let reason = session.run(CancellationToken::new()).await?;
//! println!("{reason:?}");
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod debounce;
pub mod error;
pub mod session;

pub use debounce::{Debouncer, RestartTarget};
pub use error::RunError;
pub use session::{DriverState, Session, ShutdownReason, next_state};
