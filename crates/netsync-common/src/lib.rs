//! Common infrastructure for the network state reconciliation engine.
//!
//! - [`shell`]: safe shell command execution with proper quoting
//! - [`error`]: the engine-wide error taxonomy
//!
//! # Architecture
//!
//! The engine converges declared network configuration into the live
//! OS network stack. Every privileged operation goes through an OS
//! adapter; the shell-backed adapter builds commands with
//! [`shell::shellquote`] and runs them with [`shell::exec`] /
//! [`shell::exec_or_throw`]. Failures map onto [`SyncError`] so the
//! orchestrator can tell "absent, skip" from "rejected, log and move
//! on".

pub mod error;
pub mod shell;

pub use error::{SyncError, SyncResult};
