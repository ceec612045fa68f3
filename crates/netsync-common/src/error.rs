//! Error types for reconciliation operations.
//!
//! Failures are contained at the smallest unit that can be retried on
//! the next pass (a single interface, a single route family). The
//! orchestrator uses [`SyncError::is_not_found`] to distinguish
//! "declared object absent in the OS — skip, non-fatal" from "the OS
//! rejected the operation".

use std::io;
use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while converging declared network state.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Failed to spawn a shell command.
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// A declared interface, lagg member, or vlan parent is absent
    /// from the OS.
    #[error("Interface '{name}' not found")]
    NotFound { name: String },

    /// The OS adapter rejected an operation (create/destroy, address,
    /// route, carp, flag change).
    #[error("Adapter operation failed: {operation}: {message}")]
    Adapter { operation: String, message: String },

    /// The external DHCP client failed to launch or exited non-zero.
    #[error("dhclient failure on '{interface}': {message}")]
    DhcpClient { interface: String, message: String },

    /// A declared record failed shape validation at the configuration
    /// store boundary.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig { field: String, message: String },
}

impl SyncError {
    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an adapter error.
    pub fn adapter(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a DHCP client error.
    pub fn dhcp_client(interface: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DhcpClient {
            interface: interface.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error means the object is simply absent
    /// in the OS, which callers treat as "skip, retry next pass".
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }
}
