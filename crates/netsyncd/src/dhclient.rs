//! DHCP client lifecycle management.
//!
//! The engine never keeps in-memory DHCP state. Whether a client is
//! running is derived on every pass from its pid file, and lease
//! contents are re-read from the lease file. Both files follow the
//! platform dhclient conventions: `dhclient.<iface>.pid` under the
//! run directory and `dhclient.leases.<iface>` under the lease
//! directory.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use netsync_common::{shell, SyncError, SyncResult};
use netsync_types::IfAddress;

use crate::adapter::DhclientStatus;

const DEFAULT_RUN_DIR: &str = "/var/run";
const DEFAULT_LEASE_DIR: &str = "/var/db";

static LEASE_FIXED_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"fixed-address\s+(.+);").expect("Invalid regex pattern"));
static LEASE_SUBNET_MASK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"option subnet-mask\s+(.+);").expect("Invalid regex pattern"));
static LEASE_ROUTERS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"option routers\s+(.+);").expect("Invalid regex pattern"));

/// Manages dhclient processes through their pid and lease files.
#[derive(Debug, Clone)]
pub struct DhclientManager {
    run_dir: PathBuf,
    lease_dir: PathBuf,
}

impl Default for DhclientManager {
    fn default() -> Self {
        Self::new(DEFAULT_RUN_DIR, DEFAULT_LEASE_DIR)
    }
}

impl DhclientManager {
    pub fn new(run_dir: impl Into<PathBuf>, lease_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            lease_dir: lease_dir.into(),
        }
    }

    fn pidfile(&self, interface: &str) -> PathBuf {
        self.run_dir.join(format!("dhclient.{interface}.pid"))
    }

    fn leasefile(&self, interface: &str) -> PathBuf {
        self.lease_dir.join(format!("dhclient.leases.{interface}"))
    }

    /// Derives the client's status from its pid file.
    ///
    /// A missing or malformed pid file means not running; a recorded
    /// pid is probed with a null signal to confirm the process still
    /// exists.
    pub async fn status(&self, interface: &str) -> SyncResult<DhclientStatus> {
        let pidfile = self.pidfile(interface);
        let content = match tokio::fs::read_to_string(&pidfile).await {
            Ok(content) => content,
            Err(_) => return Ok(DhclientStatus::stopped()),
        };
        let pid: i32 = match content.trim().parse() {
            Ok(pid) => pid,
            Err(_) => {
                tracing::warn!(
                    interface = %interface,
                    pidfile = %pidfile.display(),
                    "Malformed dhclient pid file, treating as not running"
                );
                return Ok(DhclientStatus::stopped());
            }
        };
        let running = kill(Pid::from_raw(pid), None).is_ok();
        Ok(DhclientStatus {
            running,
            pid: running.then_some(pid),
        })
    }

    /// Raw lease file content, `None` when no lease file exists.
    pub async fn leases(&self, interface: &str) -> SyncResult<Option<String>> {
        match tokio::fs::read_to_string(self.leasefile(interface)).await {
            Ok(content) => Ok(Some(content)),
            Err(_) => Ok(None),
        }
    }

    /// Launches dhclient in background mode for an interface.
    ///
    /// Returns once the process is spawned; lease acquisition happens
    /// asynchronously. A non-zero exit is logged, not raised, since
    /// the next pass re-derives the client state from the pid file.
    pub async fn start(&self, interface: &str) -> SyncResult<()> {
        let cmd = format!(
            "{} -b {}",
            shell::DHCLIENT_CMD,
            shell::shellquote(interface)
        );
        tracing::debug!(interface = %interface, command = %cmd, "Starting dhclient");

        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SyncError::ShellExec {
                command: cmd.clone(),
                source: e,
            })?;

        let interface = interface.to_string();
        tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if !output.status.success() => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    tracing::error!(
                        interface = %interface,
                        exit_code = output.status.code().unwrap_or(-1),
                        stderr = %stderr.trim(),
                        "dhclient exited with an error"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(interface = %interface, error = %e, "Failed to reap dhclient");
                }
            }
        });
        Ok(())
    }

    /// Sends SIGTERM to a running client. Does not wait for exit; the
    /// next pass observes the result through the pid file.
    pub async fn stop(&self, interface: &str, pid: i32) -> SyncResult<()> {
        tracing::debug!(interface = %interface, pid = pid, "Stopping dhclient");
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| {
            SyncError::dhcp_client(interface, format!("failed to signal pid {pid}: {e}"))
        })
    }
}

/// Extracts the leased interface address from lease file content.
///
/// Requires both a `fixed-address` and an `option subnet-mask`
/// statement; the last occurrence of each wins, matching how the
/// client appends renewed leases.
pub fn parse_lease_address(leases: &str) -> Option<IfAddress> {
    let ip: IpAddr = LEASE_FIXED_ADDRESS_RE
        .captures_iter(leases)
        .last()?
        .get(1)?
        .as_str()
        .trim()
        .parse()
        .ok()?;
    let netmask: IpAddr = LEASE_SUBNET_MASK_RE
        .captures_iter(leases)
        .last()?
        .get(1)?
        .as_str()
        .trim()
        .parse()
        .ok()?;
    IfAddress::with_netmask(ip, netmask).ok()
}

/// Extracts the default router from lease file content.
///
/// The routers option may list several addresses; only the first is
/// used.
pub fn parse_lease_routers(leases: &str) -> Option<IpAddr> {
    LEASE_ROUTERS_RE
        .captures_iter(leases)
        .last()?
        .get(1)?
        .as_str()
        .split_whitespace()
        .next()?
        .trim_end_matches(',')
        .parse()
        .ok()
}
