//! The OS network adapter seam.
//!
//! Every privileged operation the engine performs goes through
//! [`OsAdapter`]. The production implementation shells out to the
//! platform tools ([`crate::freebsd::FreeBsdAdapter`]); tests use a
//! recording in-memory implementation.

use async_trait::async_trait;
use std::collections::HashSet;

use netsync_common::SyncResult;
use netsync_types::{AddressFamily, IfAddress, RouteEntry};

use crate::types::LaggProtocol;

/// IPv6 neighbor-discovery flags the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Nd6Flag {
    /// IPv6 processing disabled on the interface.
    IfDisabled,
    /// Automatically configure a link-local address.
    AutoLinkLocal,
    /// Accept router advertisements.
    AcceptRtAdv,
}

impl Nd6Flag {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Nd6Flag::IfDisabled => "ifdisabled",
            Nd6Flag::AutoLinkLocal => "auto_linklocal",
            Nd6Flag::AcceptRtAdv => "accept_rtadv",
        }
    }
}

/// A live CARP group as read from the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarpEntry {
    pub vhid: u16,
    pub advskew: u8,
}

/// CARP parameters to apply to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarpConfig {
    pub vhid: u16,
    pub advskew: u8,
    pub passphrase: Option<String>,
}

/// Live VLAN configuration of a virtual interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanState {
    pub parent: String,
    pub tag: u16,
    pub pcp: u8,
}

/// Snapshot of one live OS interface.
///
/// Link-layer addresses are excluded from `addresses` at read time;
/// the reconciler never compares them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInterface {
    pub name: String,
    pub up: bool,
    pub mtu: u32,
    pub addresses: HashSet<IfAddress>,
    pub carp: Vec<CarpEntry>,
    pub nd6_flags: HashSet<Nd6Flag>,
    /// Present when this is a lagg interface.
    pub lagg_protocol: Option<LaggProtocol>,
    pub lagg_ports: Vec<String>,
    /// Present when this is a configured vlan interface.
    pub vlan: Option<VlanState>,
}

impl LiveInterface {
    /// An interface that exists but carries no configuration yet.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up: false,
            mtu: 1500,
            addresses: HashSet::new(),
            carp: Vec::new(),
            nd6_flags: HashSet::new(),
            lagg_protocol: None,
            lagg_ports: Vec::new(),
            vlan: None,
        }
    }
}

/// Derived state of the external DHCP client for one interface.
///
/// Always re-read from the pid file; never cached in memory, so the
/// engine cannot drift from OS reality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhclientStatus {
    pub running: bool,
    pub pid: Option<i32>,
}

impl DhclientStatus {
    pub const fn stopped() -> Self {
        Self {
            running: false,
            pid: None,
        }
    }
}

/// The privileged operations the engine needs from the OS.
///
/// Implementations must map "object absent" onto
/// [`netsync_common::SyncError::NotFound`] so the orchestrator can
/// skip instead of fail.
#[async_trait]
pub trait OsAdapter: Send + Sync {
    /// Enumerates all live interfaces.
    async fn list_interfaces(&self) -> SyncResult<Vec<LiveInterface>>;

    /// Looks up one interface by name.
    async fn get_interface(&self, name: &str) -> SyncResult<LiveInterface>;

    /// Creates a virtual (cloned) interface.
    async fn create_interface(&self, name: &str) -> SyncResult<()>;

    /// Destroys a virtual (cloned) interface.
    async fn destroy_interface(&self, name: &str) -> SyncResult<()>;

    async fn up(&self, name: &str) -> SyncResult<()>;

    async fn down(&self, name: &str) -> SyncResult<()>;

    async fn set_mtu(&self, name: &str, mtu: u32) -> SyncResult<()>;

    async fn add_address(&self, name: &str, addr: &IfAddress) -> SyncResult<()>;

    async fn remove_address(&self, name: &str, addr: &IfAddress) -> SyncResult<()>;

    /// Applies CARP failover parameters to an interface.
    async fn set_carp(&self, name: &str, config: &CarpConfig) -> SyncResult<()>;

    /// Replaces the interface's neighbor-discovery flag set.
    async fn set_nd6_flags(&self, name: &str, flags: &HashSet<Nd6Flag>) -> SyncResult<()>;

    async fn set_lagg_protocol(&self, name: &str, protocol: LaggProtocol) -> SyncResult<()>;

    async fn add_lagg_port(&self, name: &str, port: &str) -> SyncResult<()>;

    async fn remove_lagg_port(&self, name: &str, port: &str) -> SyncResult<()>;

    /// Configures parent/tag/priority on a vlan interface. The
    /// interface must be unconfigured first; changing a single field
    /// in place is not supported by the OS.
    async fn configure_vlan(&self, name: &str, state: &VlanState) -> SyncResult<()>;

    async fn unconfigure_vlan(&self, name: &str) -> SyncResult<()>;

    /// Runs the free-form interface options string and returns the
    /// command's stderr output (empty on clean runs).
    async fn apply_options(&self, name: &str, options: &str) -> SyncResult<String>;

    /// Reads the default route for one family, `None` when absent.
    async fn default_route(&self, family: AddressFamily) -> SyncResult<Option<RouteEntry>>;

    async fn add_route(&self, route: &RouteEntry) -> SyncResult<()>;

    async fn change_route(&self, route: &RouteEntry) -> SyncResult<()>;

    async fn delete_route(&self, route: &RouteEntry) -> SyncResult<()>;

    /// Derived dhclient state for an interface (pid file probe).
    async fn dhclient_status(&self, name: &str) -> SyncResult<DhclientStatus>;

    /// Raw lease file content for an interface, if one exists.
    async fn dhclient_leases(&self, name: &str) -> SyncResult<Option<String>>;

    /// Starts dhclient in background mode. Launch failures are
    /// reported through logs; the call itself does not block on the
    /// client obtaining a lease.
    async fn dhclient_start(&self, name: &str) -> SyncResult<()>;

    /// Sends a graceful termination signal to the recorded dhclient
    /// pid. Does not wait or force-kill.
    async fn dhclient_stop(&self, name: &str, pid: i32) -> SyncResult<()>;

    /// Starts the router solicitation daemon.
    async fn start_rtsold(&self) -> SyncResult<()>;
}
