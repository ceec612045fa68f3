//! Recording in-memory [`OsAdapter`] for engine tests.
//!
//! Every mutation is appended to an operation log and also applied to
//! the in-memory live state, so idempotence tests can simply run a
//! second pass and assert the log stays empty.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use netsync_common::{SyncError, SyncResult};
use netsync_types::{AddressFamily, IfAddress, RouteEntry};

use crate::adapter::{CarpConfig, DhclientStatus, LiveInterface, Nd6Flag, OsAdapter, VlanState};
use crate::types::LaggProtocol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Create(String),
    Destroy(String),
    Up(String),
    Down(String),
    SetMtu(String, u32),
    AddAddress(String, IfAddress),
    RemoveAddress(String, IfAddress),
    SetCarp(String, CarpConfig),
    SetNd6(String, Vec<Nd6Flag>),
    SetLaggProtocol(String, LaggProtocol),
    AddLaggPort(String, String),
    RemoveLaggPort(String, String),
    ConfigureVlan(String, VlanState),
    UnconfigureVlan(String),
    ApplyOptions(String, String),
    AddRoute(RouteEntry),
    ChangeRoute(RouteEntry),
    DeleteRoute(RouteEntry),
    DhclientStart(String),
    DhclientStop(String, i32),
    StartRtsold,
}

#[derive(Debug, Default)]
struct MockState {
    interfaces: HashMap<String, LiveInterface>,
    routes: HashMap<AddressFamily, RouteEntry>,
    dhclient: HashMap<String, DhclientStatus>,
    leases: HashMap<String, String>,
    ops: Vec<MockOp>,
    fail_interfaces: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MockOs {
    state: Mutex<MockState>,
}

impl MockOs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interface(&self, iface: LiveInterface) {
        let mut state = self.state.lock().unwrap();
        state.interfaces.insert(iface.name.clone(), iface);
    }

    pub fn set_route(&self, route: RouteEntry) {
        let mut state = self.state.lock().unwrap();
        state.routes.insert(route.family, route);
    }

    pub fn set_dhclient(&self, name: &str, status: DhclientStatus, leases: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.dhclient.insert(name.to_string(), status);
        if let Some(leases) = leases {
            state.leases.insert(name.to_string(), leases.to_string());
        }
    }

    /// All mutations on this interface will fail with an adapter
    /// error.
    pub fn fail_interface(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_interfaces.insert(name.to_string());
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Returns and clears the operation log.
    pub fn take_ops(&self) -> Vec<MockOp> {
        std::mem::take(&mut self.state.lock().unwrap().ops)
    }

    pub fn interface(&self, name: &str) -> Option<LiveInterface> {
        self.state.lock().unwrap().interfaces.get(name).cloned()
    }

    pub fn route(&self, family: AddressFamily) -> Option<RouteEntry> {
        self.state.lock().unwrap().routes.get(&family).copied()
    }

    fn mutate<R>(
        &self,
        name: &str,
        op: MockOp,
        f: impl FnOnce(&mut LiveInterface) -> R,
    ) -> SyncResult<R> {
        let mut state = self.state.lock().unwrap();
        if state.fail_interfaces.contains(name) {
            return Err(SyncError::adapter(
                format!("{op:?}"),
                format!("injected failure on {name}"),
            ));
        }
        let iface = state
            .interfaces
            .get_mut(name)
            .ok_or_else(|| SyncError::not_found(name))?;
        let out = f(iface);
        state.ops.push(op);
        Ok(out)
    }
}

#[async_trait]
impl OsAdapter for MockOs {
    async fn list_interfaces(&self) -> SyncResult<Vec<LiveInterface>> {
        let state = self.state.lock().unwrap();
        let mut interfaces: Vec<_> = state.interfaces.values().cloned().collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }

    async fn get_interface(&self, name: &str) -> SyncResult<LiveInterface> {
        self.state
            .lock()
            .unwrap()
            .interfaces
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::not_found(name))
    }

    async fn create_interface(&self, name: &str) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_interfaces.contains(name) {
            return Err(SyncError::adapter("create", format!("injected failure on {name}")));
        }
        state
            .interfaces
            .insert(name.to_string(), LiveInterface::bare(name));
        state.ops.push(MockOp::Create(name.to_string()));
        Ok(())
    }

    async fn destroy_interface(&self, name: &str) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.interfaces.remove(name).is_none() {
            return Err(SyncError::not_found(name));
        }
        state.ops.push(MockOp::Destroy(name.to_string()));
        Ok(())
    }

    async fn up(&self, name: &str) -> SyncResult<()> {
        self.mutate(name, MockOp::Up(name.to_string()), |i| i.up = true)
    }

    async fn down(&self, name: &str) -> SyncResult<()> {
        self.mutate(name, MockOp::Down(name.to_string()), |i| i.up = false)
    }

    async fn set_mtu(&self, name: &str, mtu: u32) -> SyncResult<()> {
        self.mutate(name, MockOp::SetMtu(name.to_string(), mtu), |i| i.mtu = mtu)
    }

    async fn add_address(&self, name: &str, addr: &IfAddress) -> SyncResult<()> {
        self.mutate(name, MockOp::AddAddress(name.to_string(), *addr), |i| {
            i.addresses.insert(*addr);
        })
    }

    async fn remove_address(&self, name: &str, addr: &IfAddress) -> SyncResult<()> {
        self.mutate(name, MockOp::RemoveAddress(name.to_string(), *addr), |i| {
            i.addresses.remove(addr);
        })
    }

    async fn set_carp(&self, name: &str, config: &CarpConfig) -> SyncResult<()> {
        let config = config.clone();
        self.mutate(name, MockOp::SetCarp(name.to_string(), config.clone()), |i| {
            i.carp.retain(|e| e.vhid != config.vhid);
            i.carp.push(crate::adapter::CarpEntry {
                vhid: config.vhid,
                advskew: config.advskew,
            });
        })
    }

    async fn set_nd6_flags(&self, name: &str, flags: &HashSet<Nd6Flag>) -> SyncResult<()> {
        let mut sorted: Vec<_> = flags.iter().copied().collect();
        sorted.sort();
        self.mutate(name, MockOp::SetNd6(name.to_string(), sorted), |i| {
            i.nd6_flags = flags.clone();
        })
    }

    async fn set_lagg_protocol(&self, name: &str, protocol: LaggProtocol) -> SyncResult<()> {
        self.mutate(
            name,
            MockOp::SetLaggProtocol(name.to_string(), protocol),
            |i| i.lagg_protocol = Some(protocol),
        )
    }

    async fn add_lagg_port(&self, name: &str, port: &str) -> SyncResult<()> {
        // The OS rejects enslaving an interface that does not exist.
        if self.state.lock().unwrap().interfaces.get(port).is_none() {
            return Err(SyncError::not_found(port));
        }
        let port = port.to_string();
        self.mutate(
            name,
            MockOp::AddLaggPort(name.to_string(), port.clone()),
            |i| i.lagg_ports.push(port),
        )
    }

    async fn remove_lagg_port(&self, name: &str, port: &str) -> SyncResult<()> {
        let port = port.to_string();
        self.mutate(
            name,
            MockOp::RemoveLaggPort(name.to_string(), port.clone()),
            |i| i.lagg_ports.retain(|p| p != &port),
        )
    }

    async fn configure_vlan(&self, name: &str, state: &VlanState) -> SyncResult<()> {
        let state = state.clone();
        self.mutate(
            name,
            MockOp::ConfigureVlan(name.to_string(), state.clone()),
            |i| i.vlan = Some(state),
        )
    }

    async fn unconfigure_vlan(&self, name: &str) -> SyncResult<()> {
        self.mutate(name, MockOp::UnconfigureVlan(name.to_string()), |i| {
            i.vlan = None;
        })
    }

    async fn apply_options(&self, name: &str, options: &str) -> SyncResult<String> {
        let options = options.to_string();
        self.mutate(
            name,
            MockOp::ApplyOptions(name.to_string(), options),
            |_| String::new(),
        )
    }

    async fn default_route(&self, family: AddressFamily) -> SyncResult<Option<RouteEntry>> {
        Ok(self.state.lock().unwrap().routes.get(&family).copied())
    }

    async fn add_route(&self, route: &RouteEntry) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.routes.insert(route.family, *route);
        state.ops.push(MockOp::AddRoute(*route));
        Ok(())
    }

    async fn change_route(&self, route: &RouteEntry) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.routes.insert(route.family, *route);
        state.ops.push(MockOp::ChangeRoute(*route));
        Ok(())
    }

    async fn delete_route(&self, route: &RouteEntry) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.routes.remove(&route.family);
        state.ops.push(MockOp::DeleteRoute(*route));
        Ok(())
    }

    async fn dhclient_status(&self, name: &str) -> SyncResult<DhclientStatus> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .dhclient
            .get(name)
            .copied()
            .unwrap_or(DhclientStatus::stopped()))
    }

    async fn dhclient_leases(&self, name: &str) -> SyncResult<Option<String>> {
        Ok(self.state.lock().unwrap().leases.get(name).cloned())
    }

    async fn dhclient_start(&self, name: &str) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_interfaces.contains(name) {
            return Err(SyncError::dhcp_client(name, "injected failure"));
        }
        state.dhclient.insert(
            name.to_string(),
            DhclientStatus {
                running: true,
                pid: Some(4242),
            },
        );
        state.ops.push(MockOp::DhclientStart(name.to_string()));
        Ok(())
    }

    async fn dhclient_stop(&self, name: &str, pid: i32) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.dhclient.insert(name.to_string(), DhclientStatus::stopped());
        state.ops.push(MockOp::DhclientStop(name.to_string(), pid));
        Ok(())
    }

    async fn start_rtsold(&self) -> SyncResult<()> {
        self.state.lock().unwrap().ops.push(MockOp::StartRtsold);
        Ok(())
    }
}
