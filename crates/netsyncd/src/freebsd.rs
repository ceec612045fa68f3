//! Production [`OsAdapter`] over the platform command-line tools.
//!
//! Thin glue: builds commands with [`crate::commands`], runs them via
//! [`netsync_common::shell`], and parses output with
//! [`crate::ifconfig`]. All reconciliation decisions live upstream in
//! the engine.

use async_trait::async_trait;
use std::collections::HashSet;

use netsync_common::{shell, SyncError, SyncResult};
use netsync_types::{AddressFamily, IfAddress, RouteEntry};

use crate::adapter::{CarpConfig, DhclientStatus, LiveInterface, Nd6Flag, OsAdapter, VlanState};
use crate::commands;
use crate::dhclient::DhclientManager;
use crate::ifconfig;
use crate::types::LaggProtocol;

#[derive(Debug, Default)]
pub struct FreeBsdAdapter {
    dhclient: DhclientManager,
}

impl FreeBsdAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn show(&self, name: &str) -> SyncResult<String> {
        let result = shell::exec(&commands::build_show_cmd(name)).await?;
        if result.success() {
            return Ok(result.stdout);
        }
        // `ifconfig <name>` reports absent interfaces on stderr.
        if result.stderr.contains("does not exist") {
            return Err(SyncError::not_found(name));
        }
        Err(SyncError::CommandFailed {
            command: commands::build_show_cmd(name),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}

#[async_trait]
impl OsAdapter for FreeBsdAdapter {
    async fn list_interfaces(&self) -> SyncResult<Vec<LiveInterface>> {
        let names = shell::exec_or_throw(&commands::build_list_names_cmd()).await?;
        let mut interfaces = Vec::new();
        for name in names.split_whitespace() {
            match self.get_interface(name).await {
                Ok(iface) => interfaces.push(iface),
                // May have disappeared between list and read.
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(interfaces)
    }

    async fn get_interface(&self, name: &str) -> SyncResult<LiveInterface> {
        let output = self.show(name).await?;
        ifconfig::parse_interface(name, &output)
    }

    async fn create_interface(&self, name: &str) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_create_cmd(name)).await?;
        Ok(())
    }

    async fn destroy_interface(&self, name: &str) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_destroy_cmd(name)).await?;
        Ok(())
    }

    async fn up(&self, name: &str) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_up_cmd(name)).await?;
        Ok(())
    }

    async fn down(&self, name: &str) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_down_cmd(name)).await?;
        Ok(())
    }

    async fn set_mtu(&self, name: &str, mtu: u32) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_mtu_cmd(name, mtu)).await?;
        Ok(())
    }

    async fn add_address(&self, name: &str, addr: &IfAddress) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_add_address_cmd(name, addr)).await?;
        Ok(())
    }

    async fn remove_address(&self, name: &str, addr: &IfAddress) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_remove_address_cmd(name, addr)).await?;
        Ok(())
    }

    async fn set_carp(&self, name: &str, config: &CarpConfig) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_carp_cmd(name, config)).await?;
        Ok(())
    }

    async fn set_nd6_flags(&self, name: &str, flags: &HashSet<Nd6Flag>) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_nd6_cmd(name, flags)).await?;
        Ok(())
    }

    async fn set_lagg_protocol(&self, name: &str, protocol: LaggProtocol) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_lagg_protocol_cmd(name, protocol)).await?;
        Ok(())
    }

    async fn add_lagg_port(&self, name: &str, port: &str) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_add_lagg_port_cmd(name, port)).await?;
        Ok(())
    }

    async fn remove_lagg_port(&self, name: &str, port: &str) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_remove_lagg_port_cmd(name, port)).await?;
        Ok(())
    }

    async fn configure_vlan(&self, name: &str, state: &VlanState) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_configure_vlan_cmd(name, state)).await?;
        Ok(())
    }

    async fn unconfigure_vlan(&self, name: &str) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_unconfigure_vlan_cmd(name)).await?;
        Ok(())
    }

    async fn apply_options(&self, name: &str, options: &str) -> SyncResult<String> {
        let result = shell::exec(&commands::build_options_cmd(name, options)).await?;
        Ok(result.stderr)
    }

    async fn default_route(&self, family: AddressFamily) -> SyncResult<Option<RouteEntry>> {
        let result = shell::exec(&commands::build_route_get_cmd(family)).await?;
        // Non-zero exit means no route is installed for this family.
        if !result.success() {
            return Ok(None);
        }
        Ok(ifconfig::parse_route_get(&result.stdout))
    }

    async fn add_route(&self, route: &RouteEntry) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_route_add_cmd(route)).await?;
        Ok(())
    }

    async fn change_route(&self, route: &RouteEntry) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_route_change_cmd(route)).await?;
        Ok(())
    }

    async fn delete_route(&self, route: &RouteEntry) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_route_delete_cmd(route)).await?;
        Ok(())
    }

    async fn dhclient_status(&self, name: &str) -> SyncResult<DhclientStatus> {
        self.dhclient.status(name).await
    }

    async fn dhclient_leases(&self, name: &str) -> SyncResult<Option<String>> {
        self.dhclient.leases(name).await
    }

    async fn dhclient_start(&self, name: &str) -> SyncResult<()> {
        self.dhclient.start(name).await
    }

    async fn dhclient_stop(&self, name: &str, pid: i32) -> SyncResult<()> {
        self.dhclient.stop(name, pid).await
    }

    async fn start_rtsold(&self) -> SyncResult<()> {
        shell::exec_or_throw(&commands::build_rtsold_start_cmd()).await?;
        Ok(())
    }
}
