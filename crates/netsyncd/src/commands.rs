//! Shell command builders for interface and route operations.
//!
//! Pure string builders over the platform toolset; the adapter in
//! [`crate::freebsd`] executes them. Interface names always pass
//! through [`shell::shellquote`].

use netsync_common::shell;
use netsync_types::{AddressFamily, IfAddress, RouteEntry};

use crate::adapter::{CarpConfig, Nd6Flag, VlanState};
use crate::types::LaggProtocol;

/// Interface name prefixes the engine treats as internal and never
/// touches during cleanup.
pub const INTERNAL_PREFIXES: &[&str] = &["lo", "pflog", "pfsync", "tun", "tap", "bridge", "epair"];

/// Prefixes identifying cloned (virtual) interface classes the
/// engine may destroy outright.
pub const CLONED_PREFIXES: &[&str] = &["lagg", "vlan"];

/// Prefixes excluded from system-wide address scans (loopback and
/// host-side virtual pairs carry addresses that are not routable
/// network presence).
pub const ADDRESS_SCAN_IGNORE_PREFIXES: &[&str] = &["lo", "bridge", "tap", "epair"];

pub fn build_list_names_cmd() -> String {
    format!("{} -l", shell::IFCONFIG_CMD)
}

pub fn build_show_cmd(name: &str) -> String {
    format!("{} {}", shell::IFCONFIG_CMD, shell::shellquote(name))
}

pub fn build_create_cmd(name: &str) -> String {
    format!("{} {} create", shell::IFCONFIG_CMD, shell::shellquote(name))
}

pub fn build_destroy_cmd(name: &str) -> String {
    format!("{} {} destroy", shell::IFCONFIG_CMD, shell::shellquote(name))
}

pub fn build_up_cmd(name: &str) -> String {
    format!("{} {} up", shell::IFCONFIG_CMD, shell::shellquote(name))
}

pub fn build_down_cmd(name: &str) -> String {
    format!("{} {} down", shell::IFCONFIG_CMD, shell::shellquote(name))
}

pub fn build_mtu_cmd(name: &str, mtu: u32) -> String {
    format!(
        "{} {} mtu {}",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        mtu
    )
}

/// Builds the address-add command. CARP addresses carry their group
/// id so the OS attaches them to the right failover group at
/// creation time.
pub fn build_add_address_cmd(name: &str, addr: &IfAddress) -> String {
    let mut cmd = format!(
        "{} {} {} {}/{}",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        addr.family().as_str(),
        addr.ip(),
        addr.prefix_len()
    );
    if let Some(broadcast) = addr.broadcast() {
        cmd.push_str(&format!(" broadcast {broadcast}"));
    }
    if let Some(vhid) = addr.vhid() {
        cmd.push_str(&format!(" vhid {vhid}"));
    }
    cmd.push_str(" alias");
    cmd
}

pub fn build_remove_address_cmd(name: &str, addr: &IfAddress) -> String {
    format!(
        "{} {} {} {} -alias",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        addr.family().as_str(),
        addr.ip()
    )
}

pub fn build_carp_cmd(name: &str, config: &CarpConfig) -> String {
    let mut cmd = format!(
        "{} {} vhid {} advskew {}",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        config.vhid,
        config.advskew
    );
    if let Some(pass) = &config.passphrase {
        cmd.push_str(&format!(" pass {}", shell::shellquote(pass)));
    }
    cmd
}

/// Builds the nd6 flag command. Every managed flag is stated
/// explicitly (set or cleared) so the result does not depend on the
/// interface's previous flag set.
pub fn build_nd6_cmd(name: &str, flags: &std::collections::HashSet<Nd6Flag>) -> String {
    let mut cmd = format!("{} {} inet6", shell::IFCONFIG_CMD, shell::shellquote(name));
    for flag in [Nd6Flag::IfDisabled, Nd6Flag::AutoLinkLocal, Nd6Flag::AcceptRtAdv] {
        if flags.contains(&flag) {
            cmd.push_str(&format!(" {}", flag.as_str()));
        } else {
            cmd.push_str(&format!(" -{}", flag.as_str()));
        }
    }
    cmd
}

pub fn build_lagg_protocol_cmd(name: &str, protocol: LaggProtocol) -> String {
    format!(
        "{} {} laggproto {}",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        protocol.as_str()
    )
}

pub fn build_add_lagg_port_cmd(name: &str, port: &str) -> String {
    format!(
        "{} {} laggport {}",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        shell::shellquote(port)
    )
}

pub fn build_remove_lagg_port_cmd(name: &str, port: &str) -> String {
    format!(
        "{} {} -laggport {}",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        shell::shellquote(port)
    )
}

pub fn build_configure_vlan_cmd(name: &str, state: &VlanState) -> String {
    format!(
        "{} {} vlan {} vlanpcp {} vlandev {}",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        state.tag,
        state.pcp,
        shell::shellquote(&state.parent)
    )
}

pub fn build_unconfigure_vlan_cmd(name: &str) -> String {
    format!(
        "{} {} -vlandev",
        shell::IFCONFIG_CMD,
        shell::shellquote(name)
    )
}

/// The options string is operator-supplied free-form ifconfig syntax
/// and is passed through verbatim.
pub fn build_options_cmd(name: &str, options: &str) -> String {
    format!(
        "{} {} {}",
        shell::IFCONFIG_CMD,
        shell::shellquote(name),
        options
    )
}

fn family_flag(family: AddressFamily) -> &'static str {
    match family {
        AddressFamily::Inet => "-inet",
        AddressFamily::Inet6 => "-inet6",
    }
}

pub fn build_route_get_cmd(family: AddressFamily) -> String {
    format!("{} -n get {} default", shell::ROUTE_CMD, family_flag(family))
}

pub fn build_route_add_cmd(route: &RouteEntry) -> String {
    format!(
        "{} -n add {} default {}",
        shell::ROUTE_CMD,
        family_flag(route.family),
        route.gateway
    )
}

pub fn build_route_change_cmd(route: &RouteEntry) -> String {
    format!(
        "{} -n change {} default {}",
        shell::ROUTE_CMD,
        family_flag(route.family),
        route.gateway
    )
}

pub fn build_route_delete_cmd(route: &RouteEntry) -> String {
    format!(
        "{} -n delete {} default",
        shell::ROUTE_CMD,
        family_flag(route.family)
    )
}

pub fn build_rtsold_start_cmd() -> String {
    format!("{} onestart", shell::RTSOLD_RC_CMD)
}
