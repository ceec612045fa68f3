//! Parsers for `ifconfig` and `route` tool output.
//!
//! Pure text-to-state functions; no I/O happens here. The adapter
//! feeds these the raw command output and gets back the live
//! interface snapshot the reconciler compares against.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use netsync_common::{SyncError, SyncResult};
use netsync_types::{IfAddress, RouteEntry};

use crate::adapter::{CarpEntry, LiveInterface, Nd6Flag, VlanState};
use crate::types::LaggProtocol;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"flags=[0-9a-fA-F]+<([^>]*)>.*\bmtu (\d+)").expect("Invalid regex pattern")
});
static INET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*inet (\S+) netmask (0x[0-9a-fA-F]{8})(?: broadcast (\S+))?(?: vhid (\d+))?")
        .expect("Invalid regex pattern")
});
static INET6_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*inet6 (\S+) prefixlen (\d+)(?:.* vhid (\d+))?").expect("Invalid regex pattern")
});
static CARP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*carp: \S+ vhid (\d+) advbase \d+ advskew (\d+)")
        .expect("Invalid regex pattern")
});
static ND6_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*nd6 options=[0-9a-fA-F]+<([^>]*)>").expect("Invalid regex pattern"));
static LAGG_PROTO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*laggproto (\S+)").expect("Invalid regex pattern"));
static LAGG_PORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*laggport: (\S+)").expect("Invalid regex pattern"));
static VLAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*vlan: (\d+) vlanpcp: (\d+) parent interface: (\S+)")
        .expect("Invalid regex pattern")
});
static ROUTE_GATEWAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*gateway: (\S+)").expect("Invalid regex pattern"));

fn parse_error(name: &str, detail: impl Into<String>) -> SyncError {
    SyncError::adapter(format!("parse interface {name}"), detail.into())
}

/// Parses one interface's `ifconfig` output into a live snapshot.
///
/// Link-layer (`ether`) lines are ignored; the reconciler only deals
/// in inet/inet6 addresses.
pub fn parse_interface(name: &str, output: &str) -> SyncResult<LiveInterface> {
    let mut iface = LiveInterface::bare(name);
    let header = HEADER_RE
        .captures(output)
        .ok_or_else(|| parse_error(name, "missing flags/mtu header"))?;
    iface.up = header[1].split(',').any(|f| f == "UP");
    iface.mtu = header[2]
        .parse()
        .map_err(|_| parse_error(name, "unparsable mtu"))?;

    for line in output.lines() {
        if let Some(caps) = INET_RE.captures(line) {
            let ip: Ipv4Addr = caps[1]
                .parse()
                .map_err(|_| parse_error(name, format!("bad inet address: {}", &caps[1])))?;
            let mask_bits = u32::from_str_radix(&caps[2][2..], 16)
                .map_err(|_| parse_error(name, format!("bad netmask: {}", &caps[2])))?;
            let mut addr =
                IfAddress::with_netmask(IpAddr::V4(ip), IpAddr::V4(Ipv4Addr::from(mask_bits)))
                    .map_err(|e| parse_error(name, e.to_string()))?;
            if let Some(vhid) = caps.get(4) {
                let vhid = vhid
                    .as_str()
                    .parse()
                    .map_err(|_| parse_error(name, "bad vhid"))?;
                addr = addr.with_vhid(vhid);
            }
            iface.addresses.insert(addr);
        } else if let Some(caps) = INET6_RE.captures(line) {
            // Strip the %scope suffix from link-local addresses.
            let raw = caps[1].split('%').next().unwrap_or(&caps[1]);
            let ip: IpAddr = raw
                .parse()
                .map_err(|_| parse_error(name, format!("bad inet6 address: {raw}")))?;
            let prefix_len: u8 = caps[2]
                .parse()
                .map_err(|_| parse_error(name, "bad prefixlen"))?;
            let mut addr =
                IfAddress::new(ip, prefix_len).map_err(|e| parse_error(name, e.to_string()))?;
            if let Some(vhid) = caps.get(3) {
                let vhid = vhid
                    .as_str()
                    .parse()
                    .map_err(|_| parse_error(name, "bad vhid"))?;
                addr = addr.with_vhid(vhid);
            }
            iface.addresses.insert(addr);
        } else if let Some(caps) = CARP_RE.captures(line) {
            iface.carp.push(CarpEntry {
                vhid: caps[1].parse().map_err(|_| parse_error(name, "bad vhid"))?,
                advskew: caps[2]
                    .parse()
                    .map_err(|_| parse_error(name, "bad advskew"))?,
            });
        } else if let Some(caps) = ND6_RE.captures(line) {
            iface.nd6_flags = parse_nd6_flags(&caps[1]);
        } else if let Some(caps) = LAGG_PROTO_RE.captures(line) {
            iface.lagg_protocol = caps[1].parse::<LaggProtocol>().ok();
        } else if let Some(caps) = LAGG_PORT_RE.captures(line) {
            iface.lagg_ports.push(caps[1].to_string());
        } else if let Some(caps) = VLAN_RE.captures(line) {
            if &caps[3] != "<none>" {
                iface.vlan = Some(VlanState {
                    tag: caps[1].parse().map_err(|_| parse_error(name, "bad vlan tag"))?,
                    pcp: caps[2].parse().map_err(|_| parse_error(name, "bad vlanpcp"))?,
                    parent: caps[3].to_string(),
                });
            }
        }
    }
    Ok(iface)
}

fn parse_nd6_flags(flags: &str) -> HashSet<Nd6Flag> {
    flags
        .split(',')
        .filter_map(|f| match f {
            "IFDISABLED" => Some(Nd6Flag::IfDisabled),
            "AUTO_LINKLOCAL" => Some(Nd6Flag::AutoLinkLocal),
            "ACCEPT_RTADV" => Some(Nd6Flag::AcceptRtAdv),
            _ => None,
        })
        .collect()
}

/// Parses `route -n get` output into the installed default route.
///
/// Returns `None` when no gateway line is present, which is how the
/// tool reports host and interface routes.
pub fn parse_route_get(output: &str) -> Option<RouteEntry> {
    let gateway: IpAddr = ROUTE_GATEWAY_RE
        .captures(output)?
        .get(1)?
        .as_str()
        .split('%')
        .next()?
        .parse()
        .ok()?;
    Some(RouteEntry::default_route(gateway))
}
