//! Declared configuration records.
//!
//! These are the plain, already-validated records the engine reads
//! from the configuration store on every pass. The engine never
//! mutates or persists them; all mutable state lives in the OS
//! network stack.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use netsync_types::IfAddress;

/// Aggregation protocol for a lagg interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaggProtocol {
    Failover,
    Lacp,
    Loadbalance,
    Roundrobin,
    None,
}

impl LaggProtocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LaggProtocol::Failover => "failover",
            LaggProtocol::Lacp => "lacp",
            LaggProtocol::Loadbalance => "loadbalance",
            LaggProtocol::Roundrobin => "roundrobin",
            LaggProtocol::None => "none",
        }
    }
}

impl FromStr for LaggProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "failover" => LaggProtocol::Failover,
            "lacp" => LaggProtocol::Lacp,
            "loadbalance" => LaggProtocol::Loadbalance,
            "roundrobin" => LaggProtocol::Roundrobin,
            "none" => LaggProtocol::None,
            other => return Err(format!("unknown lagg protocol: {other}")),
        })
    }
}

impl fmt::Display for LaggProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Redundancy role of this node in a failover pair.
///
/// Selects the deterministic CARP advertisement skew when none is
/// configured yet: the primary advertises more aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Primary,
    Secondary,
}

impl NodeRole {
    /// Default CARP advskew for this role.
    pub const fn default_advskew(&self) -> u8 {
        match self {
            NodeRole::Primary => 20,
            NodeRole::Secondary => 80,
        }
    }
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "primary" => NodeRole::Primary,
            "secondary" => NodeRole::Secondary,
            other => return Err(format!("unknown node role: {other}")),
        })
    }
}

/// Shared-address failover (CARP) parameters on an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// The shared address that migrates between redundant hosts.
    pub address: IpAddr,
    /// Failover group id.
    pub vhid: u16,
    /// Shared passphrase protecting the group.
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// A declared physical or virtual interface. Identity = `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredInterface {
    pub name: String,
    /// Static IPv4 address with prefix length.
    #[serde(default)]
    pub ipv4: Option<IfAddress>,
    /// Static IPv6 address with prefix length.
    #[serde(default)]
    pub ipv6: Option<IfAddress>,
    /// Obtain the IPv4 address from DHCP.
    #[serde(default)]
    pub dhcp: bool,
    /// Use IPv6 stateless autoconfiguration.
    #[serde(default)]
    pub ipv6_auto: bool,
    #[serde(default)]
    pub failover: Option<FailoverConfig>,
    /// Free-form extra interface configuration, applied verbatim.
    #[serde(default)]
    pub options: Option<String>,
}

/// A secondary address bound to a declared interface.
/// Identity = (interface, addresses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredAlias {
    pub interface: String,
    #[serde(default)]
    pub ipv4: Option<IfAddress>,
    #[serde(default)]
    pub ipv6: Option<IfAddress>,
    /// Additional shared failover address; joins the interface's
    /// failover group.
    #[serde(default)]
    pub failover_address: Option<IpAddr>,
}

/// A declared link aggregation interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredLagg {
    pub name: String,
    pub protocol: LaggProtocol,
    /// Ordered member physical interface names.
    pub members: Vec<String>,
}

/// A declared VLAN interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredVlan {
    pub name: String,
    /// Physical parent interface carrying the tagged traffic.
    pub parent: String,
    pub tag: u16,
    /// 802.1p priority code point.
    #[serde(default)]
    pub pcp: u8,
}

/// Global default-gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub ipv4: Option<IpAddr>,
    #[serde(default)]
    pub ipv6: Option<IpAddr>,
}
