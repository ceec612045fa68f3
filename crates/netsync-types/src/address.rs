//! Interface address value type with netmask/broadcast derivation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of an interface address.
///
/// Link-layer addresses are never represented here; the adapter
/// filters them out when reading live interface state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Inet,
    Inet6,
}

impl AddressFamily {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Inet => "inet",
            AddressFamily::Inet6 => "inet6",
        }
    }

    /// Maximum prefix length for this family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            AddressFamily::Inet => 32,
            AddressFamily::Inet6 => 128,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An address assigned (or to be assigned) to a network interface.
///
/// Two instances are equal iff every field matches; this drives the
/// set-difference between desired and live address sets, so the type
/// derives full structural `Eq` and `Hash`. Serialized as its string
/// form (`ip/prefix`, optionally `ip/prefix vhid N`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IfAddress {
    family: AddressFamily,
    ip: IpAddr,
    netmask: IpAddr,
    /// IPv4 directed broadcast address; never set for IPv6.
    broadcast: Option<Ipv4Addr>,
    /// CARP failover group this address belongs to, if any.
    vhid: Option<u16>,
}

impl IfAddress {
    /// Builds an address from an IP and prefix length, deriving the
    /// netmask and (for IPv4) the broadcast address.
    pub fn new(ip: IpAddr, prefix_len: u8) -> Result<Self, ParseError> {
        let family = AddressFamily::of(&ip);
        if prefix_len > family.max_prefix_len() {
            return Err(ParseError::InvalidPrefixLength {
                len: prefix_len,
                max: family.max_prefix_len(),
            });
        }
        let (netmask, broadcast) = match ip {
            IpAddr::V4(v4) => {
                let mask = v4_mask(prefix_len);
                let bcast = Ipv4Addr::from(u32::from(v4) | !u32::from(mask));
                (IpAddr::V4(mask), Some(bcast))
            }
            IpAddr::V6(_) => (IpAddr::V6(v6_mask(prefix_len)), None),
        };
        Ok(Self {
            family,
            ip,
            netmask,
            broadcast,
            vhid: None,
        })
    }

    /// Builds an address from an IP and an explicit netmask, as found
    /// in DHCP lease files (`option subnet-mask 255.255.255.0`).
    pub fn with_netmask(ip: IpAddr, netmask: IpAddr) -> Result<Self, ParseError> {
        let prefix_len = match (ip, netmask) {
            (IpAddr::V4(_), IpAddr::V4(mask)) => {
                let bits = u32::from(mask);
                // A valid mask is a contiguous run of leading ones.
                if bits.leading_ones() + bits.trailing_zeros() != 32 {
                    return Err(ParseError::InvalidNetmask(mask.to_string()));
                }
                bits.leading_ones() as u8
            }
            (IpAddr::V6(_), IpAddr::V6(mask)) => {
                let bits = u128::from(mask);
                if bits.leading_ones() + bits.trailing_zeros() != 128 {
                    return Err(ParseError::InvalidNetmask(mask.to_string()));
                }
                bits.leading_ones() as u8
            }
            _ => {
                return Err(ParseError::FamilyMismatch(format!(
                    "address {ip} with netmask {netmask}"
                )))
            }
        };
        Self::new(ip, prefix_len)
    }

    /// Attaches a CARP failover group id.
    pub fn with_vhid(mut self, vhid: u16) -> Self {
        self.vhid = Some(vhid);
        self
    }

    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    pub const fn netmask(&self) -> IpAddr {
        self.netmask
    }

    pub const fn broadcast(&self) -> Option<Ipv4Addr> {
        self.broadcast
    }

    pub const fn vhid(&self) -> Option<u16> {
        self.vhid
    }

    pub const fn is_ipv4(&self) -> bool {
        matches!(self.family, AddressFamily::Inet)
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self.family, AddressFamily::Inet6)
    }

    /// Prefix length recovered from the netmask.
    pub fn prefix_len(&self) -> u8 {
        match self.netmask {
            IpAddr::V4(mask) => u32::from(mask).leading_ones() as u8,
            IpAddr::V6(mask) => u128::from(mask).leading_ones() as u8,
        }
    }

    /// Returns true for IPv6 link-local addresses (fe80::/10).
    ///
    /// These are owned by the neighbor-discovery subsystem and must
    /// not be removed while IPv6 autoconfiguration is enabled.
    pub fn is_link_local(&self) -> bool {
        match self.ip {
            IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
            IpAddr::V4(_) => false,
        }
    }

    /// Returns true when the given IP falls inside this address's
    /// network.
    pub fn contains(&self, other: &IpAddr) -> bool {
        match (self.ip, self.netmask, other) {
            (IpAddr::V4(ip), IpAddr::V4(mask), IpAddr::V4(o)) => {
                u32::from(ip) & u32::from(mask) == u32::from(*o) & u32::from(mask)
            }
            (IpAddr::V6(ip), IpAddr::V6(mask), IpAddr::V6(o)) => {
                u128::from(ip) & u128::from(mask) == u128::from(*o) & u128::from(mask)
            }
            _ => false,
        }
    }
}

impl fmt::Display for IfAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len())?;
        if let Some(vhid) = self.vhid {
            write!(f, " vhid {vhid}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for IfAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IfAddress> for String {
    fn from(addr: IfAddress) -> Self {
        addr.to_string()
    }
}

impl FromStr for IfAddress {
    type Err = ParseError;

    /// Parses `address/prefix` notation, with an optional `vhid N`
    /// suffix; a bare address gets the host prefix (/32 or /128).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (s, vhid) = match s.split_once(" vhid ") {
            Some((addr, vhid)) => {
                let vhid: u16 = vhid
                    .trim()
                    .parse()
                    .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))?;
                (addr, Some(vhid))
            }
            None => (s, None),
        };
        let parsed = match s.rsplit_once('/') {
            Some((addr, len)) => {
                let ip: IpAddr = addr
                    .parse()
                    .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))?;
                let prefix_len: u8 = len
                    .parse()
                    .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))?;
                Self::new(ip, prefix_len)
            }
            None => {
                let ip: IpAddr = s
                    .parse()
                    .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))?;
                Self::new(ip, AddressFamily::of(&ip).max_prefix_len())
            }
        }?;
        Ok(match vhid {
            Some(vhid) => parsed.with_vhid(vhid),
            None => parsed,
        })
    }
}

fn v4_mask(prefix_len: u8) -> Ipv4Addr {
    if prefix_len == 0 {
        Ipv4Addr::UNSPECIFIED
    } else {
        Ipv4Addr::from(u32::MAX << (32 - u32::from(prefix_len)))
    }
}

fn v6_mask(prefix_len: u8) -> Ipv6Addr {
    if prefix_len == 0 {
        Ipv6Addr::UNSPECIFIED
    } else {
        Ipv6Addr::from(u128::MAX << (128 - u32::from(prefix_len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_v4_netmask_and_broadcast() {
        let addr = IfAddress::new("192.168.1.10".parse().unwrap(), 24).unwrap();
        assert_eq!(addr.netmask(), "255.255.255.0".parse::<IpAddr>().unwrap());
        assert_eq!(addr.broadcast(), Some("192.168.1.255".parse().unwrap()));
        assert_eq!(addr.prefix_len(), 24);
        assert!(addr.is_ipv4());
    }

    #[test]
    fn test_v4_host_address() {
        let addr = IfAddress::new("10.0.0.1".parse().unwrap(), 32).unwrap();
        assert_eq!(addr.netmask(), "255.255.255.255".parse::<IpAddr>().unwrap());
        assert_eq!(addr.broadcast(), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_v6_netmask() {
        let addr = IfAddress::new("2001:db8::1".parse().unwrap(), 64).unwrap();
        assert_eq!(addr.prefix_len(), 64);
        assert_eq!(addr.broadcast(), None);
        assert!(addr.is_ipv6());
    }

    #[test]
    fn test_prefix_len_out_of_range() {
        assert!(IfAddress::new("10.0.0.1".parse().unwrap(), 33).is_err());
        assert!(IfAddress::new("2001:db8::1".parse().unwrap(), 129).is_err());
    }

    #[test]
    fn test_with_netmask() {
        let addr = IfAddress::with_netmask(
            "192.168.1.10".parse().unwrap(),
            "255.255.255.0".parse().unwrap(),
        )
        .unwrap();
        assert_eq!(addr.prefix_len(), 24);
        assert_eq!(addr.broadcast(), Some("192.168.1.255".parse().unwrap()));
    }

    #[test]
    fn test_with_netmask_rejects_non_contiguous() {
        let res = IfAddress::with_netmask(
            "192.168.1.10".parse().unwrap(),
            "255.0.255.0".parse().unwrap(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_with_netmask_rejects_family_mismatch() {
        let res = IfAddress::with_netmask(
            "192.168.1.10".parse().unwrap(),
            "ffff::".parse().unwrap(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_equality_includes_vhid() {
        let plain = IfAddress::new("10.0.0.5".parse().unwrap(), 32).unwrap();
        let carp = IfAddress::new("10.0.0.5".parse().unwrap(), 32)
            .unwrap()
            .with_vhid(30);
        assert_ne!(plain, carp);
        assert_eq!(carp.vhid(), Some(30));
    }

    #[test]
    fn test_set_difference_semantics() {
        use std::collections::HashSet;

        let a = IfAddress::new("10.0.0.1".parse().unwrap(), 24).unwrap();
        let b = IfAddress::new("10.0.0.2".parse().unwrap(), 24).unwrap();
        let c = IfAddress::new("10.0.0.3".parse().unwrap(), 24).unwrap();

        let live: HashSet<_> = [a, b].into_iter().collect();
        let desired: HashSet<_> = [b, c].into_iter().collect();

        let remove: HashSet<_> = live.difference(&desired).copied().collect();
        let add: HashSet<_> = desired.difference(&live).copied().collect();
        assert_eq!(remove, [a].into_iter().collect());
        assert_eq!(add, [c].into_iter().collect());
    }

    #[test]
    fn test_link_local_detection() {
        let ll = IfAddress::new("fe80::1".parse().unwrap(), 64).unwrap();
        assert!(ll.is_link_local());

        let global = IfAddress::new("2001:db8::1".parse().unwrap(), 64).unwrap();
        assert!(!global.is_link_local());

        let v4 = IfAddress::new("169.254.0.1".parse().unwrap(), 16).unwrap();
        assert!(!v4.is_link_local());
    }

    #[test]
    fn test_contains() {
        let addr = IfAddress::new("192.168.1.10".parse().unwrap(), 24).unwrap();
        assert!(addr.contains(&"192.168.1.1".parse().unwrap()));
        assert!(!addr.contains(&"192.168.2.1".parse().unwrap()));
        assert!(!addr.contains(&"2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_parse_and_display() {
        let addr: IfAddress = "192.168.1.10/24".parse().unwrap();
        assert_eq!(addr.to_string(), "192.168.1.10/24");

        let bare: IfAddress = "10.0.0.1".parse().unwrap();
        assert_eq!(bare.prefix_len(), 32);

        assert!("not-an-ip/24".parse::<IfAddress>().is_err());
    }

    #[test]
    fn test_parse_vhid_round_trip() {
        let carp: IfAddress = "10.0.0.5/32 vhid 30".parse().unwrap();
        assert_eq!(carp.vhid(), Some(30));
        assert_eq!(carp.to_string(), "10.0.0.5/32 vhid 30");
        assert_eq!(carp.to_string().parse::<IfAddress>().unwrap(), carp);
    }
}
