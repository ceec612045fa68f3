//! Default-route value type.

use crate::AddressFamily;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// A default route for one address family.
///
/// The destination is implicitly "any" (0.0.0.0/0 or ::/0); the
/// engine only manages default routes. Equality compares family and
/// gateway only — the static/gateway flags describe how a route is
/// installed, not which route it is, so a live route read back from
/// the OS compares equal to the declared one regardless of flag
/// representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteEntry {
    pub family: AddressFamily,
    pub gateway: IpAddr,
    pub is_static: bool,
    pub is_gateway: bool,
}

impl RouteEntry {
    /// Builds a default route via `gateway`, flagged static + gateway
    /// as all routes installed by the engine are.
    pub fn default_route(gateway: IpAddr) -> Self {
        Self {
            family: AddressFamily::of(&gateway),
            gateway,
            is_static: true,
            is_gateway: true,
        }
    }
}

impl PartialEq for RouteEntry {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family && self.gateway == other.gateway
    }
}

impl Eq for RouteEntry {}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "default via {}", self.gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_route_flags() {
        let route = RouteEntry::default_route("10.0.0.1".parse().unwrap());
        assert!(route.is_static);
        assert!(route.is_gateway);
        assert_eq!(route.family, AddressFamily::Inet);
    }

    #[test]
    fn test_family_follows_gateway() {
        let v6 = RouteEntry::default_route("fe80::1".parse().unwrap());
        assert_eq!(v6.family, AddressFamily::Inet6);
    }

    #[test]
    fn test_equality_ignores_flags() {
        let declared = RouteEntry::default_route("10.0.0.1".parse().unwrap());
        let live = RouteEntry {
            is_static: false,
            is_gateway: false,
            ..declared
        };
        assert_eq!(declared, live);

        let other = RouteEntry::default_route("10.0.0.2".parse().unwrap());
        assert_ne!(declared, other);
    }
}
