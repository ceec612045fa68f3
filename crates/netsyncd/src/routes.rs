//! Default-route reconciliation.
//!
//! One pass per address family: compare the declared default gateway
//! against the installed route and issue the single add, change, or
//! delete that converges them. When no IPv4 gateway is declared but a
//! DHCP interface holds a lease, the lease's routers option supplies
//! the gateway.

use std::net::IpAddr;

use netsync_common::SyncResult;
use netsync_types::{AddressFamily, RouteEntry};

use crate::adapter::OsAdapter;
use crate::commands::ADDRESS_SCAN_IGNORE_PREFIXES;
use crate::config::ConfigStore;
use crate::dhclient;

/// Reconciles the default routes for both families.
///
/// A family that fails is logged and does not block the other.
pub async fn sync_routes<C, A>(config: &C, os: &A) -> SyncResult<()>
where
    C: ConfigStore + ?Sized,
    A: OsAdapter + ?Sized,
{
    let gateway = config.gateway().await?;

    let ipv4 = match gateway.ipv4 {
        Some(gw) => Some(gw),
        None => learn_dhcp_gateway(config, os).await?,
    };
    if let Err(e) = reconcile_family(os, AddressFamily::Inet, ipv4).await {
        tracing::error!(error = %e, "Failed to reconcile IPv4 default route");
    }
    if let Err(e) = reconcile_family(os, AddressFamily::Inet6, gateway.ipv6).await {
        tracing::error!(error = %e, "Failed to reconcile IPv6 default route");
    }
    Ok(())
}

async fn reconcile_family<A>(
    os: &A,
    family: AddressFamily,
    declared: Option<IpAddr>,
) -> SyncResult<()>
where
    A: OsAdapter + ?Sized,
{
    let live = os.default_route(family).await?;
    match (declared, live) {
        (None, None) => Ok(()),
        (Some(gw), None) => {
            let route = RouteEntry::default_route(gw);
            tracing::info!(family = %family, route = %route, "Adding default route");
            os.add_route(&route).await
        }
        (Some(gw), Some(live)) => {
            let route = RouteEntry::default_route(gw);
            if live == route {
                return Ok(());
            }
            tracing::info!(
                family = %family,
                old = %live,
                new = %route,
                "Changing default route"
            );
            os.change_route(&route).await
        }
        (None, Some(live)) => {
            tracing::info!(family = %family, route = %live, "Deleting default route");
            os.delete_route(&live).await
        }
    }
}

/// Learns an IPv4 gateway from the first DHCP interface with a
/// running client and a routers option in its lease.
async fn learn_dhcp_gateway<C, A>(config: &C, os: &A) -> SyncResult<Option<IpAddr>>
where
    C: ConfigStore + ?Sized,
    A: OsAdapter + ?Sized,
{
    for decl in config.interfaces().await? {
        if !decl.dhcp {
            continue;
        }
        if !os.dhclient_status(&decl.name).await?.running {
            continue;
        }
        if let Some(leases) = os.dhclient_leases(&decl.name).await? {
            if let Some(gw) = dhclient::parse_lease_routers(&leases) {
                tracing::debug!(interface = %decl.name, gateway = %gw, "Using DHCP-supplied gateway");
                return Ok(Some(gw));
            }
        }
    }
    Ok(None)
}

/// Returns true when some live interface holds an IPv4 address whose
/// network contains `gateway`, i.e. the gateway is directly
/// reachable.
pub async fn ipv4_gateway_reachable<A>(os: &A, gateway: &IpAddr) -> SyncResult<bool>
where
    A: OsAdapter + ?Sized,
{
    for iface in os.list_interfaces().await? {
        if ADDRESS_SCAN_IGNORE_PREFIXES
            .iter()
            .any(|p| iface.name.starts_with(p))
        {
            continue;
        }
        if iface
            .addresses
            .iter()
            .any(|a| a.is_ipv4() && a.contains(gateway))
        {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{DhclientStatus, LiveInterface};
    use crate::config::StaticConfig;
    use crate::mock::{MockOp, MockOs};
    use pretty_assertions::assert_eq;

    fn config(yaml: &str) -> StaticConfig {
        StaticConfig::from_yaml(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_add_change_delete_and_noop() {
        let os = MockOs::new();
        let cfg = config("gateway:\n  ipv4: 10.0.0.1\n");

        // Absent: add.
        sync_routes(&cfg, &os).await.unwrap();
        let route = RouteEntry::default_route("10.0.0.1".parse().unwrap());
        assert_eq!(os.take_ops(), vec![MockOp::AddRoute(route)]);

        // Matching: noop.
        sync_routes(&cfg, &os).await.unwrap();
        assert_eq!(os.take_ops(), vec![]);

        // Different: change.
        let cfg2 = config("gateway:\n  ipv4: 10.0.0.2\n");
        sync_routes(&cfg2, &os).await.unwrap();
        let route2 = RouteEntry::default_route("10.0.0.2".parse().unwrap());
        assert_eq!(os.take_ops(), vec![MockOp::ChangeRoute(route2)]);

        // Undeclared: delete.
        let empty = config("{}");
        sync_routes(&empty, &os).await.unwrap();
        assert_eq!(os.take_ops(), vec![MockOp::DeleteRoute(route2)]);
        assert_eq!(os.route(AddressFamily::Inet), None);
    }

    #[tokio::test]
    async fn test_both_families() {
        let os = MockOs::new();
        let cfg = config("gateway:\n  ipv4: 10.0.0.1\n  ipv6: 'fe80::1'\n");
        sync_routes(&cfg, &os).await.unwrap();
        assert!(os.route(AddressFamily::Inet).is_some());
        assert!(os.route(AddressFamily::Inet6).is_some());
    }

    #[tokio::test]
    async fn test_dhcp_gateway_fallback() {
        let os = MockOs::new();
        os.add_interface(LiveInterface::bare("em0"));
        os.set_dhclient(
            "em0",
            DhclientStatus {
                running: true,
                pid: Some(100),
            },
            Some("option routers 192.168.1.1 192.168.1.2;\n"),
        );
        let cfg = config("interfaces:\n  - name: em0\n    dhcp: true\n");

        sync_routes(&cfg, &os).await.unwrap();
        let route = RouteEntry::default_route("192.168.1.1".parse().unwrap());
        assert_eq!(os.route(AddressFamily::Inet), Some(route));
    }

    #[tokio::test]
    async fn test_dhcp_gateway_requires_running_client() {
        let os = MockOs::new();
        os.add_interface(LiveInterface::bare("em0"));
        os.set_dhclient(
            "em0",
            DhclientStatus::stopped(),
            Some("option routers 192.168.1.1;\n"),
        );
        let cfg = config("interfaces:\n  - name: em0\n    dhcp: true\n");

        sync_routes(&cfg, &os).await.unwrap();
        assert_eq!(os.route(AddressFamily::Inet), None);
    }

    #[tokio::test]
    async fn test_declared_gateway_beats_dhcp() {
        let os = MockOs::new();
        os.add_interface(LiveInterface::bare("em0"));
        os.set_dhclient(
            "em0",
            DhclientStatus {
                running: true,
                pid: Some(100),
            },
            Some("option routers 192.168.1.1;\n"),
        );
        let cfg = config(
            "interfaces:\n  - name: em0\n    dhcp: true\ngateway:\n  ipv4: 10.0.0.1\n",
        );

        sync_routes(&cfg, &os).await.unwrap();
        let route = RouteEntry::default_route("10.0.0.1".parse().unwrap());
        assert_eq!(os.route(AddressFamily::Inet), Some(route));
    }

    #[tokio::test]
    async fn test_ipv4_gateway_reachable() {
        let os = MockOs::new();
        let mut iface = LiveInterface::bare("em0");
        iface.addresses.insert("192.168.1.10/24".parse().unwrap());
        os.add_interface(iface);

        assert!(ipv4_gateway_reachable(&os, &"192.168.1.1".parse().unwrap())
            .await
            .unwrap());
        assert!(!ipv4_gateway_reachable(&os, &"10.0.0.1".parse().unwrap())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_ipv4_gateway_reachable_ignores_loopback() {
        let os = MockOs::new();
        let mut lo0 = LiveInterface::bare("lo0");
        lo0.addresses.insert("127.0.0.1/8".parse().unwrap());
        os.add_interface(lo0);

        assert!(!ipv4_gateway_reachable(&os, &"127.0.0.2".parse().unwrap())
            .await
            .unwrap());
    }
}
