//! Address reconciliation: desired-set construction and the
//! remove/add plan.
//!
//! The desired set is rebuilt from scratch on every pass from the
//! declared records plus the current DHCP lease; it is never stored.
//! Comparing it against the live set by set difference is what makes
//! the pass idempotent.

use std::collections::HashSet;

use netsync_common::SyncResult;
use netsync_types::{AddressFamily, IfAddress};

use crate::adapter::{DhclientStatus, LiveInterface, OsAdapter};
use crate::dhclient;
use crate::types::{DeclaredAlias, DeclaredInterface};

/// Desired address state for one interface, derived fresh each pass.
#[derive(Debug, Default)]
pub struct DesiredAddresses {
    pub addresses: HashSet<IfAddress>,
    /// Failover group parameters when the interface carries a shared
    /// address.
    pub carp: Option<(u16, Option<String>)>,
    /// True when the interface is expected to speak IPv6, either
    /// statically or by autoconfiguration.
    pub has_ipv6: bool,
}

/// Builds the desired address set for a declared interface.
///
/// When DHCP is enabled and a client is already running, the leased
/// address is used; the declared static IPv4 only applies otherwise.
/// This keeps a healthy lease in place across passes instead of
/// flapping the address.
pub fn build_desired(
    decl: &DeclaredInterface,
    aliases: &[DeclaredAlias],
    dhcp_status: DhclientStatus,
    leases: Option<&str>,
) -> DesiredAddresses {
    let mut desired = DesiredAddresses::default();

    if decl.dhcp && dhcp_status.running {
        match leases.and_then(dhclient::parse_lease_address) {
            Some(addr) => {
                desired.addresses.insert(addr);
            }
            None => {
                tracing::info!(interface = %decl.name, "Unable to get address from dhclient");
            }
        }
    } else if let Some(ipv4) = decl.ipv4 {
        desired.addresses.insert(ipv4);
    }

    if let Some(failover) = &decl.failover {
        let family = AddressFamily::of(&failover.address);
        if let Ok(vip) = IfAddress::new(failover.address, family.max_prefix_len()) {
            desired.addresses.insert(vip.with_vhid(failover.vhid));
        }
        desired.carp = Some((failover.vhid, failover.passphrase.clone()));
    }

    if let Some(ipv6) = decl.ipv6 {
        if !decl.ipv6_auto {
            desired.addresses.insert(ipv6);
            desired.has_ipv6 = true;
        }
    }
    if decl.ipv6_auto {
        desired.has_ipv6 = true;
    }

    for alias in aliases {
        if let Some(ipv4) = alias.ipv4 {
            desired.addresses.insert(ipv4);
        }
        if let Some(ipv6) = alias.ipv6 {
            desired.addresses.insert(ipv6);
            desired.has_ipv6 = true;
        }
        if let Some(failover_address) = alias.failover_address {
            if let Some(failover) = &decl.failover {
                let family = AddressFamily::of(&failover_address);
                if let Ok(vip) = IfAddress::new(failover_address, family.max_prefix_len()) {
                    desired.addresses.insert(vip.with_vhid(failover.vhid));
                }
            } else {
                tracing::warn!(
                    interface = %decl.name,
                    address = %failover_address,
                    "Alias failover address without a failover group, skipping"
                );
            }
        }
    }

    desired
}

/// The ordered mutation plan for one interface's addresses.
///
/// Removals always execute before additions so a changed netmask or
/// vhid on the same IP is torn down before being re-added.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddressPlan {
    pub remove: Vec<IfAddress>,
    pub add: Vec<IfAddress>,
}

impl AddressPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Diffs live against desired addresses.
///
/// IPv6 link-local addresses are exempt from removal while the
/// interface is expected to keep IPv6 running; they belong to the
/// neighbor-discovery subsystem, not to this engine.
pub fn plan(
    live: &LiveInterface,
    desired: &HashSet<IfAddress>,
    keep_link_local: bool,
) -> AddressPlan {
    let mut remove: Vec<_> = live
        .addresses
        .difference(desired)
        .filter(|a| !(keep_link_local && a.is_link_local()))
        .copied()
        .collect();
    let mut add: Vec<_> = desired.difference(&live.addresses).copied().collect();
    // Deterministic order for logs and tests.
    remove.sort_by_key(|a| a.to_string());
    add.sort_by_key(|a| a.to_string());
    AddressPlan { remove, add }
}

pub async fn apply_removals<A>(os: &A, name: &str, plan: &AddressPlan) -> SyncResult<()>
where
    A: OsAdapter + ?Sized,
{
    for addr in &plan.remove {
        tracing::debug!(interface = %name, address = %addr, "Removing address");
        os.remove_address(name, addr).await?;
    }
    Ok(())
}

pub async fn apply_additions<A>(os: &A, name: &str, plan: &AddressPlan) -> SyncResult<()>
where
    A: OsAdapter + ?Sized,
{
    for addr in &plan.add {
        tracing::debug!(interface = %name, address = %addr, "Adding address");
        os.add_address(name, addr).await?;
    }
    Ok(())
}
