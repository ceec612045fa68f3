//! Interface sync orchestration.
//!
//! A pass converges the whole network stack: provision virtual
//! interfaces, reconcile each declared interface, then clean up
//! undeclared leftovers. Every step re-reads live state and only
//! issues the mutations needed to converge, so a pass over an
//! already-converged system performs no writes and a crashed pass can
//! simply be rerun.

use std::collections::HashSet;
use std::net::IpAddr;

use netsync_common::{SyncError, SyncResult};

use crate::addresses;
use crate::adapter::{LiveInterface, Nd6Flag, OsAdapter};
use crate::carp;
use crate::commands::{CLONED_PREFIXES, INTERNAL_PREFIXES};
use crate::config::ConfigStore;
use crate::types::{DeclaredInterface, NodeRole};
use crate::vif::{self, ProvisionResult};

pub struct SyncEngine<C, A> {
    config: C,
    os: A,
    role: NodeRole,
}

impl<C, A> SyncEngine<C, A>
where
    C: ConfigStore,
    A: OsAdapter,
{
    pub fn new(config: C, os: A, role: NodeRole) -> Self {
        Self { config, os, role }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn os(&self) -> &A {
        &self.os
    }

    /// Runs one full convergence pass over all interfaces.
    ///
    /// A failing interface is logged and skipped; the remaining
    /// interfaces and the cleanup phase still run.
    pub async fn sync(&self) -> SyncResult<()> {
        let provisioned = vif::provision(&self.config, &self.os).await?;

        let declared = self.config.interfaces().await?;
        let names: Vec<_> = declared.iter().map(|d| d.name.clone()).collect();
        tracing::info!(interfaces = ?names, "Syncing declared interfaces");

        for decl in &declared {
            match self.sync_one(decl).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        interface = %decl.name,
                        "Declared interface not present on the system, skipping"
                    );
                }
                Err(e) => {
                    tracing::error!(interface = %decl.name, error = %e, "Failed to sync interface");
                }
            }
        }

        self.cleanup(&declared, &provisioned).await?;
        Ok(())
    }

    /// Converges a single interface by name.
    pub async fn sync_interface(&self, name: &str) -> SyncResult<()> {
        let declared = self.config.interfaces().await?;
        match declared.iter().find(|d| d.name == name) {
            Some(decl) => self.sync_one(decl).await,
            None => Err(SyncError::not_found(name)),
        }
    }

    async fn sync_one(&self, decl: &DeclaredInterface) -> SyncResult<()> {
        let name = decl.name.as_str();
        let aliases = self.config.aliases(name).await?;
        let live = self.os.get_interface(name).await?;
        let dhcp_status = self.os.dhclient_status(name).await?;
        let leases = if decl.dhcp && dhcp_status.running {
            self.os.dhclient_leases(name).await?
        } else {
            None
        };

        let desired = addresses::build_desired(decl, &aliases, dhcp_status, leases.as_deref());

        // Router solicitation must be (re)started only when the
        // accept_rtadv flag is about to be turned on, not on every
        // pass.
        let needs_rtsold = decl.ipv6_auto && !live.nd6_flags.contains(&Nd6Flag::AcceptRtAdv);

        let mut nd6_target = live.nd6_flags.clone();
        if desired.has_ipv6 {
            nd6_target.remove(&Nd6Flag::IfDisabled);
            nd6_target.insert(Nd6Flag::AutoLinkLocal);
        } else {
            nd6_target.insert(Nd6Flag::IfDisabled);
            nd6_target.remove(&Nd6Flag::AutoLinkLocal);
        }
        if decl.ipv6_auto {
            nd6_target.insert(Nd6Flag::AcceptRtAdv);
        } else {
            nd6_target.remove(&Nd6Flag::AcceptRtAdv);
        }
        if nd6_target != live.nd6_flags {
            self.os.set_nd6_flags(name, &nd6_target).await?;
        }

        let plan = addresses::plan(&live, &desired.addresses, desired.has_ipv6);
        if !plan.is_empty() {
            tracing::info!(
                interface = %name,
                remove = plan.remove.len(),
                add = plan.add.len(),
                "Reconciling addresses"
            );
        }

        // Stale addresses leave first so the failover group is
        // configured on a clean interface before its shared
        // addresses arrive.
        addresses::apply_removals(&self.os, name, &plan).await?;

        if let Some((vhid, passphrase)) = desired.carp.clone() {
            let advskew = carp::resolve_advskew(&live.carp, vhid, self.role);
            carp::configure(&self.os, name, &live.carp, vhid, advskew, passphrase).await?;
        }

        addresses::apply_additions(&self.os, name, &plan).await?;

        if let Some(options) = &decl.options {
            let stderr = self.os.apply_options(name, options).await?;
            if !stderr.is_empty() {
                tracing::warn!(interface = %name, stderr = %stderr, "Interface options reported errors");
            }
            // Options strings historically carried the mtu setting;
            // when one stops doing so the interface keeps the old
            // value forever unless reverted here.
            if !options.contains("mtu") && live.mtu != 1500 {
                tracing::info!(interface = %name, "Reverting mtu to 1500");
                self.os.set_mtu(name, 1500).await?;
            }
        }

        if !live.up {
            self.os.up(name).await?;
        }

        if decl.dhcp && !dhcp_status.running {
            tracing::info!(interface = %name, "Starting dhclient");
            if let Err(e) = self.os.dhclient_start(name).await {
                // The lease will be picked up on a later pass; a
                // launch failure must not abort this one.
                tracing::error!(interface = %name, error = %e, "Failed to start dhclient");
            }
        } else if !decl.dhcp && dhcp_status.running {
            if let Some(pid) = dhcp_status.pid {
                tracing::info!(interface = %name, pid = pid, "Stopping dhclient");
                self.os.dhclient_stop(name, pid).await?;
            }
        }

        if needs_rtsold {
            self.os.start_rtsold().await?;
        }

        Ok(())
    }

    /// Strips configuration from live interfaces with no declared
    /// counterpart.
    async fn cleanup(
        &self,
        declared: &[DeclaredInterface],
        provisioned: &ProvisionResult,
    ) -> SyncResult<()> {
        let declared_names: HashSet<_> = declared.iter().map(|d| d.name.as_str()).collect();

        for live in self.os.list_interfaces().await? {
            let name = live.name.as_str();
            if INTERNAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
                continue;
            }
            if declared_names.contains(name) {
                continue;
            }
            if let Err(e) = self.cleanup_one(&live, provisioned).await {
                tracing::error!(interface = %name, error = %e, "Failed to clean up interface");
            }
        }
        Ok(())
    }

    async fn cleanup_one(
        &self,
        live: &LiveInterface,
        provisioned: &ProvisionResult,
    ) -> SyncResult<()> {
        let name = live.name.as_str();

        let plan = addresses::plan(live, &HashSet::new(), false);
        if !plan.is_empty() {
            tracing::info!(interface = %name, "Removing addresses from undeclared interface");
            addresses::apply_removals(&self.os, name, &plan).await?;
        }

        let dhcp_status = self.os.dhclient_status(name).await?;
        if dhcp_status.running {
            if let Some(pid) = dhcp_status.pid {
                tracing::info!(interface = %name, pid = pid, "Stopping dhclient on undeclared interface");
                self.os.dhclient_stop(name, pid).await?;
            }
        }

        let is_clone = CLONED_PREFIXES.iter().any(|p| name.starts_with(p));
        if is_clone && !provisioned.cloned.contains(name) {
            tracing::info!(interface = %name, "Destroying undeclared virtual interface");
            self.os.destroy_interface(name).await?;
        } else if !provisioned.parents.contains(name) && live.up {
            // Also covers a provisioned clone with no interface
            // record: it stays (another pass may attach one) but
            // carries no traffic until declared.
            tracing::info!(interface = %name, "Bringing down undeclared interface");
            self.os.down(name).await?;
        }
        Ok(())
    }

    /// IPv4 addresses currently assigned anywhere on the system,
    /// excluding loopback and host-side virtual pairs.
    pub async fn ipv4_in_use(&self) -> SyncResult<Vec<IpAddr>> {
        let mut addrs = Vec::new();
        for iface in self.os.list_interfaces().await? {
            if crate::commands::ADDRESS_SCAN_IGNORE_PREFIXES
                .iter()
                .any(|p| iface.name.starts_with(p))
            {
                continue;
            }
            addrs.extend(
                iface
                    .addresses
                    .iter()
                    .filter(|a| a.is_ipv4())
                    .map(|a| a.ip()),
            );
        }
        addrs.sort();
        Ok(addrs)
    }
}
