//! Virtual interface provisioning: laggs and vlans.
//!
//! Runs before address reconciliation so that every declared virtual
//! interface exists by the time it is synced. Laggs go first: a vlan
//! may sit on top of a lagg parent. A failing virtual interface is
//! logged and skipped; the rest of the pass continues.

use std::collections::HashSet;

use netsync_common::SyncResult;

use crate::adapter::{OsAdapter, VlanState};
use crate::config::ConfigStore;
use crate::types::{DeclaredLagg, DeclaredVlan};

/// What provisioning touched, consumed by the cleanup phase.
#[derive(Debug, Default)]
pub struct ProvisionResult {
    /// Names of every declared virtual interface (existing or newly
    /// created). Cleanup never destroys these.
    pub cloned: HashSet<String>,
    /// Physical interfaces serving as lagg members or vlan parents.
    /// Cleanup never downs these even when undeclared.
    pub parents: HashSet<String>,
}

/// Creates and configures all declared laggs and vlans.
pub async fn provision<C, A>(config: &C, os: &A) -> SyncResult<ProvisionResult>
where
    C: ConfigStore + ?Sized,
    A: OsAdapter + ?Sized,
{
    let mut result = ProvisionResult::default();

    for lagg in config.laggs().await? {
        result.cloned.insert(lagg.name.clone());
        let members = config.lagg_members(&lagg.name).await?;
        if let Err(e) = provision_lagg(os, &lagg, &members, &mut result.parents).await {
            tracing::error!(lagg = %lagg.name, error = %e, "Failed to provision lagg");
        }
    }

    for vlan in config.vlans().await? {
        result.cloned.insert(vlan.name.clone());
        if let Err(e) = provision_vlan(os, &vlan, &mut result.parents).await {
            tracing::error!(vlan = %vlan.name, error = %e, "Failed to provision vlan");
        }
    }

    Ok(result)
}

async fn ensure_exists<A>(os: &A, name: &str) -> SyncResult<crate::adapter::LiveInterface>
where
    A: OsAdapter + ?Sized,
{
    match os.get_interface(name).await {
        Ok(iface) => Ok(iface),
        Err(e) if e.is_not_found() => {
            tracing::info!(interface = %name, "Creating virtual interface");
            os.create_interface(name).await?;
            os.get_interface(name).await
        }
        Err(e) => Err(e),
    }
}

/// Ups an interface only when it is currently down, keeping converged
/// passes write-free.
async fn up_if_down<A>(os: &A, name: &str) -> SyncResult<()>
where
    A: OsAdapter + ?Sized,
{
    let live = os.get_interface(name).await?;
    if !live.up {
        os.up(name).await?;
    }
    Ok(())
}

async fn provision_lagg<A>(
    os: &A,
    lagg: &DeclaredLagg,
    members: &[String],
    parents: &mut HashSet<String>,
) -> SyncResult<()>
where
    A: OsAdapter + ?Sized,
{
    let live = ensure_exists(os, &lagg.name).await?;

    if live.lagg_protocol != Some(lagg.protocol) {
        tracing::info!(
            lagg = %lagg.name,
            protocol = %lagg.protocol,
            "Setting lagg protocol"
        );
        os.set_lagg_protocol(&lagg.name, lagg.protocol).await?;
    }

    // Drop undeclared members before enrolling new ones so a port
    // moving between laggs is never enslaved twice.
    for port in &live.lagg_ports {
        if !members.contains(port) {
            tracing::info!(lagg = %lagg.name, port = %port, "Removing lagg member");
            os.remove_lagg_port(&lagg.name, port).await?;
        }
    }
    for member in members {
        if live.lagg_ports.iter().any(|p| p == member) {
            parents.insert(member.clone());
            // Enrolled ports still get the up guarantee every pass.
            up_if_down(os, member).await?;
            continue;
        }
        tracing::info!(lagg = %lagg.name, port = %member, "Adding lagg member");
        match os.add_lagg_port(&lagg.name, member).await {
            Ok(()) => {
                parents.insert(member.clone());
                up_if_down(os, member).await?;
            }
            // A missing member interface (unplugged card) must not
            // take down the rest of the lagg.
            Err(e) if e.is_not_found() => {
                tracing::warn!(lagg = %lagg.name, port = %member, "Lagg member does not exist");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn provision_vlan<A>(
    os: &A,
    vlan: &DeclaredVlan,
    parents: &mut HashSet<String>,
) -> SyncResult<()>
where
    A: OsAdapter + ?Sized,
{
    let live = ensure_exists(os, &vlan.name).await?;
    parents.insert(vlan.parent.clone());

    // Tagged traffic only flows while the parent is up.
    match up_if_down(os, &vlan.parent).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::warn!(vlan = %vlan.name, parent = %vlan.parent, "Vlan parent does not exist");
        }
        Err(e) => return Err(e),
    }

    let desired = VlanState {
        parent: vlan.parent.clone(),
        tag: vlan.tag,
        pcp: vlan.pcp,
    };
    if live.vlan.as_ref() == Some(&desired) {
        return Ok(());
    }
    // Tag/parent cannot be changed in place; tear down first.
    if live.vlan.is_some() {
        tracing::info!(vlan = %vlan.name, "Reconfiguring vlan parameters");
        os.unconfigure_vlan(&vlan.name).await?;
    } else {
        tracing::info!(vlan = %vlan.name, parent = %vlan.parent, tag = vlan.tag, "Configuring vlan");
    }
    os.configure_vlan(&vlan.name, &desired).await?;
    Ok(())
}
