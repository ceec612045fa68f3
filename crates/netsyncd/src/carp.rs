//! Shared-address failover (CARP) configuration.

use netsync_common::SyncResult;

use crate::adapter::{CarpConfig, CarpEntry, OsAdapter};
use crate::types::NodeRole;

/// Picks the advertisement skew for a failover group.
///
/// A skew already present on the live interface wins: rewriting it
/// would fight the failover daemon, which adjusts skew at runtime to
/// steer mastership. The role default only applies to groups being
/// configured for the first time.
pub fn resolve_advskew(live_carp: &[CarpEntry], vhid: u16, role: NodeRole) -> u8 {
    live_carp
        .iter()
        .find(|e| e.vhid == vhid)
        .map(|e| e.advskew)
        .unwrap_or_else(|| role.default_advskew())
}

/// Applies the group parameters unless the live interface already
/// matches.
pub async fn configure<A>(
    os: &A,
    name: &str,
    live_carp: &[CarpEntry],
    vhid: u16,
    advskew: u8,
    passphrase: Option<String>,
) -> SyncResult<()>
where
    A: OsAdapter + ?Sized,
{
    if live_carp.iter().any(|e| e.vhid == vhid && e.advskew == advskew) {
        return Ok(());
    }
    tracing::info!(
        interface = %name,
        vhid = vhid,
        advskew = advskew,
        "Configuring failover group"
    );
    os.set_carp(
        name,
        &CarpConfig {
            vhid,
            advskew,
            passphrase,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::LiveInterface;
    use crate::mock::{MockOp, MockOs};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_advskew_live_wins() {
        let live = vec![CarpEntry {
            vhid: 30,
            advskew: 45,
        }];
        assert_eq!(resolve_advskew(&live, 30, NodeRole::Primary), 45);
        assert_eq!(resolve_advskew(&live, 31, NodeRole::Primary), 20);
        assert_eq!(resolve_advskew(&[], 30, NodeRole::Secondary), 80);
    }

    #[tokio::test]
    async fn test_configure_skips_matching_group() {
        let os = MockOs::new();
        let mut iface = LiveInterface::bare("em0");
        iface.carp.push(CarpEntry {
            vhid: 30,
            advskew: 20,
        });
        os.add_interface(iface.clone());

        configure(&os, "em0", &iface.carp, 30, 20, None).await.unwrap();
        assert_eq!(os.ops(), vec![]);

        configure(&os, "em0", &iface.carp, 30, 25, None).await.unwrap();
        assert_eq!(
            os.ops(),
            vec![MockOp::SetCarp(
                "em0".to_string(),
                CarpConfig {
                    vhid: 30,
                    advskew: 25,
                    passphrase: None,
                }
            )]
        );
    }
}
