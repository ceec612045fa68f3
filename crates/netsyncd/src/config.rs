//! Configuration store seam and the static in-memory implementation.
//!
//! The engine consumes declared records through [`ConfigStore`]; it
//! never writes them. [`StaticConfig`] backs the one-shot binary (a
//! YAML declared-state file) and the test suite. Shape validation
//! happens here so the engine core never sees malformed records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use netsync_common::{SyncError, SyncResult};

use crate::types::{
    DeclaredAlias, DeclaredInterface, DeclaredLagg, DeclaredVlan, GatewayConfig,
};

/// Read-only query surface over the declared network configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn interfaces(&self) -> SyncResult<Vec<DeclaredInterface>>;

    /// Aliases bound to one declared interface.
    async fn aliases(&self, interface: &str) -> SyncResult<Vec<DeclaredAlias>>;

    async fn laggs(&self) -> SyncResult<Vec<DeclaredLagg>>;

    /// Ordered member names of one declared lagg.
    async fn lagg_members(&self, lagg: &str) -> SyncResult<Vec<String>>;

    async fn vlans(&self) -> SyncResult<Vec<DeclaredVlan>>;

    async fn gateway(&self) -> SyncResult<GatewayConfig>;
}

/// A complete declared network state held in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub interfaces: Vec<DeclaredInterface>,
    #[serde(default)]
    pub aliases: Vec<DeclaredAlias>,
    #[serde(default)]
    pub laggs: Vec<DeclaredLagg>,
    #[serde(default)]
    pub vlans: Vec<DeclaredVlan>,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl StaticConfig {
    /// Parses and validates a YAML declared-state document.
    pub fn from_yaml(doc: &str) -> SyncResult<Self> {
        let config: StaticConfig = serde_yaml::from_str(doc)
            .map_err(|e| SyncError::invalid_config("declared state", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects records the engine must never see.
    pub fn validate(&self) -> SyncResult<()> {
        let mut seen = std::collections::HashSet::new();
        for iface in &self.interfaces {
            if iface.name.is_empty() {
                return Err(SyncError::invalid_config("interface.name", "empty name"));
            }
            if !seen.insert(iface.name.as_str()) {
                return Err(SyncError::invalid_config(
                    "interface.name",
                    format!("duplicate interface '{}'", iface.name),
                ));
            }
            if let Some(failover) = &iface.failover {
                if failover.vhid == 0 || failover.vhid > 255 {
                    return Err(SyncError::invalid_config(
                        "interface.failover.vhid",
                        format!("vhid {} out of range 1-255", failover.vhid),
                    ));
                }
            }
        }
        for alias in &self.aliases {
            if !self.interfaces.iter().any(|i| i.name == alias.interface) {
                return Err(SyncError::invalid_config(
                    "alias.interface",
                    format!("alias references undeclared interface '{}'", alias.interface),
                ));
            }
        }
        for vlan in &self.vlans {
            if vlan.tag == 0 || vlan.tag > 4094 {
                return Err(SyncError::invalid_config(
                    "vlan.tag",
                    format!("tag {} out of range 1-4094", vlan.tag),
                ));
            }
            if vlan.pcp > 7 {
                return Err(SyncError::invalid_config(
                    "vlan.pcp",
                    format!("pcp {} out of range 0-7", vlan.pcp),
                ));
            }
        }
        for lagg in &self.laggs {
            if lagg.members.is_empty() {
                return Err(SyncError::invalid_config(
                    "lagg.members",
                    format!("lagg '{}' has no members", lagg.name),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for StaticConfig {
    async fn interfaces(&self) -> SyncResult<Vec<DeclaredInterface>> {
        Ok(self.interfaces.clone())
    }

    async fn aliases(&self, interface: &str) -> SyncResult<Vec<DeclaredAlias>> {
        Ok(self
            .aliases
            .iter()
            .filter(|a| a.interface == interface)
            .cloned()
            .collect())
    }

    async fn laggs(&self) -> SyncResult<Vec<DeclaredLagg>> {
        Ok(self.laggs.clone())
    }

    async fn lagg_members(&self, lagg: &str) -> SyncResult<Vec<String>> {
        Ok(self
            .laggs
            .iter()
            .find(|l| l.name == lagg)
            .map(|l| l.members.clone())
            .unwrap_or_default())
    }

    async fn vlans(&self) -> SyncResult<Vec<DeclaredVlan>> {
        Ok(self.vlans.clone())
    }

    async fn gateway(&self) -> SyncResult<GatewayConfig> {
        Ok(self.gateway.clone())
    }
}
