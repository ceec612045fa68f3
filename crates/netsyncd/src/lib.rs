//! netsyncd - declared-state network reconciliation engine
//!
//! Converges the live OS network stack (interfaces, addresses,
//! failover groups, DHCP clients, default routes) onto a declared
//! configuration. Every pass re-reads live state and issues only the
//! mutations needed to converge, so passes are idempotent and safe to
//! rerun after a crash.

pub mod adapter;
pub mod addresses;
pub mod carp;
pub mod commands;
pub mod config;
pub mod dhclient;
pub mod freebsd;
pub mod ifconfig;
pub mod routes;
pub mod sync;
pub mod types;
pub mod vif;

#[cfg(test)]
mod mock;

pub use adapter::OsAdapter;
pub use config::{ConfigStore, StaticConfig};
pub use freebsd::FreeBsdAdapter;
pub use sync::SyncEngine;
pub use types::NodeRole;
