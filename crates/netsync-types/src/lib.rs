//! Common value types for host network state reconciliation.
//!
//! This crate provides the type-safe primitives shared by the
//! reconciliation engine:
//!
//! - [`IfAddress`]: an interface address (family, IP, netmask,
//!   broadcast, optional CARP group) with full structural equality so
//!   live and desired address sets support genuine set-difference
//! - [`AddressFamily`]: IPv4/IPv6 discrimination
//! - [`RouteEntry`]: a default-route value compared by gateway

mod address;
mod route;

pub use address::{AddressFamily, IfAddress};
pub use route::RouteEntry;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid prefix length: {len} (maximum {max} for this address family)")]
    InvalidPrefixLength { len: u8, max: u8 },

    #[error("invalid netmask: {0}")]
    InvalidNetmask(String),

    #[error("address family mismatch: {0}")]
    FamilyMismatch(String),
}
