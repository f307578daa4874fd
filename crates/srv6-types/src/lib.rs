//! Common types for the SRv6 VPN control plane.
//!
//! This crate provides type-safe representations of the domain primitives
//! shared by the binding table, the locator allocator, and the reconcilers:
//!
//! - [`Sid`]: 128-bit segment identifiers
//! - [`VrfId`]: numeric routing-domain identifiers
//! - [`Ipv6Prefix`]: IPv6 network prefixes (CIDR notation)
//! - [`RouteTarget`]: BGP extended-community style route targets

mod prefix;
mod route_target;
mod sid;
mod vrf;

pub use prefix::Ipv6Prefix;
pub use route_target::RouteTarget;
pub use sid::Sid;
pub use vrf::VrfId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid SID format: {0}")]
    InvalidSid(String),

    #[error("invalid IPv6 prefix format: {0}")]
    InvalidIpv6Prefix(String),

    #[error("invalid prefix length: {0} (must be 0-128)")]
    InvalidPrefixLength(u8),

    #[error("invalid route target: {0} (expected asn:value)")]
    InvalidRouteTarget(String),

    #[error("invalid VRF id: {0}")]
    InvalidVrfId(String),
}
