//! Segment identifier type.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// A segment identifier: a 128-bit address used to steer and classify
/// segment-routed packets.
///
/// SIDs are compared byte-exact; two SIDs are the same binding-table key
/// if and only if their 16-byte encodings are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sid(Ipv6Addr);

impl Sid {
    pub const UNSPECIFIED: Self = Sid(Ipv6Addr::UNSPECIFIED);

    pub const fn new(addr: Ipv6Addr) -> Self {
        Sid(addr)
    }

    pub const fn inner(&self) -> Ipv6Addr {
        self.0
    }

    /// Returns the 16-byte big-endian representation.
    pub const fn octets(&self) -> [u8; 16] {
        self.0.octets()
    }

    pub const fn from_octets(octets: [u8; 16]) -> Self {
        Sid(Ipv6Addr::new(
            u16::from_be_bytes([octets[0], octets[1]]),
            u16::from_be_bytes([octets[2], octets[3]]),
            u16::from_be_bytes([octets[4], octets[5]]),
            u16::from_be_bytes([octets[6], octets[7]]),
            u16::from_be_bytes([octets[8], octets[9]]),
            u16::from_be_bytes([octets[10], octets[11]]),
            u16::from_be_bytes([octets[12], octets[13]]),
            u16::from_be_bytes([octets[14], octets[15]]),
        ))
    }

    /// Returns the SID as an unsigned 128-bit integer (network byte order).
    ///
    /// Used by the locator allocator for address arithmetic within a pool
    /// range.
    pub fn to_u128(&self) -> u128 {
        u128::from_be_bytes(self.octets())
    }

    pub fn from_u128(value: u128) -> Self {
        Sid::from_octets(value.to_be_bytes())
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Sid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv6Addr>()
            .map(Sid)
            .map_err(|_| ParseError::InvalidSid(s.to_string()))
    }
}

impl From<Ipv6Addr> for Sid {
    fn from(addr: Ipv6Addr) -> Self {
        Sid(addr)
    }
}

impl From<Sid> for Ipv6Addr {
    fn from(sid: Sid) -> Self {
        sid.0
    }
}
