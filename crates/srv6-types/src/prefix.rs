//! IPv6 prefix type with containment and overlap checks.

use crate::{ParseError, Sid};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// An IPv6 network prefix in CIDR notation.
///
/// The address is canonicalized to the network address on construction, so
/// `2001:db8::1/64` and `2001:db8::/64` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv6Prefix {
    addr: Ipv6Addr,
    prefix_len: u8,
}

impl Ipv6Prefix {
    pub fn new(addr: Ipv6Addr, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 128 {
            return Err(ParseError::InvalidPrefixLength(prefix_len));
        }
        let network = u128::from(addr) & Self::mask_for(prefix_len);
        Ok(Self {
            addr: Ipv6Addr::from(network),
            prefix_len,
        })
    }

    pub const fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    fn mask_for(prefix_len: u8) -> u128 {
        if prefix_len == 0 {
            0
        } else {
            u128::MAX << (128 - u32::from(prefix_len))
        }
    }

    /// Lowest address in the range, as an integer.
    pub fn first_address(&self) -> u128 {
        u128::from(self.addr)
    }

    /// Highest address in the range, as an integer.
    pub fn last_address(&self) -> u128 {
        u128::from(self.addr) | !Self::mask_for(self.prefix_len)
    }

    /// Number of addresses covered by this prefix, saturating at `u128::MAX`
    /// for a zero-length prefix.
    pub fn num_addresses(&self) -> u128 {
        if self.prefix_len == 0 {
            u128::MAX
        } else {
            1u128 << (128 - u32::from(self.prefix_len))
        }
    }

    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        u128::from(addr) & Self::mask_for(self.prefix_len) == u128::from(self.addr)
    }

    pub fn contains_sid(&self, sid: Sid) -> bool {
        self.contains(sid.inner())
    }

    /// Returns true if the two prefixes share any address.
    pub fn overlaps(&self, other: &Ipv6Prefix) -> bool {
        if self.prefix_len <= other.prefix_len {
            self.contains(other.addr)
        } else {
            other.contains(self.addr)
        }
    }
}

impl fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl FromStr for Ipv6Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidIpv6Prefix(s.to_string()))?;
        let addr = addr
            .parse::<Ipv6Addr>()
            .map_err(|_| ParseError::InvalidIpv6Prefix(s.to_string()))?;
        let prefix_len = len
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidIpv6Prefix(s.to_string()))?;
        Self::new(addr, prefix_len)
    }
}

impl Serialize for Ipv6Prefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv6Prefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
