//! BGP route-target type.

use crate::ParseError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A route target in `asn:value` form.
///
/// Route targets select which learned routes a VRF imports and tag the
/// routes a VRF exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteTarget {
    pub asn: u32,
    pub value: u32,
}

impl RouteTarget {
    pub const fn new(asn: u32, value: u32) -> Self {
        Self { asn, value }
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asn, self.value)
    }
}

impl FromStr for RouteTarget {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (asn, value) = s
            .split_once(':')
            .ok_or_else(|| ParseError::InvalidRouteTarget(s.to_string()))?;
        let asn = asn
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidRouteTarget(s.to_string()))?;
        let value = value
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidRouteTarget(s.to_string()))?;
        Ok(Self { asn, value })
    }
}

impl Serialize for RouteTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RouteTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
