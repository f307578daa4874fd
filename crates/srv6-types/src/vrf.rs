//! Routing-domain identifier type.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numeric identifier for an isolated routing/forwarding context (VRF).
///
/// This is the value half of a binding-table entry; its wire encoding is a
/// 4-byte little-endian word (see the sidtable layout module).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VrfId(u32);

impl VrfId {
    pub const fn new(id: u32) -> Self {
        VrfId(id)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VrfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for VrfId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(VrfId)
            .map_err(|_| ParseError::InvalidVrfId(s.to_string()))
    }
}

impl From<u32> for VrfId {
    fn from(id: u32) -> Self {
        VrfId(id)
    }
}

impl From<VrfId> for u32 {
    fn from(id: VrfId) -> Self {
        id.0
    }
}
