//! Binary layout of binding table keys and values.
//!
//! The table is shared with a datapath consumer, so the layout is part of
//! an external ABI and is fixed independent of Rust struct layout:
//!
//! ```text
//! key (16 bytes):
//!     offset 0, len 16   SID, IPv6 address in network byte order
//! value (4 bytes):
//!     offset 0, len 4    VRF id, u32 little-endian (kernel native)
//! ```
//!
//! Key and value equality is byte-exact comparison of these encodings.

use srv6_types::{Sid, VrfId};

/// Size in bytes of an encoded table key.
pub const SID_KEY_LEN: usize = 16;

/// Size in bytes of an encoded table value.
pub const VRF_VALUE_LEN: usize = 4;

/// An encoded table key.
pub type RawKey = [u8; SID_KEY_LEN];

/// An encoded table value.
pub type RawValue = [u8; VRF_VALUE_LEN];

/// Encodes a SID into its 16-byte table key.
pub fn encode_key(sid: Sid) -> RawKey {
    sid.octets()
}

/// Decodes a 16-byte table key back into a SID.
pub fn decode_key(raw: &RawKey) -> Sid {
    Sid::from_octets(*raw)
}

/// Encodes a VRF id into its 4-byte table value.
pub fn encode_value(vrf: VrfId) -> RawValue {
    vrf.as_u32().to_le_bytes()
}

/// Decodes a 4-byte table value back into a VRF id.
pub fn decode_value(raw: &RawValue) -> VrfId {
    VrfId::new(u32::from_le_bytes(*raw))
}
