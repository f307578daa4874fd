//! SRv6 SID binding table manager.
//!
//! This crate owns the kernel-resident lookup table that maps segment
//! identifiers to VRF ids. The forwarding fast path consults the table to
//! classify inbound segment-routed packets into routing domains; the
//! control plane writes it through the [`SidTable`] handle.
//!
//! The table is a fixed-capacity hash map with a documented binary layout
//! (see [`layout`]) and is registered under a stable name so it survives
//! agent restarts and can be inspected by external tooling. The concrete
//! storage sits behind the [`SidStore`] trait; [`MemSidStore`] is the
//! in-process implementation used by tests and default wiring.

mod error;
pub mod layout;
mod registry;
mod store;
mod table;

pub use error::{SidTableError, SidTableResult};
pub use registry::{global_registry, StoreRegistry};
pub use store::{MemSidStore, SidStore};
pub use table::{SidTable, MAX_SID_ENTRIES, SID_TABLE_NAME};
