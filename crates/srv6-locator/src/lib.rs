//! Locator pool allocator.
//!
//! A locator pool is a reserved, contiguous IPv6 range from which unique
//! SIDs are carved for locally originated routes. The export reconciler
//! allocates one SID per exported prefix so the node can recognize return
//! traffic destined to it.
//!
//! Allocation within a pool is linearizable: each pool sits behind its own
//! async mutex, independent of any scheduler-level key exclusion, so no two
//! concurrent allocations can ever return the same SID.

mod allocator;
mod error;
mod pool;

pub use allocator::LocatorAllocator;
pub use error::{LocatorError, LocatorResult};
pub use pool::LocatorPool;
