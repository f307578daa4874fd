//! A single locator pool and its allocation record.

use srv6_types::{Ipv6Prefix, Sid};
use std::collections::BTreeSet;

/// A contiguous SID range plus the set of currently issued addresses.
///
/// Allocation is deterministic: the lowest-numbered free address in the
/// range is always handed out next. Re-deriving desired state after a
/// restart therefore reproduces the same assignments when replayed in the
/// same order.
#[derive(Debug)]
pub struct LocatorPool {
    range: Ipv6Prefix,
    issued: BTreeSet<u128>,
}

impl LocatorPool {
    pub fn new(range: Ipv6Prefix) -> Self {
        Self {
            range,
            issued: BTreeSet::new(),
        }
    }

    pub fn range(&self) -> Ipv6Prefix {
        self.range
    }

    /// Number of currently issued SIDs.
    pub fn outstanding(&self) -> usize {
        self.issued.len()
    }

    /// Issues the lowest free address in the range, or `None` when the
    /// range is fully issued.
    pub fn allocate(&mut self) -> Option<Sid> {
        let mut candidate = self.range.first_address();
        let last = self.range.last_address();

        // issued is ordered, so walking it from the range start finds the
        // first gap.
        for &taken in self.issued.range(candidate..=last) {
            if taken != candidate {
                break;
            }
            candidate = candidate.checked_add(1)?;
            if candidate > last {
                return None;
            }
        }

        self.issued.insert(candidate);
        Some(Sid::from_u128(candidate))
    }

    /// Marks a SID free again. Releasing an address that is not issued or
    /// lies outside the range is a no-op, so retried teardown is safe.
    /// Returns true if the SID was actually issued.
    pub fn release(&mut self, sid: Sid) -> bool {
        self.issued.remove(&sid.to_u128())
    }

    /// Releases every outstanding SID.
    pub fn release_all(&mut self) -> usize {
        let count = self.issued.len();
        self.issued.clear();
        count
    }
}
