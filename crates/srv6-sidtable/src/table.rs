//! The SID binding table handle.

use crate::error::{SidTableError, SidTableResult};
use crate::layout::{decode_key, decode_value, encode_key, encode_value};
use crate::registry::StoreRegistry;
use crate::store::{MemSidStore, SidStore};
use srv6_types::{Sid, VrfId};
use std::sync::Arc;
use tracing::{debug, info};

/// Stable name the table is pinned under for re-attachment and inspection.
pub const SID_TABLE_NAME: &str = "srv6_sid";

/// Fixed table capacity. Entries are allocated on demand, not preallocated.
pub const MAX_SID_ENTRIES: u32 = 16384;

/// Handle to the SID -> VRF binding table.
///
/// One table exists per node. Multiple reconcilers hold clones of the
/// handle and write disjoint SID sets; there are no cross-entry
/// transactions, so readers observe multi-entry updates entry by entry.
#[derive(Clone)]
pub struct SidTable {
    store: Arc<dyn SidStore>,
}

impl std::fmt::Debug for SidTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidTable").finish_non_exhaustive()
    }
}

impl SidTable {
    /// Creates the table (first install) or attaches to the pinned table
    /// (restart). Failure here is fatal: startup must abort and no
    /// reconciler may run.
    pub fn create_or_open(registry: &StoreRegistry, create: bool) -> SidTableResult<Self> {
        let store = if create {
            match registry.attach(SID_TABLE_NAME) {
                // An existing pin from a previous install is reused rather
                // than wiped; its entries are still forwarding-visible.
                Some(existing) => existing,
                None => {
                    let store: Arc<dyn SidStore> = Arc::new(MemSidStore::new(MAX_SID_ENTRIES));
                    registry.register(SID_TABLE_NAME, store.clone());
                    info!(
                        name = SID_TABLE_NAME,
                        capacity = MAX_SID_ENTRIES,
                        "created SID binding table"
                    );
                    store
                }
            }
        } else {
            registry
                .attach(SID_TABLE_NAME)
                .ok_or_else(|| SidTableError::Attach {
                    name: SID_TABLE_NAME.to_string(),
                })?
        };

        Ok(Self { store })
    }

    /// Wraps an externally constructed store (dependency injection seam).
    pub fn from_store(store: Arc<dyn SidStore>) -> Self {
        Self { store }
    }

    pub fn capacity(&self) -> u32 {
        self.store.capacity()
    }

    pub async fn len(&self) -> SidTableResult<u32> {
        self.store.len().await
    }

    /// Looks up the VRF bound to a SID.
    pub async fn lookup(&self, sid: Sid) -> SidTableResult<VrfId> {
        match self.store.fetch(&encode_key(sid)).await? {
            Some(raw) => Ok(decode_value(&raw)),
            None => Err(SidTableError::NotFound),
        }
    }

    /// Inserts or overwrites a binding. Last write wins; no compare and
    /// swap. `CapacityExceeded` is returned only for a new key when the
    /// table is full.
    pub async fn upsert(&self, sid: Sid, vrf: VrfId) -> SidTableResult<()> {
        self.store.store(encode_key(sid), encode_value(vrf)).await?;
        debug!(%sid, %vrf, "bound SID");
        Ok(())
    }

    /// Deletes a binding.
    pub async fn delete(&self, sid: Sid) -> SidTableResult<()> {
        if self.store.remove(&encode_key(sid)).await? {
            debug!(%sid, "unbound SID");
            Ok(())
        } else {
            Err(SidTableError::NotFound)
        }
    }

    /// Iterates all current entries, passing each to `cb`.
    ///
    /// Each call starts a fresh, finite, unordered pass. There is no
    /// isolation: entries mutated concurrently may or may not be observed.
    /// This is the external inspection surface only; reconcilers track
    /// their own applied state and never diff against it.
    pub async fn iterate_with<F>(&self, mut cb: F) -> SidTableResult<()>
    where
        F: FnMut(Sid, VrfId),
    {
        let mut cursor: Option<[u8; crate::layout::SID_KEY_LEN]> = None;
        while let Some(key) = self.store.next_key(cursor.as_ref()).await? {
            // The entry can disappear between next_key and fetch; skip it.
            if let Some(raw) = self.store.fetch(&key).await? {
                cb(decode_key(&key), decode_value(&raw));
            }
            cursor = Some(key);
        }
        Ok(())
    }

    /// Collects a best-effort snapshot of all entries.
    pub async fn dump(&self) -> SidTableResult<Vec<(Sid, VrfId)>> {
        let mut entries = Vec::new();
        self.iterate_with(|sid, vrf| entries.push((sid, vrf))).await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sid(n: u16) -> Sid {
        format!("2001:db8::{:x}", n).parse().unwrap()
    }

    #[tokio::test]
    async fn test_upsert_lookup_delete_cycle() {
        let registry = StoreRegistry::new();
        let table = SidTable::create_or_open(&registry, true).unwrap();

        let s: Sid = "2001:db8::1".parse().unwrap();
        table.upsert(s, VrfId::new(5)).await.unwrap();
        assert_eq!(table.lookup(s).await.unwrap(), VrfId::new(5));

        table.delete(s).await.unwrap();
        assert_eq!(table.lookup(s).await.unwrap_err(), SidTableError::NotFound);
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let table = SidTable::from_store(Arc::new(MemSidStore::new(8)));

        table.upsert(sid(1), VrfId::new(1)).await.unwrap();
        table.upsert(sid(1), VrfId::new(2)).await.unwrap();

        assert_eq!(table.lookup(sid(1)).await.unwrap(), VrfId::new(2));
        assert_eq!(table.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let table = SidTable::from_store(Arc::new(MemSidStore::new(8)));
        assert_eq!(
            table.delete(sid(7)).await.unwrap_err(),
            SidTableError::NotFound
        );
    }

    #[tokio::test]
    async fn test_capacity_at_reference_sizing() {
        let registry = StoreRegistry::new();
        let table = SidTable::create_or_open(&registry, true).unwrap();
        assert_eq!(table.capacity(), MAX_SID_ENTRIES);

        for n in 0..MAX_SID_ENTRIES {
            let s = Sid::from_u128(0xfd00_u128 << 112 | u128::from(n));
            table.upsert(s, VrfId::new(1)).await.unwrap();
        }
        assert_eq!(table.len().await.unwrap(), MAX_SID_ENTRIES);

        // Entry 16385 is rejected and nothing is evicted.
        let overflow = Sid::from_u128(0xfd01_u128 << 112);
        assert_eq!(
            table.upsert(overflow, VrfId::new(1)).await.unwrap_err(),
            SidTableError::CapacityExceeded {
                capacity: MAX_SID_ENTRIES
            }
        );
        assert_eq!(table.len().await.unwrap(), MAX_SID_ENTRIES);
        let first = Sid::from_u128(0xfd00_u128 << 112);
        assert_eq!(table.lookup(first).await.unwrap(), VrfId::new(1));
    }

    #[tokio::test]
    async fn test_reattach_after_restart() {
        let registry = StoreRegistry::new();

        {
            let table = SidTable::create_or_open(&registry, true).unwrap();
            table.upsert(sid(1), VrfId::new(9)).await.unwrap();
        }

        // New handle, same pin: entries persist.
        let table = SidTable::create_or_open(&registry, false).unwrap();
        assert_eq!(table.lookup(sid(1)).await.unwrap(), VrfId::new(9));
    }

    #[tokio::test]
    async fn test_open_without_pin_is_fatal() {
        let registry = StoreRegistry::new();
        let err = SidTable::create_or_open(&registry, false).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_iterate_sees_all_entries() {
        let table = SidTable::from_store(Arc::new(MemSidStore::new(8)));
        for n in 1..=3 {
            table.upsert(sid(n), VrfId::new(u32::from(n))).await.unwrap();
        }

        let mut entries = table.dump().await.unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                (sid(1), VrfId::new(1)),
                (sid(2), VrfId::new(2)),
                (sid(3), VrfId::new(3)),
            ]
        );

        // A fresh pass starts over.
        let second = table.dump().await.unwrap();
        assert_eq!(second.len(), 3);
    }
}
