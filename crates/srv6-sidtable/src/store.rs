//! Storage seam for the binding table.

use crate::error::{SidTableError, SidTableResult};
use crate::layout::{RawKey, RawValue};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Backend for the SID binding table.
///
/// Every method maps to an external-store call that may be slow or fail
/// transiently; callers must not assume in-process semantics. Implementors
/// must enforce the fixed capacity on insert and provide a `next_key`
/// cursor for iteration. The cursor gives no isolation: entries mutated
/// while a pass is in progress may or may not be observed by that pass.
#[async_trait]
pub trait SidStore: Send + Sync {
    /// Maximum number of entries, fixed at creation.
    fn capacity(&self) -> u32;

    /// Returns the value for a key, or `None` if absent.
    async fn fetch(&self, key: &RawKey) -> SidTableResult<Option<RawValue>>;

    /// Inserts or overwrites an entry. Fails with `CapacityExceeded` only
    /// when the key is new and the store is full.
    async fn store(&self, key: RawKey, value: RawValue) -> SidTableResult<()>;

    /// Removes an entry. Returns true if it existed.
    async fn remove(&self, key: &RawKey) -> SidTableResult<bool>;

    /// Returns the key following `prev` in store order, or the first key
    /// when `prev` is `None`. Returns `None` at the end of a pass.
    async fn next_key(&self, prev: Option<&RawKey>) -> SidTableResult<Option<RawKey>>;

    /// Current number of entries.
    async fn len(&self) -> SidTableResult<u32>;
}

/// In-process [`SidStore`] backed by a `BTreeMap`.
///
/// Used by tests and by wiring where no kernel datapath is attached. The
/// ordered map gives `next_key` a stable cursor order. Transient faults
/// can be injected per key with [`MemSidStore::fail_once`] to exercise
/// retry and partial-failure paths.
pub struct MemSidStore {
    capacity: u32,
    entries: Mutex<BTreeMap<RawKey, RawValue>>,
    faults: Mutex<HashMap<RawKey, u32>>,
    mutations: AtomicU64,
}

impl MemSidStore {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            entries: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(HashMap::new()),
            mutations: AtomicU64::new(0),
        }
    }

    /// Total number of `store`/`remove` calls attempted so far. Test aid
    /// for asserting that a converged reconciler issues no table writes.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }

    /// Makes the next `store` or `remove` touching `key` fail once with a
    /// `Transient` error. Test aid.
    pub fn fail_once(&self, key: RawKey) {
        *self.faults.lock().unwrap().entry(key).or_insert(0) += 1;
    }

    fn take_fault(&self, key: &RawKey) -> bool {
        let mut faults = self.faults.lock().unwrap();
        match faults.get_mut(key) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    faults.remove(key);
                }
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SidStore for MemSidStore {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    async fn fetch(&self, key: &RawKey) -> SidTableResult<Option<RawValue>> {
        Ok(self.entries.lock().unwrap().get(key).copied())
    }

    async fn store(&self, key: RawKey, value: RawValue) -> SidTableResult<()> {
        self.mutations.fetch_add(1, Ordering::Relaxed);
        if self.take_fault(&key) {
            return Err(SidTableError::transient("store"));
        }

        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(&key) && entries.len() as u32 >= self.capacity {
            return Err(SidTableError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        entries.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &RawKey) -> SidTableResult<bool> {
        self.mutations.fetch_add(1, Ordering::Relaxed);
        if self.take_fault(key) {
            return Err(SidTableError::transient("remove"));
        }

        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn next_key(&self, prev: Option<&RawKey>) -> SidTableResult<Option<RawKey>> {
        let entries = self.entries.lock().unwrap();
        let next = match prev {
            None => entries.keys().next(),
            Some(prev) => entries
                .range((std::ops::Bound::Excluded(*prev), std::ops::Bound::Unbounded))
                .map(|(k, _)| k)
                .next(),
        };
        Ok(next.copied())
    }

    async fn len(&self) -> SidTableResult<u32> {
        Ok(self.entries.lock().unwrap().len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(n: u8) -> RawKey {
        let mut k = [0u8; 16];
        k[15] = n;
        k
    }

    #[tokio::test]
    async fn test_store_and_fetch() {
        let store = MemSidStore::new(8);

        store.store(key(1), [5, 0, 0, 0]).await.unwrap();
        assert_eq!(store.fetch(&key(1)).await.unwrap(), Some([5, 0, 0, 0]));
        assert_eq!(store.fetch(&key(2)).await.unwrap(), None);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_capacity_enforced_for_new_keys_only() {
        let store = MemSidStore::new(2);

        store.store(key(1), [1, 0, 0, 0]).await.unwrap();
        store.store(key(2), [2, 0, 0, 0]).await.unwrap();

        let err = store.store(key(3), [3, 0, 0, 0]).await.unwrap_err();
        assert_eq!(err, SidTableError::CapacityExceeded { capacity: 2 });

        // Overwriting an existing key succeeds at capacity.
        store.store(key(2), [9, 0, 0, 0]).await.unwrap();
        assert_eq!(store.fetch(&key(2)).await.unwrap(), Some([9, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_next_key_cursor() {
        let store = MemSidStore::new(8);
        for n in [3u8, 1, 2] {
            store.store(key(n), [n, 0, 0, 0]).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        while let Some(k) = store.next_key(cursor.as_ref()).await.unwrap() {
            seen.push(k);
            cursor = Some(k);
        }
        assert_eq!(seen, vec![key(1), key(2), key(3)]);
    }

    #[tokio::test]
    async fn test_fail_once_is_one_shot() {
        let store = MemSidStore::new(8);
        store.fail_once(key(1));

        assert!(store.store(key(1), [1, 0, 0, 0]).await.unwrap_err().is_retryable());
        store.store(key(1), [1, 0, 0, 0]).await.unwrap();
    }
}
