//! Registry of locator pools with per-pool exclusion.

use crate::error::{LocatorError, LocatorResult};
use crate::pool::LocatorPool;
use srv6_types::{Ipv6Prefix, Sid};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, info};

struct PoolHandle {
    range: Ipv6Prefix,
    pool: Arc<Mutex<LocatorPool>>,
}

/// Manages the set of locator pools on this node.
///
/// The registry map is guarded by a plain mutex held only for lookups;
/// allocation state is guarded per pool by an async mutex, so allocations
/// on one pool are linearizable and allocations on different pools never
/// contend.
#[derive(Default)]
pub struct LocatorAllocator {
    pools: StdMutex<HashMap<String, PoolHandle>>,
}

impl LocatorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pool for `range`. Fails if the name is taken or the
    /// range overlaps any existing pool.
    pub fn create_pool(&self, name: &str, range: Ipv6Prefix) -> LocatorResult<()> {
        let mut pools = self.pools.lock().unwrap();

        if pools.contains_key(name) {
            return Err(LocatorError::PoolExists {
                name: name.to_string(),
            });
        }
        for (existing_name, handle) in pools.iter() {
            if handle.range.overlaps(&range) {
                return Err(LocatorError::PoolOverlap {
                    name: existing_name.clone(),
                    range,
                });
            }
        }

        pools.insert(
            name.to_string(),
            PoolHandle {
                range,
                pool: Arc::new(Mutex::new(LocatorPool::new(range))),
            },
        );
        info!(pool = name, %range, "created locator pool");
        Ok(())
    }

    fn handle(&self, name: &str) -> LocatorResult<Arc<Mutex<LocatorPool>>> {
        self.pools
            .lock()
            .unwrap()
            .get(name)
            .map(|h| h.pool.clone())
            .ok_or_else(|| LocatorError::PoolNotFound {
                name: name.to_string(),
            })
    }

    /// Issues the lowest free SID from the named pool.
    pub async fn allocate(&self, name: &str) -> LocatorResult<Sid> {
        let pool = self.handle(name)?;
        let mut pool = pool.lock().await;
        let sid = pool.allocate().ok_or_else(|| LocatorError::PoolExhausted {
            name: name.to_string(),
        })?;
        debug!(pool = name, %sid, "allocated SID");
        Ok(sid)
    }

    /// Returns a SID to the named pool. Idempotent: releasing a SID that
    /// is not issued is a no-op.
    pub async fn release(&self, name: &str, sid: Sid) -> LocatorResult<()> {
        let pool = self.handle(name)?;
        if pool.lock().await.release(sid) {
            debug!(pool = name, %sid, "released SID");
        }
        Ok(())
    }

    /// Force-releases all outstanding SIDs and removes the pool. Used on
    /// export-policy removal.
    pub async fn release_pool(&self, name: &str) -> LocatorResult<()> {
        let pool = self.handle(name)?;
        let released = pool.lock().await.release_all();

        self.pools.lock().unwrap().remove(name);
        info!(pool = name, released, "removed locator pool");
        Ok(())
    }

    /// Number of SIDs currently issued from the named pool.
    pub async fn outstanding(&self, name: &str) -> LocatorResult<usize> {
        let pool = self.handle(name)?;
        let n = pool.lock().await.outstanding();
        Ok(n)
    }
}
