//! Export-side reconciliation: local prefixes into SIDs, bindings, and
//! advertisements.

use crate::error::{FailedOp, ReconcileError, ReconcileReport, ReconcileResult};
use crate::retry::with_backoff;
use crate::speaker::{Advertisement, RouteSpeaker};
use srv6_locator::{LocatorAllocator, LocatorError};
use srv6_sidtable::{SidTable, SidTableError};
use srv6_types::{Ipv6Prefix, RouteTarget, Sid, VrfId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Ensures every exported local prefix has an allocated SID and a binding
/// in the table, and that the speaker's advertisements track that state.
///
/// Ordering invariants:
/// - a SID is bound in the table before its route is advertised, so no
///   traffic can arrive for a SID with no local binding;
/// - a route is withdrawn before its binding is deleted, and the SID is
///   released only after the delete succeeds, so a SID that may still be
///   forwarding-visible is never reissued.
pub struct ExportReconciler {
    vrf: VrfId,
    export_rt: RouteTarget,
    pool: String,
    table: SidTable,
    allocator: Arc<LocatorAllocator>,
    /// Prefix -> issued SID, for allocations whose binding is applied.
    allocations: HashMap<Ipv6Prefix, Sid>,
    /// Prefixes whose advertisement has been accepted by the speaker.
    advertised: HashSet<Ipv6Prefix>,
}

impl ExportReconciler {
    /// Creates the reconciler and registers the domain's locator pool.
    pub fn new(
        vrf: VrfId,
        export_rt: RouteTarget,
        pool: String,
        locator: Ipv6Prefix,
        table: SidTable,
        allocator: Arc<LocatorAllocator>,
    ) -> ReconcileResult<Self> {
        allocator.create_pool(&pool, locator)?;
        Ok(Self {
            vrf,
            export_rt,
            pool,
            table,
            allocator,
            allocations: HashMap::new(),
            advertised: HashSet::new(),
        })
    }

    pub fn vrf(&self) -> VrfId {
        self.vrf
    }

    /// Current prefix -> SID assignments.
    pub fn allocations(&self) -> &HashMap<Ipv6Prefix, Sid> {
        &self.allocations
    }

    /// Recomputes the exported prefix set from a fresh speaker snapshot
    /// and converges allocations, bindings, and advertisements.
    #[instrument(skip(self, speaker), fields(vrf = %self.vrf))]
    pub async fn reconcile(&mut self, speaker: &dyn RouteSpeaker) -> ReconcileResult<ReconcileReport> {
        let desired: BTreeSet<Ipv6Prefix> = speaker
            .local_prefixes(self.vrf)
            .await
            .map_err(|e| ReconcileError::Speaker(e.to_string()))?
            .into_iter()
            .collect();

        let mut report = ReconcileReport::default();

        let stale: Vec<Ipv6Prefix> = {
            let mut stale: Vec<Ipv6Prefix> = self
                .allocations
                .keys()
                .filter(|p| !desired.contains(p))
                .copied()
                .collect();
            stale.sort();
            stale
        };
        for prefix in stale {
            self.retire(prefix, speaker, &mut report).await;
        }

        for prefix in desired {
            self.publish(prefix, speaker, &mut report).await;
        }

        debug!(
            upserted = report.upserted,
            deleted = report.deleted,
            advertised = report.advertised,
            withdrawn = report.withdrawn,
            failed = report.failures.len(),
            "export reconcile complete"
        );
        Ok(report)
    }

    /// Withdraw, unbind, release - in that order.
    async fn retire(
        &mut self,
        prefix: Ipv6Prefix,
        speaker: &dyn RouteSpeaker,
        report: &mut ReconcileReport,
    ) {
        let sid = self.allocations[&prefix];

        if self.advertised.contains(&prefix) {
            match speaker.withdraw(prefix).await {
                Ok(()) => {
                    self.advertised.remove(&prefix);
                    report.withdrawn += 1;
                }
                Err(err) => {
                    warn!(%prefix, %err, "failed to withdraw route");
                    report.fail(FailedOp::Withdraw { prefix }, ReconcileError::Speaker(err.to_string()));
                    // Still advertised externally; keep the binding alive.
                    return;
                }
            }
        }

        match with_backoff("delete", || self.table.delete(sid)).await {
            Ok(()) | Err(SidTableError::NotFound) => {
                report.deleted += 1;
            }
            Err(err) => {
                warn!(%prefix, %sid, %err, "failed to delete binding");
                report.fail(FailedOp::Unbind { sid }, err.into());
                // SID may still be forwarding-visible; do not release it.
                return;
            }
        }

        // Release only once the SID is gone from the table.
        if let Err(err) = self.allocator.release(&self.pool, sid).await {
            warn!(%prefix, %sid, %err, "failed to release SID");
            report.fail(FailedOp::Unbind { sid }, err.into());
            return;
        }
        self.allocations.remove(&prefix);
    }

    /// Allocate, bind, advertise - in that order.
    async fn publish(
        &mut self,
        prefix: Ipv6Prefix,
        speaker: &dyn RouteSpeaker,
        report: &mut ReconcileReport,
    ) {
        let sid = match self.allocations.get(&prefix) {
            Some(&sid) => sid,
            None => {
                let sid = match self.allocator.allocate(&self.pool).await {
                    Ok(sid) => sid,
                    Err(err @ LocatorError::PoolExhausted { .. }) => {
                        // Advertisement withheld until capacity frees up.
                        warn!(%prefix, %err, "pool exhausted, withholding advertisement");
                        report.fail(FailedOp::Allocate { prefix }, err.into());
                        return;
                    }
                    Err(err) => {
                        report.fail(FailedOp::Allocate { prefix }, err.into());
                        return;
                    }
                };

                match with_backoff("upsert", || self.table.upsert(sid, self.vrf)).await {
                    Ok(()) => {
                        self.allocations.insert(prefix, sid);
                    }
                    Err(err) => {
                        warn!(%prefix, %sid, %err, "failed to bind allocated SID");
                        report.fail(FailedOp::Bind { sid }, err.into());
                        // Never advertised, so the SID can be returned.
                        let _ = self.allocator.release(&self.pool, sid).await;
                        return;
                    }
                }
                report.upserted += 1;
                sid
            }
        };

        if !self.advertised.contains(&prefix) {
            let adv = Advertisement {
                prefix,
                sid,
                route_target: self.export_rt,
            };
            match speaker.advertise(adv).await {
                Ok(()) => {
                    self.advertised.insert(prefix);
                    report.advertised += 1;
                }
                Err(err) => {
                    warn!(%prefix, %err, "failed to advertise route");
                    report.fail(FailedOp::Advertise { prefix }, ReconcileError::Speaker(err.to_string()));
                }
            }
        }
    }

    /// Withdraws every advertisement, deletes every binding, and removes
    /// the locator pool. Used on export-policy removal; outstanding SIDs
    /// are force-released with the pool.
    #[instrument(skip(self, speaker), fields(vrf = %self.vrf))]
    pub async fn teardown(&mut self, speaker: &dyn RouteSpeaker) -> ReconcileResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut prefixes: Vec<Ipv6Prefix> = self.allocations.keys().copied().collect();
        prefixes.sort();

        for prefix in prefixes {
            let sid = self.allocations[&prefix];

            if self.advertised.remove(&prefix) {
                match speaker.withdraw(prefix).await {
                    Ok(()) => report.withdrawn += 1,
                    Err(err) => {
                        report.fail(
                            FailedOp::Withdraw { prefix },
                            ReconcileError::Speaker(err.to_string()),
                        );
                        continue;
                    }
                }
            }

            match with_backoff("delete", || self.table.delete(sid)).await {
                Ok(()) | Err(SidTableError::NotFound) => {
                    self.allocations.remove(&prefix);
                    report.deleted += 1;
                }
                Err(err) => report.fail(FailedOp::Unbind { sid }, err.into()),
            }
        }

        self.allocator.release_pool(&self.pool).await?;
        Ok(report)
    }
}
