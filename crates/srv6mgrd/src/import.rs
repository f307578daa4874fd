//! Import-side reconciliation: remote routes into local bindings.

use crate::error::{FailedOp, ReconcileError, ReconcileReport, ReconcileResult};
use crate::retry::with_backoff;
use crate::speaker::RouteSpeaker;
use srv6_sidtable::{SidTable, SidTableError};
use srv6_types::{RouteTarget, Sid, VrfId};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument, warn};

/// Converges the binding table with the SID-tagged routes learned for one
/// VRF's import policy, so transit traffic carrying those SIDs is
/// classified into the VRF.
///
/// The reconciler tracks the bindings it has successfully applied in
/// `actual` instead of scanning the shared table: the table's iteration
/// has no isolation guarantee and also contains other domains' entries.
pub struct ImportReconciler {
    vrf: VrfId,
    import_rt: RouteTarget,
    table: SidTable,
    actual: HashMap<Sid, VrfId>,
}

impl ImportReconciler {
    pub fn new(vrf: VrfId, import_rt: RouteTarget, table: SidTable) -> Self {
        Self {
            vrf,
            import_rt,
            table,
            actual: HashMap::new(),
        }
    }

    pub fn vrf(&self) -> VrfId {
        self.vrf
    }

    /// Number of bindings this reconciler currently tracks as applied.
    pub fn tracked(&self) -> usize {
        self.actual.len()
    }

    /// Recomputes desired state from a fresh speaker snapshot and applies
    /// the minimal diff. Re-running on an unchanged route set issues zero
    /// table operations.
    #[instrument(skip(self, speaker), fields(vrf = %self.vrf))]
    pub async fn reconcile(&mut self, speaker: &dyn RouteSpeaker) -> ReconcileResult<ReconcileReport> {
        let routes = speaker
            .learned_routes(self.import_rt)
            .await
            .map_err(|e| ReconcileError::Speaker(e.to_string()))?;

        let desired: BTreeMap<Sid, VrfId> =
            routes.into_iter().map(|r| (r.sid, self.vrf)).collect();

        let mut report = ReconcileReport::default();

        // Withdrawn routes first: their SIDs must stop classifying into
        // this VRF before anything else.
        let stale: Vec<Sid> = {
            let mut stale: Vec<Sid> = self
                .actual
                .keys()
                .filter(|sid| !desired.contains_key(sid))
                .copied()
                .collect();
            stale.sort();
            stale
        };
        for sid in stale {
            match with_backoff("delete", || self.table.delete(sid)).await {
                // Already gone is converged, not a failure.
                Ok(()) | Err(SidTableError::NotFound) => {
                    self.actual.remove(&sid);
                    report.deleted += 1;
                }
                Err(err) => {
                    warn!(%sid, %err, "failed to remove stale binding");
                    report.fail(FailedOp::Unbind { sid }, err.into());
                }
            }
        }

        for (sid, vrf) in desired {
            match self.actual.get(&sid) {
                Some(&applied) if applied == vrf => continue,
                Some(&applied) => {
                    // A live SID remapped to a different domain means the
                    // import policy is inconsistent; overwrite and flag it.
                    warn!(%sid, from = %applied, to = %vrf, "policy inconsistency: SID remapped");
                }
                None => {}
            }
            match with_backoff("upsert", || self.table.upsert(sid, vrf)).await {
                Ok(()) => {
                    self.actual.insert(sid, vrf);
                    report.upserted += 1;
                }
                Err(err) => {
                    warn!(%sid, %err, "failed to apply binding");
                    report.fail(FailedOp::Bind { sid }, err.into());
                }
            }
        }

        debug!(
            upserted = report.upserted,
            deleted = report.deleted,
            failed = report.failures.len(),
            "import reconcile complete"
        );
        Ok(report)
    }

    /// Removes every binding this reconciler has applied. Used on import
    /// policy removal / domain teardown.
    #[instrument(skip(self), fields(vrf = %self.vrf))]
    pub async fn teardown(&mut self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut sids: Vec<Sid> = self.actual.keys().copied().collect();
        sids.sort();

        for sid in sids {
            match with_backoff("delete", || self.table.delete(sid)).await {
                Ok(()) | Err(SidTableError::NotFound) => {
                    self.actual.remove(&sid);
                    report.deleted += 1;
                }
                Err(err) => report.fail(FailedOp::Unbind { sid }, err.into()),
            }
        }
        report
    }
}
