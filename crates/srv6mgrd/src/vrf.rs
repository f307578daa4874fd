//! Per-VRF reconciler wiring.

use crate::config::AgentConfig;
use crate::error::{ReconcileReport, ReconcileResult};
use crate::export::ExportReconciler;
use crate::import::ImportReconciler;
use crate::scheduler::KeyReconciler;
use crate::speaker::RouteSpeaker;
use async_trait::async_trait;
use srv6_locator::LocatorAllocator;
use srv6_sidtable::SidTable;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The reconciler pair for one routing domain.
///
/// Import and export are independent clients of the shared table: import
/// owns bindings derived from remote routes, export owns bindings for
/// locally originated prefixes. The async mutexes give the scheduler's
/// per-key serialization an owned `&mut` path to each reconciler.
struct Domain {
    import: Option<Mutex<ImportReconciler>>,
    export: Option<Mutex<ExportReconciler>>,
}

/// Owns every configured routing domain and runs their convergence
/// passes. Implements [`KeyReconciler`] so the scheduler can drive it by
/// domain key.
pub struct VrfManager {
    speaker: Arc<dyn RouteSpeaker>,
    domains: StdMutex<HashMap<String, Arc<Domain>>>,
}

impl VrfManager {
    /// Builds reconcilers for every VRF in the configuration, registering
    /// a locator pool (named after the VRF) per export policy.
    pub fn from_config(
        config: &AgentConfig,
        table: SidTable,
        allocator: Arc<LocatorAllocator>,
        speaker: Arc<dyn RouteSpeaker>,
    ) -> ReconcileResult<Self> {
        let mut domains = HashMap::new();

        for vrf in &config.vrfs {
            let import = vrf
                .import
                .map(|rt| Mutex::new(ImportReconciler::new(vrf.vrf_id, rt, table.clone())));

            let export = match &vrf.export {
                Some(policy) => Some(Mutex::new(ExportReconciler::new(
                    vrf.vrf_id,
                    policy.route_target,
                    vrf.name.clone(),
                    policy.locator,
                    table.clone(),
                    allocator.clone(),
                )?)),
                None => None,
            };

            info!(
                vrf = %vrf.name,
                id = %vrf.vrf_id,
                import = vrf.import.is_some(),
                export = vrf.export.is_some(),
                "configured routing domain"
            );
            domains.insert(vrf.name.clone(), Arc::new(Domain { import, export }));
        }

        Ok(Self {
            speaker,
            domains: StdMutex::new(domains),
        })
    }

    /// Keys of all configured domains.
    pub fn domain_keys(&self) -> Vec<String> {
        self.domains.lock().unwrap().keys().cloned().collect()
    }

    fn domain(&self, key: &str) -> Option<Arc<Domain>> {
        self.domains.lock().unwrap().get(key).cloned()
    }

    /// Runs one convergence pass (import then export) for a domain.
    /// Returns `None` for unknown keys.
    pub async fn reconcile_domain(&self, key: &str) -> Option<ReconcileResult<ReconcileReport>> {
        let domain = self.domain(key)?;
        let mut report = ReconcileReport::default();

        if let Some(import) = &domain.import {
            match import.lock().await.reconcile(self.speaker.as_ref()).await {
                Ok(r) => report.merge(r),
                Err(err) => return Some(Err(err)),
            }
        }
        if let Some(export) = &domain.export {
            match export.lock().await.reconcile(self.speaker.as_ref()).await {
                Ok(r) => report.merge(r),
                Err(err) => return Some(Err(err)),
            }
        }

        Some(Ok(report))
    }

    /// Tears a domain down: removes its bindings, withdraws its
    /// advertisements, and releases its locator pool. Used when a VRF is
    /// deconfigured.
    pub async fn teardown_domain(&self, key: &str) -> Option<ReconcileResult<ReconcileReport>> {
        let domain = self.domains.lock().unwrap().remove(key)?;
        let mut report = ReconcileReport::default();

        if let Some(import) = &domain.import {
            report.merge(import.lock().await.teardown().await);
        }
        if let Some(export) = &domain.export {
            match export.lock().await.teardown(self.speaker.as_ref()).await {
                Ok(r) => report.merge(r),
                Err(err) => return Some(Err(err)),
            }
        }

        info!(vrf = key, "domain torn down");
        Some(Ok(report))
    }
}

#[async_trait]
impl KeyReconciler for VrfManager {
    async fn reconcile_key(&self, key: &str) {
        match self.reconcile_domain(key).await {
            None => warn!(vrf = key, "reconcile trigger for unknown domain"),
            Some(Ok(report)) if report.is_clean() => {
                info!(
                    vrf = key,
                    upserted = report.upserted,
                    deleted = report.deleted,
                    advertised = report.advertised,
                    withdrawn = report.withdrawn,
                    "domain converged"
                );
            }
            Some(Ok(report)) => {
                warn!(
                    vrf = key,
                    failed = report.failures.len(),
                    "domain converged partially, failed bindings retried next trigger"
                );
            }
            Some(Err(err)) => {
                warn!(vrf = key, %err, "reconciliation run failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ReconcileScheduler;
    use crate::speaker::{InMemorySpeaker, LearnedRoute};
    use pretty_assertions::assert_eq;
    use srv6_sidtable::{MemSidStore, SidTableError};
    use srv6_types::{Sid, VrfId};

    const CONFIG: &str = r#"
vrfs:
  - name: vrf-blue
    vrf_id: 1
    import: "64512:100"
    export:
      route_target: "64512:100"
      locator: "fd00:100::/120"
  - name: vrf-green
    vrf_id: 2
    import: "64512:200"
"#;

    fn setup() -> (SidTable, Arc<InMemorySpeaker>, Arc<VrfManager>) {
        let table = SidTable::from_store(Arc::new(MemSidStore::new(64)));
        let speaker = Arc::new(InMemorySpeaker::new());
        let config = AgentConfig::from_yaml(CONFIG).unwrap();
        let manager = Arc::new(
            VrfManager::from_config(
                &config,
                table.clone(),
                Arc::new(LocatorAllocator::new()),
                speaker.clone(),
            )
            .unwrap(),
        );
        (table, speaker, manager)
    }

    fn learned(sid: &str, rt: &str) -> LearnedRoute {
        LearnedRoute {
            prefix: "fd10::/64".parse().unwrap(),
            sid: sid.parse().unwrap(),
            route_target: rt.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_domain_run_covers_both_halves() {
        let (table, speaker, manager) = setup();
        speaker.set_learned(vec![learned("fd00:aa::1", "64512:100")]);
        speaker.set_local(VrfId::new(1), vec!["fd30::/64".parse().unwrap()]);

        let report = manager.reconcile_domain("vrf-blue").await.unwrap().unwrap();

        assert!(report.is_clean());
        assert_eq!(report.upserted, 2);
        assert_eq!(report.advertised, 1);

        let imported: Sid = "fd00:aa::1".parse().unwrap();
        let exported: Sid = "fd00:100::".parse().unwrap();
        assert_eq!(table.lookup(imported).await.unwrap(), VrfId::new(1));
        assert_eq!(table.lookup(exported).await.unwrap(), VrfId::new(1));
    }

    #[tokio::test]
    async fn test_unknown_domain_is_none() {
        let (_, _, manager) = setup();
        assert!(manager.reconcile_domain("vrf-red").await.is_none());
    }

    #[tokio::test]
    async fn test_teardown_domain_clears_state() {
        let (table, speaker, manager) = setup();
        speaker.set_learned(vec![learned("fd00:aa::1", "64512:100")]);
        speaker.set_local(VrfId::new(1), vec!["fd30::/64".parse().unwrap()]);
        manager.reconcile_domain("vrf-blue").await.unwrap().unwrap();

        let report = manager.teardown_domain("vrf-blue").await.unwrap().unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(report.withdrawn, 1);
        assert_eq!(table.len().await.unwrap(), 0);
        assert!(manager.reconcile_domain("vrf-blue").await.is_none());
    }

    #[tokio::test]
    async fn test_domains_do_not_interfere() {
        let (table, speaker, manager) = setup();
        speaker.set_learned(vec![
            learned("fd00:aa::1", "64512:100"),
            learned("fd00:bb::1", "64512:200"),
        ]);

        manager.reconcile_domain("vrf-blue").await.unwrap().unwrap();
        manager.reconcile_domain("vrf-green").await.unwrap().unwrap();

        // Withdraw vrf-green's route; vrf-blue's binding is untouched.
        speaker.set_learned(vec![learned("fd00:aa::1", "64512:100")]);
        manager.reconcile_domain("vrf-green").await.unwrap().unwrap();

        let blue: Sid = "fd00:aa::1".parse().unwrap();
        let green: Sid = "fd00:bb::1".parse().unwrap();
        assert_eq!(table.lookup(blue).await.unwrap(), VrfId::new(1));
        assert_eq!(table.lookup(green).await.unwrap_err(), SidTableError::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scheduler_drives_manager_end_to_end() {
        let (table, speaker, manager) = setup();
        speaker.set_learned(vec![
            learned("fd00:aa::1", "64512:100"),
            learned("fd00:bb::1", "64512:200"),
        ]);

        let scheduler = ReconcileScheduler::new(manager.clone());
        for key in manager.domain_keys() {
            scheduler.trigger(&key);
        }
        scheduler.quiesce().await;

        assert_eq!(table.len().await.unwrap(), 2);
    }
}
