//! Per-key reconciliation scheduling.
//!
//! Policy-change events are dispatched here; the scheduler is the only
//! component that initiates reconciliation runs. Runs for one domain key
//! are totally ordered, distinct keys converge in parallel, and events
//! arriving while a key is running coalesce into exactly one follow-up
//! run that recomputes from the latest state.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument};

/// One reconciliation entry point per domain key, driven by the
/// scheduler. Implementations snapshot the latest policy/route state at
/// run start; they never receive state captured at trigger time.
#[async_trait]
pub trait KeyReconciler: Send + Sync + 'static {
    async fn reconcile_key(&self, key: &str);
}

#[derive(Debug, Default, Clone, Copy)]
struct KeyState {
    running: bool,
    pending: bool,
}

/// Serializes reconciliation per key while allowing cross-key
/// parallelism. There is no mid-run preemption: a running pass always
/// finishes, and staleness is handled by the coalesced follow-up run.
pub struct ReconcileScheduler<R: KeyReconciler> {
    reconciler: Arc<R>,
    states: Mutex<HashMap<String, KeyState>>,
}

impl<R: KeyReconciler> ReconcileScheduler<R> {
    pub fn new(reconciler: Arc<R>) -> Arc<Self> {
        Arc::new(Self {
            reconciler,
            states: Mutex::new(HashMap::new()),
        })
    }

    /// Handles a policy-change event for `key`.
    ///
    /// Idle key: a run starts immediately. Running key: the event is
    /// recorded as pending; any number of events while running collapse
    /// into a single follow-up run.
    #[instrument(skip(self))]
    pub fn trigger(self: &Arc<Self>, key: &str) {
        {
            let mut states = self.states.lock().unwrap();
            let state = states.entry(key.to_string()).or_default();
            if state.running {
                state.pending = true;
                debug!(key, "run in flight, coalescing");
                return;
            }
            state.running = true;
        }

        let scheduler = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            scheduler.run_serialized(key).await;
        });
    }

    async fn run_serialized(self: Arc<Self>, key: String) {
        loop {
            self.reconciler.reconcile_key(&key).await;

            let mut states = self.states.lock().unwrap();
            let state = states.entry(key.clone()).or_default();
            if state.pending {
                // Events arrived during the pass: run once more against
                // the now-latest state.
                state.pending = false;
                debug!(key, "starting coalesced follow-up run");
            } else {
                state.running = false;
                return;
            }
        }
    }

    /// Returns true if no key has a run in flight.
    pub fn is_idle(&self) -> bool {
        self.states
            .lock()
            .unwrap()
            .values()
            .all(|s| !s.running)
    }

    /// Waits until every in-flight and pending run has completed. Used by
    /// shutdown and tests; new triggers arriving meanwhile extend the
    /// wait.
    pub async fn quiesce(&self) {
        while !self.is_idle() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Records, per key, how many runs executed, the maximum concurrency
    /// observed, and the policy generation visible when each run started.
    #[derive(Default)]
    struct Probe {
        generation: AtomicU64,
        runs: Mutex<HashMap<String, Vec<u64>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        gate: Notify,
        hold: AtomicUsize,
    }

    #[async_trait]
    impl KeyReconciler for Probe {
        async fn reconcile_key(&self, key: &str) {
            let n = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(n, Ordering::SeqCst);

            let generation = self.generation.load(Ordering::SeqCst);
            self.runs
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .push(generation);

            if self.hold.load(Ordering::SeqCst) > 0 {
                self.hold.fetch_sub(1, Ordering::SeqCst);
                self.gate.notified().await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Probe {
        fn runs_for(&self, key: &str) -> Vec<u64> {
            self.runs.lock().unwrap().get(key).cloned().unwrap_or_default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_triggers_while_running_coalesce_into_one_follow_up() {
        let probe = Arc::new(Probe::default());
        let scheduler = ReconcileScheduler::new(probe.clone());

        // First run blocks inside the reconciler.
        probe.hold.store(1, Ordering::SeqCst);
        probe.generation.store(1, Ordering::SeqCst);
        scheduler.trigger("vrf-blue");

        // Two more events while the run is in flight.
        tokio::time::sleep(Duration::from_millis(20)).await;
        probe.generation.store(2, Ordering::SeqCst);
        scheduler.trigger("vrf-blue");
        probe.generation.store(3, Ordering::SeqCst);
        scheduler.trigger("vrf-blue");

        probe.gate.notify_waiters();
        scheduler.quiesce().await;

        // Exactly one follow-up, and it observed the latest state.
        let runs = probe.runs_for("vrf-blue");
        assert_eq!(runs, vec![1, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_never_overlaps() {
        let probe = Arc::new(Probe::default());
        let scheduler = ReconcileScheduler::new(probe.clone());

        for _ in 0..16 {
            scheduler.trigger("vrf-blue");
            tokio::task::yield_now().await;
        }
        scheduler.quiesce().await;

        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_keys_run_concurrently() {
        let probe = Arc::new(Probe::default());
        let scheduler = ReconcileScheduler::new(probe.clone());

        // Both runs park inside the reconciler at the same time.
        probe.hold.store(2, Ordering::SeqCst);
        scheduler.trigger("vrf-blue");
        scheduler.trigger("vrf-green");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let observed = probe.max_in_flight.load(Ordering::SeqCst);
        probe.gate.notify_waiters();
        scheduler.quiesce().await;

        assert_eq!(observed, 2);
        assert_eq!(probe.runs_for("vrf-blue").len(), 1);
        assert_eq!(probe.runs_for("vrf-green").len(), 1);
    }

    #[tokio::test]
    async fn test_idle_key_runs_immediately() {
        let probe = Arc::new(Probe::default());
        let scheduler = ReconcileScheduler::new(probe.clone());

        scheduler.trigger("vrf-blue");
        scheduler.quiesce().await;
        scheduler.trigger("vrf-blue");
        scheduler.quiesce().await;

        // Sequential triggers on an idle key each run once.
        assert_eq!(probe.runs_for("vrf-blue").len(), 2);
    }
}
