use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::generate;
use crate::models::*;

/// Odds that a single pod reading churns on refresh.
const PERTURB_PROBABILITY: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dashboard: DashboardMetrics,
    pub clusters: Vec<ClusterInfo>,
    pub pods: Vec<PodInfo>,
    pub deployments: Vec<DeploymentInfo>,
    pub services: Vec<ServiceInfo>,
    pub nodes: Vec<NodeInfo>,
    pub namespaces: Vec<NamespaceInfo>,
    pub events: Vec<EventInfo>,
    pub last_refresh: DateTime<Utc>,
    /// Number of refreshes applied since generation.
    pub revision: u64,
}

impl Snapshot {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            dashboard: generate::dashboard_metrics(rng),
            clusters: generate::clusters(rng),
            pods: generate::pods(rng),
            deployments: generate::deployments(rng),
            services: generate::services(rng),
            nodes: generate::nodes(rng),
            namespaces: generate::namespaces(rng),
            events: generate::events(rng),
            last_refresh: Utc::now(),
            revision: 0,
        }
    }
}

/// In-memory synthetic dataset. Readers get clones taken under a read lock,
/// so a record is never observed half-updated.
pub struct DataStore {
    inner: RwLock<Snapshot>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::generate(&mut rand::thread_rng()))
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self { inner: RwLock::new(snapshot) }
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    pub fn dashboard(&self) -> DashboardMetrics {
        self.read().dashboard
    }

    pub fn clusters(&self) -> Vec<ClusterInfo> {
        self.read().clusters.clone()
    }

    pub fn cluster(&self, name: &str) -> Option<ClusterInfo> {
        self.read().clusters.iter().find(|c| c.name == name).cloned()
    }

    pub fn pods(&self, namespace: Option<&str>) -> Vec<PodInfo> {
        filter_namespace(self.read().pods.clone(), namespace)
    }

    pub fn deployments(&self, namespace: Option<&str>) -> Vec<DeploymentInfo> {
        filter_namespace(self.read().deployments.clone(), namespace)
    }

    pub fn services(&self, namespace: Option<&str>) -> Vec<ServiceInfo> {
        filter_namespace(self.read().services.clone(), namespace)
    }

    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.read().nodes.clone()
    }

    pub fn namespaces(&self) -> Vec<NamespaceInfo> {
        self.read().namespaces.clone()
    }

    pub fn events(&self) -> Vec<EventInfo> {
        self.read().events.clone()
    }

    pub fn last_refresh(&self) -> DateTime<Utc> {
        self.read().last_refresh
    }

    pub fn refresh(&self) {
        self.refresh_with(&mut rand::thread_rng());
    }

    /// Regenerate the dashboard aggregate and churn roughly 30% of pod
    /// cpu/memory readings. Pod identities and every other collection stay
    /// as they are.
    pub fn refresh_with<R: Rng + ?Sized>(&self, rng: &mut R) {
        let dashboard = generate::dashboard_metrics(rng);

        let mut snapshot = self.write();
        snapshot.dashboard = dashboard;
        for pod in snapshot.pods.iter_mut() {
            if rng.gen_bool(PERTURB_PROBABILITY) {
                pod.cpu = generate::pod_cpu(rng);
            }
            if rng.gen_bool(PERTURB_PROBABILITY) {
                pod.memory = generate::pod_memory(rng);
            }
        }
        // Wall clocks can step backwards; readers rely on monotonicity.
        snapshot.last_refresh = snapshot.last_refresh.max(Utc::now());
        snapshot.revision += 1;
        log::debug!("synthetic data refreshed (revision {})", snapshot.revision);
    }

    /// Scale the deployment `namespace/name` in place. Returns false when no
    /// such deployment exists.
    pub fn apply_scale(&self, name: &str, namespace: &str, replicas: u32) -> bool {
        let mut snapshot = self.write();
        match snapshot
            .deployments
            .iter_mut()
            .find(|d| d.name == name && d.namespace == namespace)
        {
            Some(deployment) => {
                deployment.replicas = deployment.replicas.scaled(replicas);
                true
            }
            None => false,
        }
    }

    /// Start the periodic refresher. The first refresh happens one `period`
    /// after start.
    pub fn spawn_refresher(self: &Arc<Self>, period: Duration) -> RefreshHandle {
        let store = Arc::clone(self);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => store.refresh(),
                    _ = &mut stop_rx => break,
                }
            }
            log::debug!("synthetic data refresher stopped");
        });

        RefreshHandle { stop: Some(stop_tx), handle }
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the refresher task; dropping it aborts the task.
pub struct RefreshHandle {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop the refresher and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded_store(seed: u64) -> DataStore {
        DataStore::from_snapshot(Snapshot::generate(&mut StdRng::seed_from_u64(seed)))
    }

    #[test]
    fn test_refresh_keeps_identities_and_other_collections() {
        let store = seeded_store(42);
        let before = store.snapshot();

        let mut rng = StdRng::seed_from_u64(43);
        for _ in 0..5 {
            store.refresh_with(&mut rng);
        }
        let after = store.snapshot();

        let ids = |s: &Snapshot| s.pods.iter().map(|p| (p.name.clone(), p.namespace.clone())).collect::<Vec<_>>();
        assert_eq!(ids(&before), ids(&after));
        assert_eq!(before.clusters, after.clusters);
        assert_eq!(before.deployments, after.deployments);
        assert_eq!(before.services, after.services);
        assert_eq!(before.events, after.events);
        assert_eq!(after.revision, 5);
        assert!(after.last_refresh >= before.last_refresh);

        // Non-volatile pod fields never churn.
        for (a, b) in before.pods.iter().zip(&after.pods) {
            assert_eq!((a.status, a.restarts, &a.age, &a.node), (b.status, b.restarts, &b.age, &b.node));
        }
    }

    #[test]
    fn test_refresh_churns_some_readings() {
        let store = seeded_store(1);
        let before = store.pods(None);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..10 {
            store.refresh_with(&mut rng);
        }
        let after = store.pods(None);
        let changed = before.iter().zip(&after).filter(|(a, b)| a.cpu != b.cpu || a.memory != b.memory).count();
        assert!(changed > 0);
        assert!(after.iter().all(|p| (10..=95).contains(&p.cpu) && (64..=1024).contains(&p.memory)));
    }

    #[test]
    fn test_last_refresh_is_monotonic() {
        let store = seeded_store(3);
        let mut previous = store.last_refresh();
        for _ in 0..20 {
            store.refresh();
            let now = store.last_refresh();
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn test_apply_scale_preserves_invariant() {
        let store = seeded_store(8);
        let targets: Vec<_> = store
            .deployments(None)
            .into_iter()
            .map(|d| (d.name, d.namespace))
            .collect();

        for (i, (name, ns)) in targets.iter().enumerate() {
            let replicas = (i as u32 * 7) % 13;
            assert!(store.apply_scale(name, ns, replicas));
            let dep = store
                .deployments(Some(ns))
                .into_iter()
                .find(|d| &d.name == name)
                .unwrap();
            assert!(dep.replicas.is_consistent(), "{:?}", dep.replicas);
        }
        assert!(store.deployments(None).iter().all(|d| d.replicas.is_consistent()));
    }

    #[test]
    fn test_apply_scale_touches_exactly_one_record() {
        for seed in 0..50 {
            let store = seeded_store(seed);
            let before = store.deployments(None);
            let target = &before[0];
            assert!(store.apply_scale(&target.name, &target.namespace, 0));

            let after = store.deployments(None);
            let matching: Vec<_> = after
                .iter()
                .filter(|d| d.name == target.name && d.namespace == target.namespace)
                .collect();
            assert_eq!(matching.len(), 1, "seed {}", seed);
            assert_eq!(matching[0].replicas.desired, 0);
            assert_eq!(&after[1..], &before[1..]);
        }
    }

    #[test]
    fn test_apply_scale_unknown_is_noop() {
        let store = seeded_store(9);
        let before = store.deployments(None);
        assert!(!store.apply_scale("does-not-exist", "default", 3));
        assert_eq!(before, store.deployments(None));
    }

    #[test]
    fn test_namespace_filter() {
        let store = seeded_store(10);
        for ns in ["default", "monitoring", "database", "nope"] {
            assert!(store.pods(Some(ns)).iter().all(|p| p.namespace == ns));
            assert!(store.deployments(Some(ns)).iter().all(|d| d.namespace == ns));
            assert!(store.services(Some(ns)).iter().all(|s| s.namespace == ns));
        }
        assert!(store.pods(Some("nope")).is_empty());
        assert_eq!(store.pods(None).len(), store.snapshot().pods.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_ticks_until_stopped() {
        let store = Arc::new(seeded_store(12));
        let handle = store.spawn_refresher(Duration::from_secs(30));
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(store.snapshot().revision, 3);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.snapshot().revision, 3);
    }
}
