//! Generators for synthetic cluster data.
//!
//! Every generator takes the RNG explicitly so tests can seed it.

use rand::seq::index;
use rand::Rng;

use crate::models::*;
use crate::utils::{pick, random_age, random_base36, random_tenths};

const K8S_VERSIONS: &[&str] = &["v1.28.2", "v1.28.1", "v1.27.8", "v1.27.5", "v1.26.10"];

const ENVIRONMENTS: &[&str] = &["production", "staging", "development", "testing"];

// Weighted pools: repeated entries raise the odds.
const CLUSTER_STATUSES: &[ClusterStatus] = &[
    ClusterStatus::Healthy,
    ClusterStatus::Healthy,
    ClusterStatus::Healthy,
    ClusterStatus::Warning,
    ClusterStatus::Error,
];
const POD_PHASES: &[PodPhase] = &[
    PodPhase::Running,
    PodPhase::Running,
    PodPhase::Running,
    PodPhase::Pending,
    PodPhase::Failed,
];
const DEPLOYMENT_STATUSES: &[DeploymentStatus] = &[
    DeploymentStatus::Available,
    DeploymentStatus::Available,
    DeploymentStatus::Progressing,
    DeploymentStatus::ReplicaFailure,
];

const POD_NAMESPACES: &[&str] = &["default", "kube-system", "monitoring", "database", "apps"];
const POD_PREFIXES: &[&str] = &[
    "frontend-web", "backend-api", "database", "redis-cache", "worker-queue",
    "nginx-ingress", "prometheus", "grafana", "elasticsearch", "kibana",
    "mongodb", "mysql", "postgres", "rabbitmq", "kafka",
];

const DEPLOYMENT_NAMESPACES: &[&str] = &["default", "apps", "monitoring", "database"];
const IMAGES: &[&str] = &[
    "nginx:1.21", "node:18-alpine", "redis:7-alpine", "postgres:14",
    "mongodb:5.0", "grafana/grafana:latest", "prometheus/prometheus:latest",
    "elasticsearch:8.5.0", "rabbitmq:3.11-management", "mysql:8.0",
];
const DEPLOYMENT_NAMES: &[&str] = &[
    "frontend-web", "backend-api", "user-service", "notification-service",
    "payment-gateway", "order-processor", "inventory-manager", "analytics-engine",
    "file-uploader", "email-service", "auth-service", "database-migrator",
];

const SERVICE_NAMESPACES: &[&str] = &["default", "kube-system", "monitoring", "database"];
const SERVICE_TYPES: &[ServiceType] = &[
    ServiceType::ClusterIP,
    ServiceType::NodePort,
    ServiceType::LoadBalancer,
    ServiceType::ExternalName,
];
const PROTOCOLS: &[&str] = &["TCP", "UDP", "SCTP"];
const SERVICE_NAMES: &[&str] = &[
    "frontend-service", "backend-service", "database-service", "cache-service",
    "api-gateway", "load-balancer", "monitoring-service", "logging-service",
    "webhook-service", "notification-hub", "file-storage", "user-management",
];

const NAMESPACE_NAMES: &[&str] = &[
    "default", "kube-system", "kube-public", "kube-node-lease",
    "monitoring", "logging", "database", "apps", "ingress-nginx",
];

const EVENT_TYPES: &[EventType] = &[EventType::Normal, EventType::Warning, EventType::Error];
const EVENT_REASONS: &[&str] = &[
    "Scheduled", "Pulling", "Pulled", "Created", "Started",
    "Failed", "FailedMount", "Unhealthy", "BackOff", "Killing",
];
const EVENT_OBJECTS: &[&str] = &[
    "Pod/frontend-web-", "Deployment/backend-api", "Service/database-service",
    "Node/worker-node-", "Ingress/api-gateway", "Secret/app-secrets",
];

pub const POD_CPU_RANGE: (u32, u32) = (10, 95);
pub const POD_MEMORY_RANGE: (u32, u32) = (64, 1024);

pub fn dashboard_metrics<R: Rng + ?Sized>(rng: &mut R) -> DashboardMetrics {
    DashboardMetrics {
        clusters: rng.gen_range(2..=5),
        nodes: rng.gen_range(15..=50),
        pods: rng.gen_range(80..=200),
        services: rng.gen_range(20..=60),
        deployments: rng.gen_range(25..=80),
    }
}

/// A prefix of the environment pool, so names never repeat.
pub fn clusters<R: Rng + ?Sized>(rng: &mut R) -> Vec<ClusterInfo> {
    let count = rng.gen_range(2..=ENVIRONMENTS.len());
    ENVIRONMENTS[..count]
        .iter()
        .map(|env| ClusterInfo {
            name: env.to_string(),
            status: *pick(rng, CLUSTER_STATUSES),
            nodes: rng.gen_range(2..=20),
            pods: rng.gen_range(5..=80),
            cpu: rng.gen_range(20..=90),
            memory: rng.gen_range(30..=85),
            version: Some(pick(rng, K8S_VERSIONS).to_string()),
            endpoint: Some(format!("https://{}-k8s.kubeasy.com", env)),
        })
        .collect()
}

pub fn pod_cpu<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(POD_CPU_RANGE.0..=POD_CPU_RANGE.1)
}

pub fn pod_memory<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(POD_MEMORY_RANGE.0..=POD_MEMORY_RANGE.1)
}

pub fn pods<R: Rng + ?Sized>(rng: &mut R) -> Vec<PodInfo> {
    let count = rng.gen_range(15..=40);
    (0..count)
        .map(|_| PodInfo {
            name: format!("{}-{}", pick(rng, POD_PREFIXES), random_base36(rng, 13)),
            namespace: pick(rng, POD_NAMESPACES).to_string(),
            status: *pick(rng, POD_PHASES),
            restarts: rng.gen_range(0..=5),
            age: random_age(rng),
            cpu: pod_cpu(rng),
            memory: pod_memory(rng),
            node: Some(format!("worker-node-{}", rng.gen_range(1..=10))),
        })
        .collect()
}

/// `count` distinct (name, namespace) pairs drawn from the product of the two
/// pools, so no two records share an identity.
fn distinct_keys<R: Rng + ?Sized>(
    rng: &mut R,
    names: &[&str],
    namespaces: &[&str],
    count: usize,
) -> Vec<(String, String)> {
    let total = names.len() * namespaces.len();
    index::sample(rng, total, count.min(total))
        .into_iter()
        .map(|i| {
            let (name, namespace) = (i / namespaces.len(), i % namespaces.len());
            (names[name].to_string(), namespaces[namespace].to_string())
        })
        .collect()
}

/// `available <= current <= desired`, each at least 1.
pub fn replica_counts<R: Rng + ?Sized>(rng: &mut R) -> ReplicaCounts {
    let desired: u32 = rng.gen_range(1..=10);
    let current = rng.gen_range(desired.saturating_sub(2).max(1)..=desired);
    let available = rng.gen_range(current.saturating_sub(1).max(1)..=current);
    ReplicaCounts { desired, current, available }
}

pub fn deployments<R: Rng + ?Sized>(rng: &mut R) -> Vec<DeploymentInfo> {
    let count = rng.gen_range(8..=20);
    distinct_keys(rng, DEPLOYMENT_NAMES, DEPLOYMENT_NAMESPACES, count)
        .into_iter()
        .map(|(name, namespace)| DeploymentInfo {
            name,
            namespace,
            replicas: replica_counts(rng),
            status: *pick(rng, DEPLOYMENT_STATUSES),
            age: random_age(rng),
            image: pick(rng, IMAGES).to_string(),
        })
        .collect()
}

pub fn services<R: Rng + ?Sized>(rng: &mut R) -> Vec<ServiceInfo> {
    let count = rng.gen_range(10..=25);
    distinct_keys(rng, SERVICE_NAMES, SERVICE_NAMESPACES, count)
        .into_iter()
        .map(|(name, namespace)| {
            let type_ = *pick(rng, SERVICE_TYPES);
            let external_ip = (type_ == ServiceType::LoadBalancer && rng.gen_bool(0.5))
                .then(|| format!("203.0.113.{}", rng.gen_range(1..=255)));
            let port_count = rng.gen_range(1..=3);
            ServiceInfo {
                name,
                namespace,
                type_,
                cluster_ip: format!(
                    "10.{}.{}.{}",
                    rng.gen_range(96..=99),
                    rng.gen_range(1..=255),
                    rng.gen_range(1..=255)
                ),
                external_ip,
                ports: (0..port_count)
                    .map(|_| ServicePort {
                        port: rng.gen_range(80..=9999),
                        target_port: rng.gen_range(3000..=8080),
                        protocol: pick(rng, PROTOCOLS).to_string(),
                    })
                    .collect(),
                age: random_age(rng),
            }
        })
        .collect()
}

/// The first node is the control plane.
pub fn nodes<R: Rng + ?Sized>(rng: &mut R) -> Vec<NodeInfo> {
    let count = rng.gen_range(3..=15);
    (0..count)
        .map(|i| NodeInfo {
            name: format!("worker-node-{}", i + 1),
            status: if rng.gen_bool(0.9) { NodeStatus::Ready } else { NodeStatus::NotReady },
            roles: if i == 0 {
                vec!["control-plane".to_string(), "master".to_string()]
            } else {
                vec!["worker".to_string()]
            },
            age: random_age(rng),
            version: pick(rng, K8S_VERSIONS).to_string(),
            cpu: format!("{} cores", rng.gen_range(2..=16)),
            memory: format!("{}Gi", rng.gen_range(8..=64)),
            cpu_usage: random_tenths(rng, 10.0, 85.0),
            memory_usage: random_tenths(rng, 20.0, 80.0),
        })
        .collect()
}

pub fn namespaces<R: Rng + ?Sized>(rng: &mut R) -> Vec<NamespaceInfo> {
    NAMESPACE_NAMES
        .iter()
        .map(|name| NamespaceInfo {
            name: name.to_string(),
            status: "Active".to_string(),
            age: random_age(rng),
            pods: rng.gen_range(0..=20),
            services: rng.gen_range(0..=10),
        })
        .collect()
}

pub fn events<R: Rng + ?Sized>(rng: &mut R) -> Vec<EventInfo> {
    let count = rng.gen_range(20..=50);
    (0..count)
        .map(|_| EventInfo {
            type_: *pick(rng, EVENT_TYPES),
            reason: pick(rng, EVENT_REASONS).to_string(),
            object: format!("{}{}", pick(rng, EVENT_OBJECTS), random_base36(rng, 6)),
            message: format!("Mock event message for {}", pick(rng, EVENT_REASONS)),
            age: random_age(rng),
            count: rng.gen_range(1..=10),
        })
        .collect()
}
