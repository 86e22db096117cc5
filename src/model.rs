//! Core data model shared across discovery, strategy, and enforcement.
//!
//! Grounded on `robusta_krr/core/models/{allocations,objects,severity}.py`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "cpu")]
    Cpu,
    #[serde(rename = "memory")]
    Memory,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Cpu => write!(f, "cpu"),
            ResourceType::Memory => write!(f, "memory"),
        }
    }
}

/// A resource allocation value. `Unknown` is the `"?"` sentinel the original
/// uses to mean "a recommendation could not be computed", distinct from
/// `Absent`, which means the container simply has no request/limit set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecommendationValue {
    Value(f64),
    #[serde(rename = "?")]
    Unknown,
    Absent,
}

impl RecommendationValue {
    pub fn as_value(&self) -> Option<f64> {
        match self {
            RecommendationValue::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, RecommendationValue::Unknown)
    }
}

/// Parses a raw Kubernetes quantity string for a given resource type into a
/// `RecommendationValue`, matching
/// `allocations.py::ResourceAllocations.__parse_resource_value`.
pub fn parse_resource_value(raw: Option<&str>, resource_type: ResourceType) -> RecommendationValue {
    let Some(raw) = raw else {
        return RecommendationValue::Absent;
    };
    let parsed = match resource_type {
        ResourceType::Cpu => crate::units::parse_cpu(raw),
        ResourceType::Memory => crate::units::parse_memory(raw),
    };
    match parsed {
        Some(v) if v.is_nan() => RecommendationValue::Unknown,
        Some(v) => RecommendationValue::Value(v),
        None => RecommendationValue::Unknown,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceAllocations {
    pub requests: BTreeMap<ResourceType, RecommendationValue>,
    pub limits: BTreeMap<ResourceType, RecommendationValue>,
}

impl ResourceAllocations {
    pub fn from_container(container: &k8s_openapi::api::core::v1::Container) -> Self {
        let mut requests = BTreeMap::new();
        let mut limits = BTreeMap::new();

        if let Some(resources) = &container.resources {
            if let Some(req) = &resources.requests {
                requests.insert(
                    ResourceType::Cpu,
                    parse_resource_value(req.get("cpu").map(|q| q.0.as_str()), ResourceType::Cpu),
                );
                requests.insert(
                    ResourceType::Memory,
                    parse_resource_value(req.get("memory").map(|q| q.0.as_str()), ResourceType::Memory),
                );
            }
            if let Some(lim) = &resources.limits {
                limits.insert(
                    ResourceType::Cpu,
                    parse_resource_value(lim.get("cpu").map(|q| q.0.as_str()), ResourceType::Cpu),
                );
                limits.insert(
                    ResourceType::Memory,
                    parse_resource_value(lim.get("memory").map(|q| q.0.as_str()), ResourceType::Memory),
                );
            }
        }

        ResourceAllocations { requests, limits }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
    CronJob,
    Rollout,
    DeploymentConfig,
    StrimziPodSet,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::Job => "Job",
            WorkloadKind::CronJob => "CronJob",
            WorkloadKind::Rollout => "Rollout",
            WorkloadKind::DeploymentConfig => "DeploymentConfig",
            WorkloadKind::StrimziPodSet => "StrimziPodSet",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct PodRef {
    pub name: String,
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct HpaSpec {
    pub target_cpu_utilization_percentage: Option<i32>,
    pub target_memory_utilization_percentage: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct Workload {
    pub cluster: Option<String>,
    pub namespace: String,
    pub kind: WorkloadKind,
    pub name: String,
    pub container: String,
    pub allocations: ResourceAllocations,
    pub hpa: Option<HpaSpec>,
    pub pods: Vec<PodRef>,
    pub warnings: Vec<String>,
}

impl Workload {
    /// Number of pods still live, matching `K8sObjectData.current_pods_count`.
    pub fn current_pods_count(&self) -> usize {
        self.pods.iter().filter(|p| !p.deleted).count()
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.namespace, self.kind, self.name, self.container
        )
    }
}

/// Timestamp/value samples per pod, as returned by a metric query.
pub type MetricSeries = BTreeMap<String, Vec<(f64, f64)>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub request: RecommendationValue,
    pub limit: RecommendationValue,
    pub info: Option<String>,
}

impl Recommendation {
    pub fn undefined(info: impl Into<String>) -> Self {
        Recommendation {
            request: RecommendationValue::Unknown,
            limit: RecommendationValue::Unknown,
            info: Some(info.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadKey {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContainerRecommendation {
    pub cpu: Option<Recommendation>,
    pub memory: Option<Recommendation>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkloadRecommendation {
    pub workload_key: String,
    pub container_recommendations: BTreeMap<String, ContainerRecommendation>,
}

impl WorkloadRecommendation {
    pub fn get(&self, container: &str) -> Option<&ContainerRecommendation> {
        self.container_recommendations.get(container)
    }
}

pub type WorkloadRecommendationMap = std::collections::HashMap<WorkloadKey, WorkloadRecommendation>;
