//! Prometheus-as-source-of-truth discovery: reconstructs workload identity
//! from label groupings on kube-state-metrics series, for clusters where the
//! tool has metrics access but not API access.
//!
//! Grounded on `workload_loader/prometheus/loaders/double_parent.py`'s
//! "double parent" resolution: a Deployment owns a ReplicaSet, which owns
//! Pods, and neither hop is visible on the Pod directly, so the join is
//! walked one label-metric at a time (`kube_<subowner>_owner` then
//! `kube_pod_owner`) instead of via `ownerReferences`. `loaders/base.py`'s
//! `_list_containers`/`__parse_allocation` ground the container and
//! resource-allocation lookups.

use std::collections::{BTreeMap, BTreeSet};

use crate::metrics_query::client::PrometheusClient;
use crate::model::{PodRef, RecommendationValue, ResourceAllocations, ResourceType, Workload, WorkloadKind};

use super::WorkloadLoader;

/// A workload kind whose Pods are owned one hop removed, through a
/// `SubOwner` kind (ReplicaSet, ReplicationController, or Job) rather than
/// directly. Mirrors `DoubleParentLoader.kind_subowner_map`.
struct DoubleParentKind {
    kind: WorkloadKind,
    owner_kind_label: &'static str,
    subowner_kind_label: &'static str,
    subowner_metric: &'static str,
    subowner_metric_label: &'static str,
}

const DOUBLE_PARENT_KINDS: &[DoubleParentKind] = &[
    DoubleParentKind {
        kind: WorkloadKind::Deployment,
        owner_kind_label: "Deployment",
        subowner_kind_label: "ReplicaSet",
        subowner_metric: "kube_replicaset_owner",
        subowner_metric_label: "replicaset",
    },
    DoubleParentKind {
        kind: WorkloadKind::Rollout,
        owner_kind_label: "Rollout",
        subowner_kind_label: "ReplicaSet",
        subowner_metric: "kube_replicaset_owner",
        subowner_metric_label: "replicaset",
    },
    DoubleParentKind {
        kind: WorkloadKind::DeploymentConfig,
        owner_kind_label: "DeploymentConfig",
        subowner_kind_label: "ReplicationController",
        subowner_metric: "kube_replicationcontroller_owner",
        subowner_metric_label: "replicationcontroller",
    },
    DoubleParentKind {
        kind: WorkloadKind::CronJob,
        owner_kind_label: "CronJob",
        subowner_kind_label: "Job",
        subowner_metric: "kube_job_owner",
        subowner_metric_label: "job_name",
    },
];

/// Workload kinds whose Pods are owned directly (one hop, straight to
/// `kube_pod_owner`), with no intervening ReplicaSet/ReplicationController.
const SINGLE_PARENT_KINDS: &[(WorkloadKind, &str)] = &[
    (WorkloadKind::StatefulSet, "StatefulSet"),
    (WorkloadKind::DaemonSet, "DaemonSet"),
    (WorkloadKind::Job, "Job"),
    (WorkloadKind::StrimziPodSet, "StrimziPodSet"),
];

fn resource_type_from_label(label: &str) -> Option<ResourceType> {
    match label {
        "cpu" => Some(ResourceType::Cpu),
        "memory" => Some(ResourceType::Memory),
        _ => None,
    }
}

pub struct PrometheusWorkloadLoader {
    client: PrometheusClient,
    cluster_label: Option<String>,
}

impl PrometheusWorkloadLoader {
    pub fn new(client: PrometheusClient, cluster_label: Option<String>) -> Self {
        PrometheusWorkloadLoader { client, cluster_label }
    }

    fn cluster_selector(&self) -> String {
        self.cluster_label
            .as_ref()
            .map(|l| format!(", cluster=\"{l}\""))
            .unwrap_or_default()
    }

    /// Finds every (namespace, owner_name) pair of a given kind, together
    /// with the subowner names (ReplicaSet/ReplicationController/Job) that
    /// sit between it and its Pods.
    async fn subowners_by_owner(&self, dp: &DoubleParentKind) -> BTreeMap<(String, String), Vec<String>> {
        let query = format!(
            "count by (namespace, owner_name, {label}, owner_kind) ({metric}{{owner_kind=\"{kind}\"{cluster}}})",
            label = dp.subowner_metric_label,
            metric = dp.subowner_metric,
            kind = dp.owner_kind_label,
            cluster = self.cluster_selector(),
        );
        let samples = self.client.instant_query(&query).await.unwrap_or_default();

        let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for sample in samples {
            let (Some(ns), Some(owner_name), Some(sub)) = (
                sample.labels.get("namespace"),
                sample.labels.get("owner_name"),
                sample.labels.get(dp.subowner_metric_label),
            ) else {
                continue;
            };
            grouped.entry((ns.clone(), owner_name.clone())).or_default().push(sub.clone());
        }
        grouped
    }

    /// Resolves the Pod names owned (directly or via `subowner_kind`) by the
    /// given names, via `kube_pod_owner`.
    async fn pods_by_owner(&self, namespace: &str, owner_names: &[String], owner_kind: &str) -> Vec<String> {
        if owner_names.is_empty() {
            return Vec::new();
        }
        let owner_selector = owner_names.join("|");
        let query = format!(
            "count by (pod) (kube_pod_owner{{namespace=\"{namespace}\", owner_name=~\"{owner_selector}\", owner_kind=\"{owner_kind}\"{cluster}}})",
            cluster = self.cluster_selector(),
        );
        let samples = self.client.instant_query(&query).await.unwrap_or_default();
        samples.into_iter().filter_map(|s| s.labels.get("pod").cloned()).collect()
    }

    /// Lists the distinct containers reporting inside the given Pods.
    async fn containers_in_pods(&self, namespace: &str, pod_names: &[String]) -> Vec<String> {
        if pod_names.is_empty() {
            return Vec::new();
        }
        let pod_selector = pod_names.join("|");
        let query = format!(
            "count by (container) (kube_pod_container_info{{namespace=\"{namespace}\", pod=~\"{pod_selector}\", container!=\"\"}})"
        );
        let samples = self.client.instant_query(&query).await.unwrap_or_default();
        samples.into_iter().filter_map(|s| s.labels.get("container").cloned()).collect()
    }

    /// `__parse_allocation`: averages `kube_pod_container_resource_{requests,limits}`
    /// per container across the given Pods.
    async fn allocations_by_container(&self, namespace: &str, pod_names: &[String]) -> BTreeMap<String, ResourceAllocations> {
        let mut by_container: BTreeMap<String, ResourceAllocations> = BTreeMap::new();
        if pod_names.is_empty() {
            return by_container;
        }
        let pod_selector = pod_names.join("|");

        let requests = self
            .client
            .instant_query(&format!(
                "avg by (container, resource) (kube_pod_container_resource_requests{{namespace=\"{namespace}\", pod=~\"{pod_selector}\", container!=\"\"}})"
            ))
            .await
            .unwrap_or_default();
        for sample in requests {
            let (Some(container), Some(resource)) =
                (sample.labels.get("container"), sample.labels.get("resource").and_then(|r| resource_type_from_label(r)))
            else {
                continue;
            };
            by_container
                .entry(container.clone())
                .or_default()
                .requests
                .insert(resource, RecommendationValue::Value(sample.value));
        }

        let limits = self
            .client
            .instant_query(&format!(
                "avg by (container, resource) (kube_pod_container_resource_limits{{namespace=\"{namespace}\", pod=~\"{pod_selector}\", container!=\"\"}})"
            ))
            .await
            .unwrap_or_default();
        for sample in limits {
            let (Some(container), Some(resource)) =
                (sample.labels.get("container"), sample.labels.get("resource").and_then(|r| resource_type_from_label(r)))
            else {
                continue;
            };
            by_container
                .entry(container.clone())
                .or_default()
                .limits
                .insert(resource, RecommendationValue::Value(sample.value));
        }

        by_container
    }

    async fn workloads_for_pod_group(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        pod_names: Vec<String>,
        workloads: &mut Vec<Workload>,
    ) {
        if pod_names.is_empty() {
            return;
        }
        let containers = self.containers_in_pods(namespace, &pod_names).await;
        if containers.is_empty() {
            return;
        }
        let allocations = self.allocations_by_container(namespace, &pod_names).await;
        let pods: Vec<PodRef> = pod_names.iter().map(|name| PodRef { name: name.clone(), deleted: false }).collect();

        for container in containers {
            workloads.push(Workload {
                cluster: self.cluster_label.clone(),
                namespace: namespace.to_string(),
                kind: kind.clone(),
                name: name.to_string(),
                container: container.clone(),
                allocations: allocations.get(&container).cloned().unwrap_or_default(),
                hpa: None,
                pods: pods.clone(),
                warnings: Vec::new(),
            });
        }
    }

    async fn list_double_parent_kind(&self, dp: &DoubleParentKind, workloads: &mut Vec<Workload>) {
        for ((namespace, owner_name), subowners) in self.subowners_by_owner(dp).await {
            let pod_names = self.pods_by_owner(&namespace, &subowners, dp.subowner_kind_label).await;
            self.workloads_for_pod_group(dp.kind.clone(), &namespace, &owner_name, pod_names, workloads).await;
        }
    }

    /// Pods owned directly (no subowner hop), optionally skipping owner
    /// names already claimed by another kind (Jobs owned by a CronJob).
    async fn list_single_parent_kind(
        &self,
        kind: WorkloadKind,
        owner_kind_label: &str,
        exclude_owner_names: &BTreeSet<String>,
        workloads: &mut Vec<Workload>,
    ) {
        let query = format!(
            "count by (namespace, owner_name, pod) (kube_pod_owner{{owner_kind=\"{owner_kind_label}\"{cluster}}})",
            cluster = self.cluster_selector(),
        );
        let samples = self.client.instant_query(&query).await.unwrap_or_default();

        let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for sample in samples {
            let (Some(ns), Some(owner_name), Some(pod)) = (
                sample.labels.get("namespace"),
                sample.labels.get("owner_name"),
                sample.labels.get("pod"),
            ) else {
                continue;
            };
            if exclude_owner_names.contains(owner_name) {
                continue;
            }
            grouped.entry((ns.clone(), owner_name.clone())).or_default().push(pod.clone());
        }

        for ((namespace, owner_name), pod_names) in grouped {
            self.workloads_for_pod_group(kind.clone(), &namespace, &owner_name, pod_names, workloads).await;
        }
    }
}

#[async_trait::async_trait]
impl WorkloadLoader for PrometheusWorkloadLoader {
    async fn list_workloads(&self) -> anyhow::Result<Vec<Workload>> {
        let mut workloads = Vec::new();

        // Jobs owned by a CronJob are scanned as part of the CronJob kind
        // (kube_job_owner{owner_kind="CronJob"}); standalone Job discovery
        // below must skip those Job names so they don't appear twice.
        let cronjob_dp = DOUBLE_PARENT_KINDS.iter().find(|dp| dp.kind == WorkloadKind::CronJob).expect("CronJob entry present");
        let cronjob_owned_jobs: BTreeSet<String> =
            self.subowners_by_owner(cronjob_dp).await.into_values().flatten().collect();

        for dp in DOUBLE_PARENT_KINDS {
            self.list_double_parent_kind(dp, &mut workloads).await;
        }

        let no_exclusions = BTreeSet::new();
        for (kind, owner_kind_label) in SINGLE_PARENT_KINDS {
            let exclude = if *kind == WorkloadKind::Job { &cronjob_owned_jobs } else { &no_exclusions };
            self.list_single_parent_kind(kind.clone(), owner_kind_label, exclude, &mut workloads).await;
        }

        Ok(workloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_from_label_recognizes_cpu_and_memory() {
        assert_eq!(resource_type_from_label("cpu"), Some(ResourceType::Cpu));
        assert_eq!(resource_type_from_label("memory"), Some(ResourceType::Memory));
        assert_eq!(resource_type_from_label("ephemeral-storage"), None);
    }

    #[test]
    fn double_parent_kinds_cover_the_documented_four() {
        let kinds: Vec<WorkloadKind> = DOUBLE_PARENT_KINDS.iter().map(|dp| dp.kind.clone()).collect();
        assert!(kinds.contains(&WorkloadKind::Deployment));
        assert!(kinds.contains(&WorkloadKind::Rollout));
        assert!(kinds.contains(&WorkloadKind::DeploymentConfig));
        assert!(kinds.contains(&WorkloadKind::CronJob));
    }

    #[test]
    fn single_parent_kinds_cover_the_documented_four() {
        let kinds: Vec<WorkloadKind> = SINGLE_PARENT_KINDS.iter().map(|(k, _)| k.clone()).collect();
        assert!(kinds.contains(&WorkloadKind::StatefulSet));
        assert!(kinds.contains(&WorkloadKind::DaemonSet));
        assert!(kinds.contains(&WorkloadKind::Job));
        assert!(kinds.contains(&WorkloadKind::StrimziPodSet));
    }
}
