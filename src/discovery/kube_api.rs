//! Kubernetes-API discovery mode: lists workloads directly from the
//! apiserver via `kube::Api`, extracting containers and HPA targets per
//! kind the way `BaseKindLoader` subclasses do for each workload kind.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Container, PodSpec};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::{Api, Client};
use serde_json::Value;
use tracing::warn;

use crate::model::{HpaSpec, PodRef, ResourceAllocations, Workload, WorkloadKind};

use super::objectlike::ObjectLikeDict;
use super::selector::build_selector_query;
use super::WorkloadLoader;

/// Chains a pod template's init containers ahead of its regular containers,
/// since `Init containers MUST be included` and a recommendation is
/// produced per container regardless of which list it came from.
fn containers_including_init(spec: &PodSpec) -> impl Iterator<Item = &Container> {
    spec.init_containers.iter().flatten().chain(spec.containers.iter())
}

/// `true` if a Job's `ownerReferences` names a CronJob — such Jobs are
/// scanned as part of their parent and must not also appear standalone.
fn owned_by_cronjob(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> bool {
    meta.owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.kind == "CronJob"))
}

/// `true` if a dynamic-object list/get call failed because the kind isn't
/// installed or reachable in this cluster (CRD missing, RBAC denies it).
/// Such kinds are disabled for the remainder of this run only.
fn is_kind_unavailable(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if matches!(resp.code, 400 | 401 | 403 | 404))
}

pub struct KubeApiWorkloadLoader {
    client: Client,
    namespace: Option<String>,
}

impl KubeApiWorkloadLoader {
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        KubeApiWorkloadLoader { client, namespace }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope>
            + Clone
            + std::fmt::Debug
            + for<'de> serde::Deserialize<'de>,
        K::DynamicType: Default,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn hpa_for(&self, namespace: &str, kind: &str, name: &str) -> Option<HpaSpec> {
        let hpas: Api<HorizontalPodAutoscaler> = Api::namespaced(self.client.clone(), namespace);
        let list = hpas.list(&ListParams::default()).await.ok()?;
        list.items.into_iter().find_map(|hpa| {
            let spec = hpa.spec.as_ref()?;
            let target = &spec.scale_target_ref;
            if target.kind != kind || target.name != name {
                return None;
            }
            let metrics = spec.metrics.as_ref();
            let mut cpu_target = None;
            let mut mem_target = None;
            if let Some(metrics) = metrics {
                for m in metrics {
                    if let Some(resource) = &m.resource {
                        let util = resource
                            .target
                            .average_utilization;
                        match resource.name.as_str() {
                            "cpu" => cpu_target = util,
                            "memory" => mem_target = util,
                            _ => {}
                        }
                    }
                }
            }
            Some(HpaSpec {
                target_cpu_utilization_percentage: cpu_target,
                target_memory_utilization_percentage: mem_target,
            })
        })
    }

    async fn pods_for_selector(&self, namespace: &str, selector_json: &serde_json::Value) -> Vec<PodRef> {
        let Some(query) = build_selector_query(selector_json) else {
            return Vec::new();
        };
        let pods: Api<k8s_openapi::api::core::v1::Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&query);
        match pods.list(&params).await {
            Ok(list) => list
                .items
                .into_iter()
                .filter_map(|p| p.metadata.name)
                .map(|name| PodRef { name, deleted: false })
                .collect(),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "failed to list pods for selector");
                Vec::new()
            }
        }
    }

    fn dynamic_api(&self, ar: &ApiResource) -> Api<DynamicObject> {
        match &self.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, ar),
            None => Api::all_with(self.client.clone(), ar),
        }
    }

    /// Lists a dynamic/custom-object workload kind, tolerating a cluster
    /// that doesn't have it installed or reachable (CRD missing, RBAC
    /// denies it) by disabling that kind for the rest of this run.
    async fn list_dynamic_kind(&self, kind: &'static str, ar: &ApiResource) -> Vec<DynamicObject> {
        match self.dynamic_api(ar).list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(e) if is_kind_unavailable(&e) => {
                warn!(kind, error = %e, "custom resource kind unavailable, skipping for this run");
                Vec::new()
            }
            Err(e) => {
                warn!(kind, error = %e, "failed to list custom resource kind");
                Vec::new()
            }
        }
    }

    async fn list_rollouts(&self, workloads: &mut Vec<Workload>) {
        let gvk = GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Rollout");
        let ar = ApiResource::from_gvk_with_plural(&gvk, "rollouts");
        for obj in self.list_dynamic_kind("Rollout", &ar).await {
            let Some(name) = obj.metadata.name.clone() else { continue };
            let namespace = obj.metadata.namespace.clone().unwrap_or_default();
            let Some(spec) = ObjectLikeDict(&obj.data).get("spec") else { continue };
            let hpa = self.hpa_for(&namespace, "Rollout", &name).await;
            for (container_name, allocations) in containers_from_template(&ObjectLikeDict(spec)) {
                workloads.push(Workload {
                    cluster: None,
                    namespace: namespace.clone(),
                    kind: WorkloadKind::Rollout,
                    name: name.clone(),
                    container: container_name,
                    allocations,
                    hpa: hpa.clone(),
                    pods: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        }
    }

    async fn list_deployment_configs(&self, workloads: &mut Vec<Workload>) {
        let gvk = GroupVersionKind::gvk("apps.openshift.io", "v1", "DeploymentConfig");
        let ar = ApiResource::from_gvk_with_plural(&gvk, "deploymentconfigs");
        for obj in self.list_dynamic_kind("DeploymentConfig", &ar).await {
            let Some(name) = obj.metadata.name.clone() else { continue };
            let namespace = obj.metadata.namespace.clone().unwrap_or_default();
            let Some(spec) = ObjectLikeDict(&obj.data).get("spec") else { continue };
            let hpa = self.hpa_for(&namespace, "DeploymentConfig", &name).await;
            for (container_name, allocations) in containers_from_template(&ObjectLikeDict(spec)) {
                workloads.push(Workload {
                    cluster: None,
                    namespace: namespace.clone(),
                    kind: WorkloadKind::DeploymentConfig,
                    name: name.clone(),
                    container: container_name,
                    allocations,
                    hpa: hpa.clone(),
                    pods: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        }
    }

    /// StrimziPodSet carries one pod template per broker under `spec.pods`;
    /// all brokers share the same container shape, so only the first is read.
    async fn list_strimzi_pod_sets(&self, workloads: &mut Vec<Workload>) {
        let gvk = GroupVersionKind::gvk("core.strimzi.io", "v1beta2", "StrimziPodSet");
        let ar = ApiResource::from_gvk_with_plural(&gvk, "strimzipodsets");
        for obj in self.list_dynamic_kind("StrimziPodSet", &ar).await {
            let Some(name) = obj.metadata.name.clone() else { continue };
            let namespace = obj.metadata.namespace.clone().unwrap_or_default();
            let dict = ObjectLikeDict(&obj.data);
            let Some(pods) = dict.get("spec").and_then(|s| ObjectLikeDict(s).get("pods")).and_then(Value::as_array) else {
                continue;
            };
            let Some(first_pod_spec) = pods.first().and_then(|p| ObjectLikeDict(p).get("spec")) else { continue };
            for (container_name, allocations) in containers_from_pod_spec_dict(&ObjectLikeDict(first_pod_spec)) {
                workloads.push(Workload {
                    cluster: None,
                    namespace: namespace.clone(),
                    kind: WorkloadKind::StrimziPodSet,
                    name: name.clone(),
                    container: container_name,
                    allocations,
                    hpa: None,
                    pods: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        }
    }
}

/// Pulls `template.spec.{initContainers ∪ containers}` out of a loosely
/// typed dynamic object's `spec`, accepting both spellings.
fn containers_from_template(spec: &ObjectLikeDict) -> Vec<(String, ResourceAllocations)> {
    let Some(template) = spec.get("template") else { return Vec::new() };
    let Some(pod_spec) = ObjectLikeDict(template).get("spec") else { return Vec::new() };
    containers_from_pod_spec_dict(&ObjectLikeDict(pod_spec))
}

/// Reads init containers ahead of regular containers from a loosely typed
/// pod spec, preferring the snake_case key when both are present (the
/// dynamic-object path may carry either spelling).
fn containers_from_pod_spec_dict(pod_spec: &ObjectLikeDict) -> Vec<(String, ResourceAllocations)> {
    let mut out = Vec::new();
    for key in ["init_containers", "containers"] {
        if let Some(list) = pod_spec.get(key).and_then(Value::as_array) {
            for container in list {
                let container = ObjectLikeDict(container);
                let Some(name) = container.get_str("name") else { continue };
                out.push((name.to_string(), resource_allocations_from_dict(&container)));
            }
        }
    }
    out
}

fn resource_allocations_from_dict(container: &ObjectLikeDict) -> ResourceAllocations {
    use crate::model::{parse_resource_value, ResourceType};

    let mut requests = std::collections::BTreeMap::new();
    let mut limits = std::collections::BTreeMap::new();
    let Some(resources) = container.get("resources") else {
        return ResourceAllocations { requests, limits };
    };
    let resources = ObjectLikeDict(resources);
    if let Some(req) = resources.get("requests") {
        let req = ObjectLikeDict(req);
        requests.insert(ResourceType::Cpu, parse_resource_value(req.get_str("cpu"), ResourceType::Cpu));
        requests.insert(ResourceType::Memory, parse_resource_value(req.get_str("memory"), ResourceType::Memory));
    }
    if let Some(lim) = resources.get("limits") {
        let lim = ObjectLikeDict(lim);
        limits.insert(ResourceType::Cpu, parse_resource_value(lim.get_str("cpu"), ResourceType::Cpu));
        limits.insert(ResourceType::Memory, parse_resource_value(lim.get_str("memory"), ResourceType::Memory));
    }
    ResourceAllocations { requests, limits }
}

#[async_trait::async_trait]
impl WorkloadLoader for KubeApiWorkloadLoader {
    async fn list_workloads(&self) -> anyhow::Result<Vec<Workload>> {
        let mut workloads = Vec::new();

        let deployments: Api<Deployment> = self.api();
        for d in deployments.list(&ListParams::default()).await?.items {
            let Some(name) = d.metadata.name.clone() else { continue };
            let namespace = d.metadata.namespace.clone().unwrap_or_default();
            let Some(spec) = &d.spec else { continue };
            let Some(template_spec) = &spec.template.spec else { continue };
            let hpa = self.hpa_for(&namespace, "Deployment", &name).await;
            let selector_json = serde_json::to_value(&spec.selector).unwrap_or_default();
            let pods = self.pods_for_selector(&namespace, &selector_json).await;

            for container in containers_including_init(template_spec) {
                workloads.push(Workload {
                    cluster: None,
                    namespace: namespace.clone(),
                    kind: WorkloadKind::Deployment,
                    name: name.clone(),
                    container: container.name.clone(),
                    allocations: ResourceAllocations::from_container(container),
                    hpa: hpa.clone(),
                    pods: pods.clone(),
                    warnings: Vec::new(),
                });
            }
        }

        let statefulsets: Api<StatefulSet> = self.api();
        for s in statefulsets.list(&ListParams::default()).await?.items {
            let Some(name) = s.metadata.name.clone() else { continue };
            let namespace = s.metadata.namespace.clone().unwrap_or_default();
            let Some(spec) = &s.spec else { continue };
            let Some(template_spec) = &spec.template.spec else { continue };
            let hpa = self.hpa_for(&namespace, "StatefulSet", &name).await;

            for container in containers_including_init(template_spec) {
                workloads.push(Workload {
                    cluster: None,
                    namespace: namespace.clone(),
                    kind: WorkloadKind::StatefulSet,
                    name: name.clone(),
                    container: container.name.clone(),
                    allocations: ResourceAllocations::from_container(container),
                    hpa: hpa.clone(),
                    pods: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        }

        let daemonsets: Api<DaemonSet> = self.api();
        for d in daemonsets.list(&ListParams::default()).await?.items {
            let Some(name) = d.metadata.name.clone() else { continue };
            let namespace = d.metadata.namespace.clone().unwrap_or_default();
            let Some(spec) = &d.spec else { continue };
            let Some(template_spec) = &spec.template.spec else { continue };

            for container in containers_including_init(template_spec) {
                workloads.push(Workload {
                    cluster: None,
                    namespace: namespace.clone(),
                    kind: WorkloadKind::DaemonSet,
                    name: name.clone(),
                    container: container.name.clone(),
                    allocations: ResourceAllocations::from_container(container),
                    hpa: None, // DaemonSets are not HPA-scalable
                    pods: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        }

        let jobs: Api<Job> = self.api();
        for j in jobs.list(&ListParams::default()).await?.items {
            if owned_by_cronjob(&j.metadata) {
                continue;
            }
            let Some(name) = j.metadata.name.clone() else { continue };
            let namespace = j.metadata.namespace.clone().unwrap_or_default();
            let Some(spec) = &j.spec else { continue };
            let Some(template_spec) = &spec.template.spec else { continue };

            for container in containers_including_init(template_spec) {
                workloads.push(Workload {
                    cluster: None,
                    namespace: namespace.clone(),
                    kind: WorkloadKind::Job,
                    name: name.clone(),
                    container: container.name.clone(),
                    allocations: ResourceAllocations::from_container(container),
                    hpa: None,
                    pods: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        }

        let cronjobs: Api<CronJob> = self.api();
        for c in cronjobs.list(&ListParams::default()).await?.items {
            let Some(name) = c.metadata.name.clone() else { continue };
            let namespace = c.metadata.namespace.clone().unwrap_or_default();
            let Some(spec) = &c.spec else { continue };
            let Some(template_spec) = &spec.job_template.spec.as_ref().and_then(|s| s.template.spec.clone()) else {
                continue;
            };

            for container in containers_including_init(template_spec) {
                workloads.push(Workload {
                    cluster: None,
                    namespace: namespace.clone(),
                    kind: WorkloadKind::CronJob,
                    name: name.clone(),
                    container: container.name.clone(),
                    allocations: ResourceAllocations::from_container(container),
                    hpa: None,
                    pods: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        }

        self.list_rollouts(&mut workloads).await;
        self.list_deployment_configs(&mut workloads).await;
        self.list_strimzi_pod_sets(&mut workloads).await;

        Ok(workloads)
    }
}
