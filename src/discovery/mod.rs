//! Workload discovery: finding workloads to recommend for, in either
//! Kubernetes-API mode (ask the apiserver directly) or Prometheus-as-source-
//! of-truth mode (reconstruct workload identity from what cAdvisor/kube-state-
//! metrics have reported, for clusters the tool has metrics access to but not
//! API access to).
//!
//! Grounded on `robusta_krr/core/integrations/kubernetes/cluster_loader/loaders/base.py`
//! (API mode) and `kubernetes/workload_loader/prometheus/*` (Prometheus mode).

pub mod kube_api;
pub mod objectlike;
pub mod prometheus_mode;
pub mod selector;

use crate::model::Workload;

/// Common discovery contract both modes implement: produce the set of
/// workloads to evaluate. Kept intentionally small — the loaders differ
/// enough internally (kube::Api vs PromQL group-by queries) that a richer
/// shared trait would just be ceremony.
#[async_trait::async_trait]
pub trait WorkloadLoader: Send + Sync {
    async fn list_workloads(&self) -> anyhow::Result<Vec<Workload>>;
}
