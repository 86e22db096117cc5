//! PromQL templates per metric family, and the job-deduplication filter
//! applied to their results.
//!
//! Grounded on `prometheus/metrics/{base,cpu,memory}.py`: `CPULoader`,
//! `MaxCPULoader`, `MemoryLoader`, `MaxMemoryLoader`, plus `CPUAmountLoader`
//! and `MemoryAmountLoader` (point-count loaders used by the Simple
//! strategy's data-sufficiency gate) and `MaxOOMKilledMemoryLoader`.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Query,
    QueryRange,
}

pub struct MetricFamily {
    pub name: &'static str,
    pub query_type: QueryType,
}

fn cluster_label(cluster: Option<&str>) -> String {
    cluster.map(|c| format!(", cluster=\"{c}\"")).unwrap_or_default()
}

/// `CPULoader`: rate of CPU seconds consumed, bucketed by container/pod/job.
pub fn cpu_loader_query(namespace: &str, pods_selector: &str, container: &str, cluster: Option<&str>) -> String {
    format!(
        "sum(irate(container_cpu_usage_seconds_total{{namespace=\"{namespace}\", pod=~\"{pods_selector}\", container=\"{container}\"{}}}[5m])) by (container, pod, job)",
        cluster_label(cluster)
    )
}

/// `PercentileCPULoader`: same family, queried over time so the strategy can
/// take a percentile client-side over the returned samples.
pub fn percentile_cpu_loader_query(
    namespace: &str,
    pods_selector: &str,
    container: &str,
    cluster: Option<&str>,
) -> String {
    cpu_loader_query(namespace, pods_selector, container, cluster)
}

/// `MemoryLoader`: working-set bytes over time.
pub fn memory_loader_query(namespace: &str, pods_selector: &str, container: &str, cluster: Option<&str>) -> String {
    format!(
        "sum(container_memory_working_set_bytes{{namespace=\"{namespace}\", pod=~\"{pods_selector}\", container=\"{container}\"{}}}) by (container, pod, job, id)",
        cluster_label(cluster)
    )
}

/// `MaxMemoryLoader`: peak working-set bytes over the query resolution
/// window, e.g. `[2d]`.
pub fn max_memory_loader_query(
    namespace: &str,
    pods_selector: &str,
    container: &str,
    resolution: &str,
    cluster: Option<&str>,
) -> String {
    format!(
        "max_over_time(container_memory_working_set_bytes{{namespace=\"{namespace}\", pod=~\"{pods_selector}\", container=\"{container}\"{}}}[{resolution}])",
        cluster_label(cluster)
    )
}

/// `CPUAmountLoader`/`MemoryAmountLoader`: the number of points the
/// `count_over_time` PromQL function saw for the relevant base series, used
/// by the Simple strategy to gate on data sufficiency.
pub fn cpu_amount_loader_query(namespace: &str, pods_selector: &str, container: &str, resolution: &str, cluster: Option<&str>) -> String {
    format!(
        "count_over_time(container_cpu_usage_seconds_total{{namespace=\"{namespace}\", pod=~\"{pods_selector}\", container=\"{container}\"{}}}[{resolution}])",
        cluster_label(cluster)
    )
}

pub fn memory_amount_loader_query(namespace: &str, pods_selector: &str, container: &str, resolution: &str, cluster: Option<&str>) -> String {
    format!(
        "count_over_time(container_memory_working_set_bytes{{namespace=\"{namespace}\", pod=~\"{pods_selector}\", container=\"{container}\"{}}}[{resolution}])",
        cluster_label(cluster)
    )
}

/// `MaxOOMKilledMemoryLoader`: peak memory at the moment of an OOMKill,
/// derived from `kube_pod_container_status_last_terminated_reason`.
pub fn max_oomkilled_memory_loader_query(
    namespace: &str,
    pods_selector: &str,
    container: &str,
    resolution: &str,
    cluster: Option<&str>,
) -> String {
    format!(
        "max_over_time(container_memory_working_set_bytes{{namespace=\"{namespace}\", pod=~\"{pods_selector}\", container=\"{container}\"{}}}[{resolution}]) and on(pod) (kube_pod_container_status_last_terminated_reason{{reason=\"OOMKilled\"}} == 1)",
        cluster_label(cluster)
    )
}

/// Renders a PromQL duration string the way `_step_to_string` does: whole
/// days when the step divides evenly into days, otherwise minutes.
pub fn step_to_string(step_seconds: i64) -> String {
    if step_seconds >= 86_400 && step_seconds % 86_400 == 0 {
        format!("{}d", step_seconds / 86_400)
    } else {
        format!("{}m", (step_seconds as f64 / 60.0).round() as i64)
    }
}

/// A single returned Prometheus series: labels plus (timestamp, value) pairs.
#[derive(Debug, Clone)]
pub struct Series {
    pub labels: BTreeMap<String, String>,
    pub values: Vec<(f64, f64)>,
}

/// `FilterMetric::get_target_name`: pick the identity label a series should
/// be grouped by, preferring pod, then container, then node.
fn target_name(series: &Series) -> Option<&str> {
    series
        .labels
        .get("pod")
        .or_else(|| series.labels.get("container"))
        .or_else(|| series.labels.get("node"))
        .map(String::as_str)
}

/// `FilterMetric::filter_prom_jobs_results`: cAdvisor metrics are often
/// scraped by more than one job (kubelet and cadvisor both export
/// `container_cpu_usage_seconds_total`), producing duplicate series per
/// pod. Within each target-name group, prefer the series from job
/// "kubelet"; otherwise take the lexicographically first job, for a
/// deterministic pick.
pub fn filter_prom_jobs_results(series_list: Vec<Series>) -> BTreeMap<String, Series> {
    let mut groups: BTreeMap<String, Vec<Series>> = BTreeMap::new();
    for series in series_list {
        let Some(name) = target_name(&series) else { continue };
        groups.entry(name.to_string()).or_default().push(series);
    }

    groups
        .into_iter()
        .map(|(name, mut group)| {
            if group.len() == 1 {
                return (name, group.pop().unwrap());
            }
            group.sort_by(|a, b| {
                a.labels
                    .get("job")
                    .cloned()
                    .unwrap_or_default()
                    .cmp(&b.labels.get("job").cloned().unwrap_or_default())
            });
            let kubelet_index = group.iter().position(|s| s.labels.get("job").map(String::as_str) == Some("kubelet"));
            let chosen = match kubelet_index {
                Some(i) => group.remove(i),
                None => group.remove(0),
            };
            (name, chosen)
        })
        .collect()
}
