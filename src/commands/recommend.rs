//! The `krr simple`/`krr ai` entry point: discovers workloads, pulls their
//! usage history from Prometheus, runs the selected strategy, and prints the
//! resulting recommendations.
//!
//! Grounded on `robusta_krr/main.py::run` (the top-level orchestration loop)
//! and `cluster_loader/loaders/base.py`'s worker-pool gather pattern, adapted
//! to a bounded `Semaphore` gating how many workloads are processed
//! concurrently. Each strategy's `run` awaits directly rather than being
//! bridged onto a blocking thread, so an I/O-bound strategy (the AI
//! strategy's provider dispatch) never occupies a worker slot for longer
//! than its actual network wait.

use std::sync::Arc;

use anyhow::Context;
use kube::Client;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use krr::discovery::kube_api::KubeApiWorkloadLoader;
use krr::discovery::prometheus_mode::PrometheusWorkloadLoader;
use krr::discovery::WorkloadLoader;
use krr::metrics_query::aws_signer::AwsSigV4Signer;
use krr::metrics_query::client::PrometheusClient;
use krr::metrics_query::families;
use krr::metrics_query::vendors::{Signer, VendorDialect};
use krr::model::{
    ContainerRecommendation, Recommendation, RecommendationValue, ResourceType, Workload,
    WorkloadRecommendation,
};
use krr::strategy::{HistoryData, RunResult, Strategy, StrategyRegistry};

#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub namespace: Option<String>,
    pub cluster: Option<String>,
    pub selector: Option<String>,
    pub kubeconfig: Option<String>,
    pub prometheus_url: String,
    pub prometheus_label: Option<String>,
    pub prometheus_cluster_label: Option<String>,
    pub eks_managed_prom: bool,
    pub eks_managed_prom_region: Option<String>,
    pub eks_access_key: Option<String>,
    pub eks_secret_key: Option<String>,
    pub eks_service_name: Option<String>,
    pub coralogix_token: Option<String>,
    pub openshift: bool,
    pub prometheus_discovery: bool,
    pub max_workers: usize,
    pub format: String,
    pub verbose: bool,
    pub quiet: bool,
    pub file_output: Option<String>,
    pub cpu_min_value: Option<f64>,
    pub memory_min_value: Option<f64>,
    pub history_window: String,
    pub cpu_percentile: f64,
    pub memory_buffer_percentage: f64,
    pub points_required: u64,
    pub allow_hpa: bool,
    pub use_oomkill_data: bool,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        RecommendOptions {
            namespace: None,
            cluster: None,
            selector: None,
            kubeconfig: None,
            prometheus_url: String::new(),
            prometheus_label: None,
            prometheus_cluster_label: None,
            eks_managed_prom: false,
            eks_managed_prom_region: None,
            eks_access_key: None,
            eks_secret_key: None,
            eks_service_name: None,
            coralogix_token: None,
            openshift: false,
            prometheus_discovery: false,
            max_workers: 10,
            format: "json".to_string(),
            verbose: false,
            quiet: false,
            file_output: None,
            cpu_min_value: None,
            memory_min_value: None,
            history_window: "14d".to_string(),
            cpu_percentile: 95.0,
            memory_buffer_percentage: 15.0,
            points_required: 100,
            allow_hpa: false,
            use_oomkill_data: false,
        }
    }
}

fn vendor_dialect(opts: &RecommendOptions) -> VendorDialect {
    if opts.eks_managed_prom {
        VendorDialect::AwsManagedPrometheus
    } else if opts.coralogix_token.is_some() {
        VendorDialect::CoralogixStream
    } else if opts.openshift {
        VendorDialect::Thanos
    } else {
        VendorDialect::Standard
    }
}

/// Resolves the SigV4 signer for `--eks-managed-prom`, mirroring
/// `prometheus_utils.py::generate_prometheus_config`'s access-key/secret-key/
/// region/service-name overrides falling back to the ambient AWS environment
/// variables a boto3 session would otherwise pick up.
fn aws_signer(opts: &RecommendOptions) -> anyhow::Result<Option<Arc<dyn Signer>>> {
    if !opts.eks_managed_prom {
        return Ok(None);
    }
    let region = opts
        .eks_managed_prom_region
        .clone()
        .or_else(|| std::env::var("AWS_REGION").ok())
        .context("--eks-managed-prom requires --eks-managed-prom-region or $AWS_REGION")?;
    let access_key = opts
        .eks_access_key
        .clone()
        .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())
        .context("--eks-managed-prom requires --eks-access-key or $AWS_ACCESS_KEY_ID")?;
    let secret_key = opts
        .eks_secret_key
        .clone()
        .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok())
        .context("--eks-managed-prom requires --eks-secret-key or $AWS_SECRET_ACCESS_KEY")?;
    let service = opts.eks_service_name.clone().unwrap_or_else(|| "aps".to_string());
    let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

    Ok(Some(Arc::new(AwsSigV4Signer::new(region, service, access_key, secret_key, session_token))))
}

/// Builds the `pod=~"..."` regex alternation for a workload's known pods,
/// falling back to a name-prefix match when pod identities aren't known
/// (the non-Deployment kube-API kinds don't currently resolve a selector).
fn pods_selector(workload: &Workload) -> String {
    if workload.pods.is_empty() {
        return format!("{}-.*", regex::escape(&workload.name));
    }
    workload
        .pods
        .iter()
        .map(|p| regex::escape(&p.name))
        .collect::<Vec<_>>()
        .join("|")
}

/// Parses a duration string like "14d", "6h", "30m" into seconds, defaulting
/// to days when no unit suffix is given. Falls back to 14 days on garbage
/// input rather than failing the whole recommendation run over a typo.
fn parse_window_seconds(window: &str) -> i64 {
    const DEFAULT: i64 = 14 * 86_400;
    let window = window.trim();
    if window.is_empty() {
        return DEFAULT;
    }
    let (digits, unit) = match window.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&window[..window.len() - 1], c),
        _ => (window, 'd'),
    };
    let Ok(amount) = digits.parse::<i64>() else { return DEFAULT };
    match unit {
        'd' => amount * 86_400,
        'h' => amount * 3_600,
        'm' => amount * 60,
        's' => amount,
        _ => DEFAULT,
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (pct / 100.0) * (sorted.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Pulls the metric families a strategy requires and assembles them into
/// the per-pod `HistoryData` map the strategy trait expects. Point-count and
/// peak-value families are window aggregates (`_over_time` instant queries);
/// the CPU percentile family is an actual range query reduced to one point
/// per pod client-side, mirroring what `quantile_over_time` would have done
/// at query time.
async fn gather_history(
    client: &PrometheusClient,
    workload: &Workload,
    required: &[&'static str],
    opts: &RecommendOptions,
) -> HistoryData {
    let mut history = HistoryData::new();
    let selector = pods_selector(workload);
    let cluster = opts.prometheus_cluster_label.as_deref().or(workload.cluster.as_deref());
    let window_seconds = parse_window_seconds(&opts.history_window);
    let end = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let start = end - window_seconds as f64;

    for metric in required {
        let series = match *metric {
            "PercentileCPULoader" => {
                let query = families::percentile_cpu_loader_query(&workload.namespace, &selector, &workload.container, cluster);
                match client.range_query(&query, start, end, 300).await {
                    Ok(series_list) => {
                        let mut out = krr::model::MetricSeries::new();
                        for series in series_list {
                            let Some(pod) = series.labels.get("pod").cloned() else { continue };
                            let mut values: Vec<f64> = series.values.iter().map(|(_, v)| *v).collect();
                            values.sort_by(|a, b| a.partial_cmp(b).unwrap());
                            out.insert(pod, vec![(0.0, percentile(&values, opts.cpu_percentile))]);
                        }
                        Some(out)
                    }
                    Err(e) => {
                        warn!(workload = %workload, error = %e, "percentile cpu query failed");
                        None
                    }
                }
            }
            "MaxMemoryLoader" => {
                let query = families::max_memory_loader_query(&workload.namespace, &selector, &workload.container, &opts.history_window, cluster);
                instant_to_series(client, &query, workload).await
            }
            "CPUAmountLoader" => {
                let query = families::cpu_amount_loader_query(&workload.namespace, &selector, &workload.container, &opts.history_window, cluster);
                instant_to_series(client, &query, workload).await
            }
            "MemoryAmountLoader" => {
                let query = families::memory_amount_loader_query(&workload.namespace, &selector, &workload.container, &opts.history_window, cluster);
                instant_to_series(client, &query, workload).await
            }
            "MaxOOMKilledMemoryLoader" => {
                let query = families::max_oomkilled_memory_loader_query(&workload.namespace, &selector, &workload.container, &opts.history_window, cluster);
                instant_to_series(client, &query, workload).await
            }
            other => {
                warn!(metric = other, "unknown metric family requested by strategy");
                None
            }
        };
        if let Some(series) = series {
            history.insert(*metric, series);
        }
    }

    history
}

async fn instant_to_series(client: &PrometheusClient, query: &str, workload: &Workload) -> Option<krr::model::MetricSeries> {
    match client.instant_query(query).await {
        Ok(samples) => {
            let mut out = krr::model::MetricSeries::new();
            for sample in samples {
                let Some(pod) = sample.labels.get("pod").cloned() else { continue };
                out.insert(pod, vec![(0.0, sample.value)]);
            }
            Some(out)
        }
        Err(e) => {
            warn!(workload = %workload, error = %e, "metric query failed");
            None
        }
    }
}

fn apply_min_value(value: f64, min: Option<f64>) -> f64 {
    match min {
        Some(min) if value < min => min,
        _ => value,
    }
}

fn to_recommendation(result: &RunResult, resource: ResourceType, min_value: Option<f64>) -> Option<Recommendation> {
    let rec = result.get(&resource)?;
    if rec.is_undefined() {
        return Some(Recommendation::undefined(rec.info.clone().unwrap_or_default()));
    }
    let request = apply_min_value(rec.request, min_value);
    Some(Recommendation {
        request: RecommendationValue::Value(request),
        limit: rec.limit.map(RecommendationValue::Value).unwrap_or(RecommendationValue::Absent),
        info: rec.info.clone(),
    })
}

async fn process_workload(
    prom: Arc<PrometheusClient>,
    strategy_name: String,
    registry: Arc<StrategyRegistry>,
    workload: Workload,
    opts: Arc<RecommendOptions>,
) -> (Workload, WorkloadRecommendation) {
    let strategy = registry.get(&strategy_name).expect("strategy resolved before dispatch");
    let required = strategy.required_metrics();
    let history = gather_history(&prom, &workload, &required, &opts).await;
    let run_result = strategy.run(&history, &workload).await;

    let mut container_recommendations = std::collections::BTreeMap::new();
    container_recommendations.insert(
        workload.container.clone(),
        ContainerRecommendation {
            cpu: to_recommendation(&run_result, ResourceType::Cpu, opts.cpu_min_value),
            memory: to_recommendation(&run_result, ResourceType::Memory, opts.memory_min_value),
        },
    );

    let workload_recommendation = WorkloadRecommendation {
        workload_key: workload.to_string(),
        container_recommendations,
    };

    (workload, workload_recommendation)
}

fn recommendation_value_json(value: &RecommendationValue) -> serde_json::Value {
    match value {
        RecommendationValue::Value(v) => json!(v),
        RecommendationValue::Unknown => json!("?"),
        RecommendationValue::Absent => serde_json::Value::Null,
    }
}

fn resource_json(
    rec: Option<&Recommendation>,
    current: Option<&RecommendationValue>,
    resource_type: ResourceType,
) -> Option<serde_json::Value> {
    let rec = rec?;
    let severity = krr::severity::Severity::calculate(
        current.copied().unwrap_or(RecommendationValue::Absent),
        rec.request,
        resource_type,
    );
    Some(json!({
        "request": recommendation_value_json(&rec.request),
        "limit": recommendation_value_json(&rec.limit),
        "info": rec.info,
        "severity": format!("{severity:?}").to_lowercase(),
    }))
}

fn render(results: &[(Workload, WorkloadRecommendation)], opts: &RecommendOptions) -> anyhow::Result<String> {
    let mut rows = Vec::new();
    for (workload, rec) in results {
        let container_rec = rec.get(&workload.container);
        let current_cpu = workload.allocations.requests.get(&ResourceType::Cpu);
        let current_memory = workload.allocations.requests.get(&ResourceType::Memory);
        rows.push(json!({
            "namespace": workload.namespace,
            "kind": workload.kind.to_string(),
            "name": workload.name,
            "container": workload.container,
            "cpu": resource_json(container_rec.and_then(|c| c.cpu.as_ref()), current_cpu, ResourceType::Cpu),
            "memory": resource_json(container_rec.and_then(|c| c.memory.as_ref()), current_memory, ResourceType::Memory),
        }));
    }

    match opts.format.as_str() {
        "json" => Ok(serde_json::to_string_pretty(&rows)?),
        other => {
            warn!(format = other, "unsupported output format, falling back to json");
            Ok(serde_json::to_string_pretty(&rows)?)
        }
    }
}

pub async fn run(strategy_name: &str, opts: RecommendOptions) -> anyhow::Result<()> {
    let simple_settings = krr::strategy::simple::SimpleStrategySettings {
        cpu_percentile: opts.cpu_percentile,
        memory_buffer_percentage: opts.memory_buffer_percentage,
        points_required: opts.points_required,
        allow_hpa: opts.allow_hpa,
        use_oomkill_data: opts.use_oomkill_data,
        ..krr::strategy::simple::SimpleStrategySettings::default()
    };
    let registry = Arc::new(StrategyRegistry::with_simple_settings(simple_settings));
    if registry.get(strategy_name).is_none() {
        anyhow::bail!("unknown strategy '{strategy_name}'");
    }

    let signer = aws_signer(&opts)?;
    let build_prom_client = |opts: &RecommendOptions, signer: &Option<Arc<dyn Signer>>| {
        let mut client = PrometheusClient::new(opts.prometheus_url.clone(), vendor_dialect(opts), opts.coralogix_token.clone());
        if let Some(signer) = signer {
            client = client.with_signer(signer.clone());
        }
        client
    };

    let prom = Arc::new(build_prom_client(&opts, &signer));
    let opts = Arc::new(opts);

    let workloads = if opts.prometheus_discovery {
        let loader = PrometheusWorkloadLoader::new(build_prom_client(&opts, &signer), opts.prometheus_cluster_label.clone());
        loader.list_workloads().await.context("prometheus-mode discovery failed")?
    } else {
        let client = Client::try_default().await.context("failed to build kubernetes client")?;
        let loader = KubeApiWorkloadLoader::new(client, opts.namespace.clone());
        loader.list_workloads().await.context("kubernetes API discovery failed")?
    };

    if !opts.quiet {
        info!(count = workloads.len(), "discovered workloads");
    }

    let semaphore = Arc::new(Semaphore::new(opts.max_workers.max(1)));
    let mut handles = Vec::with_capacity(workloads.len());
    for workload in workloads {
        let prom = Arc::clone(&prom);
        let registry = Arc::clone(&registry);
        let opts = Arc::clone(&opts);
        let semaphore = Arc::clone(&semaphore);
        let strategy_name = strategy_name.to_string();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            process_workload(prom, strategy_name, registry, workload, opts).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(pair) => results.push(pair),
            Err(e) => warn!(error = %e, "workload processing task panicked"),
        }
    }

    let rendered = render(&results, &opts)?;
    match &opts.file_output {
        Some(path) => std::fs::write(path, &rendered).with_context(|| format!("failed to write output to {path}"))?,
        None => println!("{rendered}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use krr::model::{PodRef, ResourceAllocations, WorkloadKind};

    fn workload(pods: Vec<&str>) -> Workload {
        Workload {
            cluster: None,
            namespace: "default".into(),
            kind: WorkloadKind::Deployment,
            name: "web".into(),
            container: "app".into(),
            allocations: ResourceAllocations::default(),
            hpa: None,
            pods: pods.into_iter().map(|n| PodRef { name: n.to_string(), deleted: false }).collect(),
            warnings: vec![],
        }
    }

    #[test]
    fn pods_selector_joins_known_pod_names() {
        let w = workload(vec!["web-abc123", "web-def456"]);
        assert_eq!(pods_selector(&w), "web-abc123|web-def456");
    }

    #[test]
    fn pods_selector_falls_back_to_name_prefix() {
        let w = workload(vec![]);
        assert_eq!(pods_selector(&w), "web-.*");
    }

    #[test]
    fn apply_min_value_floors_below_threshold() {
        assert_eq!(apply_min_value(0.01, Some(0.05)), 0.05);
        assert_eq!(apply_min_value(0.2, Some(0.05)), 0.2);
    }

    #[test]
    fn to_recommendation_passes_through_undefined_info() {
        let mut result = RunResult::new();
        result.insert(ResourceType::Cpu, krr::strategy::ResourceRecommendation::undefined("No data"));
        let rec = to_recommendation(&result, ResourceType::Cpu, None).unwrap();
        assert_eq!(rec.info.as_deref(), Some("No data"));
        assert_eq!(rec.request, RecommendationValue::Unknown);
    }

    #[test]
    fn parse_window_seconds_handles_day_and_hour_suffixes() {
        assert_eq!(parse_window_seconds("14d"), 14 * 86_400);
        assert_eq!(parse_window_seconds("6h"), 6 * 3_600);
        assert_eq!(parse_window_seconds("garbage"), 14 * 86_400);
    }

    #[test]
    fn vendor_dialect_prefers_eks_over_openshift() {
        let mut opts = RecommendOptions::default();
        opts.eks_managed_prom = true;
        opts.openshift = true;
        assert_eq!(vendor_dialect(&opts), VendorDialect::AwsManagedPrometheus);
    }

    #[test]
    fn aws_signer_is_none_without_eks_managed_prom() {
        let opts = RecommendOptions::default();
        assert!(aws_signer(&opts).unwrap().is_none());
    }

    #[test]
    fn aws_signer_built_from_explicit_overrides() {
        let mut opts = RecommendOptions::default();
        opts.eks_managed_prom = true;
        opts.eks_managed_prom_region = Some("us-east-1".to_string());
        opts.eks_access_key = Some("AKIAEXAMPLE".to_string());
        opts.eks_secret_key = Some("secret".to_string());
        assert!(aws_signer(&opts).unwrap().is_some());
    }

    #[test]
    fn aws_signer_requires_region_or_credentials() {
        let mut opts = RecommendOptions::default();
        opts.eks_managed_prom = true;
        opts.eks_managed_prom_region = Some("us-east-1".to_string());
        // No access/secret key supplied and (in a test process) none of
        // these env vars are expected to be set either.
        unsafe { std::env::remove_var("AWS_ACCESS_KEY_ID") };
        assert!(aws_signer(&opts).is_err());
    }
}
