use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "krr")]
#[command(about = "Kubernetes resource right-sizing recommendation engine and admission-time enforcer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every strategy subcommand, mirroring `robusta_krr`'s
/// common `click` option group (namespace/cluster scoping, Prometheus
/// connection, output shaping, and the resource-recommendation floors).
#[derive(Args, Debug, Clone)]
pub struct RecommendArgs {
    /// Restrict discovery to a single namespace (default: all namespaces)
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Cluster name attached to recommendations and enforced on Prometheus queries
    #[arg(long, short = 'c')]
    pub cluster: Option<String>,

    /// Workload kinds to scan, e.g. Deployment,StatefulSet (default: all supported kinds)
    #[arg(long, short = 'r')]
    pub resource: Vec<String>,

    /// Label selector further restricting discovered workloads
    #[arg(long, short = 'l')]
    pub selector: Option<String>,

    /// Path to a kubeconfig file (default: standard kubeconfig resolution)
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Base URL of the Prometheus-compatible server to query
    #[arg(long)]
    pub prometheus_url: String,

    /// Extra label value scoping every PromQL query (vendor tenant/workspace id)
    #[arg(long)]
    pub prometheus_label: Option<String>,

    /// Value for the `cluster` label appended to every PromQL query
    #[arg(long)]
    pub prometheus_cluster_label: Option<String>,

    /// Sign requests for AWS Managed Prometheus (SigV4)
    #[arg(long)]
    pub eks_managed_prom: bool,

    /// AWS region for SigV4 signing (default: $AWS_REGION)
    #[arg(long)]
    pub eks_managed_prom_region: Option<String>,

    /// AWS access key for SigV4 signing (default: $AWS_ACCESS_KEY_ID)
    #[arg(long)]
    pub eks_access_key: Option<String>,

    /// AWS secret key for SigV4 signing (default: $AWS_SECRET_ACCESS_KEY)
    #[arg(long)]
    pub eks_secret_key: Option<String>,

    /// Service name SigV4 signs against (default: "aps", Amazon Managed Service for Prometheus)
    #[arg(long)]
    pub eks_service_name: Option<String>,

    /// Coralogix Prometheus-compatible streaming API token
    #[arg(long)]
    pub coralogix_token: Option<String>,

    /// Use the OpenShift/Thanos-querier dialect
    #[arg(long)]
    pub openshift: bool,

    /// Reconstruct workload identity from Prometheus labels instead of the Kubernetes API
    #[arg(long)]
    pub prometheus_discovery: bool,

    /// Maximum number of workloads evaluated concurrently
    #[arg(long, default_value_t = 10)]
    pub max_workers: usize,

    /// Output format (currently: json)
    #[arg(long, short = 'f', default_value = "json")]
    pub format: String,

    #[arg(long, short = 'v')]
    pub verbose: bool,

    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Write output to a file instead of stdout
    #[arg(long)]
    pub file_output: Option<String>,

    /// Floor applied to every CPU request recommendation, in cores
    #[arg(long)]
    pub cpu_min_value: Option<f64>,

    /// Floor applied to every memory request recommendation, in bytes
    #[arg(long)]
    pub memory_min_value: Option<f64>,

    /// Usage history window queried from Prometheus, e.g. "14d", "6h"
    #[arg(long, default_value = "14d")]
    pub history_window: String,

    /// CPU usage percentile the simple strategy proposes as the request (simple strategy only)
    #[arg(long, default_value_t = 95.0)]
    pub cpu_percentile: f64,

    /// Percentage headroom added above peak memory usage (simple strategy only)
    #[arg(long, default_value_t = 15.0)]
    pub memory_buffer_percentage: f64,

    /// Minimum usage data points required before a recommendation is made (simple strategy only)
    #[arg(long, default_value_t = 100)]
    pub points_required: u64,

    /// Recommend CPU/memory even for workloads autoscaled by an HPA on that resource (simple strategy only)
    #[arg(long)]
    pub allow_hpa: bool,

    /// Bump the memory proposal using observed OOMKill peaks (simple strategy only)
    #[arg(long)]
    pub use_oomkill_data: bool,
}

impl From<RecommendArgs> for crate::commands::recommend::RecommendOptions {
    fn from(args: RecommendArgs) -> Self {
        crate::commands::recommend::RecommendOptions {
            namespace: args.namespace,
            cluster: args.cluster,
            selector: args.selector,
            kubeconfig: args.kubeconfig,
            prometheus_url: args.prometheus_url,
            prometheus_label: args.prometheus_label,
            prometheus_cluster_label: args.prometheus_cluster_label,
            eks_managed_prom: args.eks_managed_prom,
            eks_managed_prom_region: args.eks_managed_prom_region,
            eks_access_key: args.eks_access_key,
            eks_secret_key: args.eks_secret_key,
            eks_service_name: args.eks_service_name,
            coralogix_token: args.coralogix_token,
            openshift: args.openshift,
            prometheus_discovery: args.prometheus_discovery,
            max_workers: args.max_workers,
            format: args.format,
            verbose: args.verbose,
            quiet: args.quiet,
            file_output: args.file_output,
            cpu_min_value: args.cpu_min_value,
            memory_min_value: args.memory_min_value,
            history_window: args.history_window,
            cpu_percentile: args.cpu_percentile,
            memory_buffer_percentage: args.memory_buffer_percentage,
            points_required: args.points_required,
            allow_hpa: args.allow_hpa,
            use_oomkill_data: args.use_oomkill_data,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display application version
    Version,

    /// Check cluster connectivity and permissions
    Check,

    /// List Kubernetes resources (e.g. pods)
    List {
        /// Resource type to list (pods)
        resource: String,
    },

    /// Recommend resources using percentile-of-usage statistics
    Simple(RecommendArgs),

    /// Recommend resources using an LLM-backed strategy
    Ai(RecommendArgs),

    /// Manage the admission webhook
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },

    /// Generate observability manifests (Services, ServiceMonitors, Grafana dashboard)
    Observability {
        #[command(subcommand)]
        action: ObservabilityAction,
    },

    /// Generate cluster deployment manifests (Namespace, RBAC, Deployment, PDB)
    Deploy {
        #[command(subcommand)]
        action: DeployAction,
    },
}

#[derive(Subcommand)]
pub enum WebhookAction {
    /// Start the admission webhook HTTPS server
    Serve {
        #[arg(long, default_value = "0.0.0.0:8443")]
        addr: String,
        #[arg(long, default_value = "tls.crt")]
        tls_cert: String,
        #[arg(long, default_value = "tls.key")]
        tls_key: String,
    },
    /// Generate self-signed TLS certificates for development
    CertGenerate {
        #[arg(long, default_value = "krr-webhook")]
        service_name: String,
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(long, default_value = ".")]
        output_dir: String,
        /// Additional IP SANs (e.g. --ip-san 192.168.1.26)
        #[arg(long = "ip-san")]
        ip_sans: Vec<String>,
    },
    /// Print the MutatingWebhookConfiguration YAML
    InstallConfig {
        #[arg(long, default_value = "krr-webhook")]
        service_name: String,
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(long)]
        ca_bundle_path: String,
    },
}

#[derive(Subcommand)]
pub enum DeployAction {
    /// Print all deployment manifests
    GenerateAll,

    /// Print only the RBAC manifests (ServiceAccount, ClusterRole, ClusterRoleBinding)
    GenerateRbac,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
pub enum ObservabilityAction {
    /// Print all observability manifests (Services + ServiceMonitors + Grafana dashboard)
    GenerateAll,

    /// Print only ServiceMonitor manifests
    GenerateServiceMonitors,

    /// Print only the Grafana dashboard ConfigMap
    GenerateDashboard,
}
