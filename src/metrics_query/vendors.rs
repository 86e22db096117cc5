//! Vendor Prometheus dialects, modeled as data rather than a class
//! hierarchy per the "pluggable metric dialects" design note: each vendor
//! differs only in base URL shape, auth header, and the label used to scope
//! queries to a cluster — never in the PromQL templates themselves.
//!
//! Grounded on `core/integrations/prometheus/metrics_service/*` (one file
//! per vendor: anthos, gcp, mimir, thanos, victoria_metrics, plus the
//! standard/base service).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorDialect {
    Standard,
    GcpManagedPrometheus,
    CoralogixStream,
    AwsManagedPrometheus,
    VictoriaMetrics,
    Thanos,
    Mimir,
    Azure,
}

#[derive(Debug, Clone)]
pub struct DialectConfig {
    pub dialect: VendorDialect,
    /// Extra query-path segment, e.g. GCP's project-scoped API path.
    pub query_path: &'static str,
    /// Header name carrying the bearer/API token, if not the standard
    /// `Authorization: Bearer`.
    pub auth_header: Option<&'static str>,
    /// Whether requests must be SigV4-signed (AWS AMP).
    pub requires_sigv4: bool,
}

impl VendorDialect {
    pub fn config(&self) -> DialectConfig {
        match self {
            VendorDialect::Standard => DialectConfig {
                dialect: *self,
                query_path: "/api/v1/query",
                auth_header: None,
                requires_sigv4: false,
            },
            VendorDialect::GcpManagedPrometheus => DialectConfig {
                dialect: *self,
                query_path: "/v1/projects/{project}/location/global/prometheus/api/v1/query",
                auth_header: None,
                requires_sigv4: false,
            },
            VendorDialect::CoralogixStream => DialectConfig {
                dialect: *self,
                query_path: "/prometheus/api/v1/query",
                auth_header: Some("token"),
                requires_sigv4: false,
            },
            VendorDialect::AwsManagedPrometheus => DialectConfig {
                dialect: *self,
                query_path: "/api/v1/query",
                auth_header: None,
                requires_sigv4: true,
            },
            VendorDialect::VictoriaMetrics | VendorDialect::Thanos | VendorDialect::Mimir => DialectConfig {
                dialect: *self,
                query_path: "/api/v1/query",
                auth_header: None,
                requires_sigv4: false,
            },
            VendorDialect::Azure => DialectConfig {
                dialect: *self,
                query_path: "/api/v1/query",
                auth_header: Some("x-ms-client-request-id"),
                requires_sigv4: false,
            },
        }
    }
}

/// A signing collaborator for SigV4-authenticated requests (AWS AMP). The
/// concrete signer talks to AWS credential machinery external to this
/// crate's scope; only the seam is defined here.
pub trait Signer: Send + Sync {
    fn sign(&self, method: &str, url: &str, body: &str) -> Vec<(String, String)>;
}
