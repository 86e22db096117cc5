//! The mutating admission webhook: HTTPS server, `/mutate` handler, owner
//! and recommendation store wiring, TLS cert generation, and
//! MutatingWebhookConfiguration emission.
//!
//! Grounded on `enforcer/enforcer_main.py` for the handler flow and on the
//! teacher's own `commands/webhook.rs` for the axum/TLS/Prometheus/shutdown
//! scaffolding, which is kept nearly as-is and retargeted from validation to
//! mutation.

use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use base64::Engine;
use kube::api::ListParams;
use kube::{Api, Client};
use prometheus::{Encoder, Histogram, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, warn};

use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Pod;

use krr::config::EnvVars;
use krr::datastore::{DatastoreConfig, DisabledDatastore, HttpRecommendationsDatastore, RecommendationsDatastore};
use krr::model::WorkloadRecommendation;
use krr::mutation::build_mutation_patch;
use krr::owner_store::{OwnerStore, PodOwner, RsOwner};
use krr::recommendation_store::RecommendationStore;

const MUTATION_ANNOTATION: &str = "admission.robusta.dev/krr-mutation-mode";

/* ============================= PROMETHEUS ============================= */

static WEBHOOK_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static POD_ADMISSION_MUTATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        prometheus::Opts::new("pod_admission_mutations_total", "Total pod admissions by mutation outcome"),
        &["mutated", "reason"],
    )
    .expect("metric definition is valid");
    WEBHOOK_REGISTRY.register(Box::new(c.clone())).expect("metric not yet registered");
    c
});

static ADMISSION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    let h = HistogramVec::new(
        prometheus::HistogramOpts::new("admission_duration_seconds", "Duration of admission handling in seconds"),
        &["kind"],
    )
    .expect("metric definition is valid");
    WEBHOOK_REGISTRY.register(Box::new(h.clone())).expect("metric not yet registered");
    h
});

static REPLICASET_ADMISSIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        prometheus::Opts::new("replicaset_admissions_total", "Total ReplicaSet admissions by operation"),
        &["operation"],
    )
    .expect("metric definition is valid");
    WEBHOOK_REGISTRY.register(Box::new(c.clone())).expect("metric not yet registered");
    c
});

static RS_OWNERS_MAP_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    let g = IntGauge::new("rs_owners_map_size", "Current size of the ReplicaSet owner map").expect("metric definition is valid");
    WEBHOOK_REGISTRY.register(Box::new(g.clone())).expect("metric not yet registered");
    g
});

/* ============================= STATE ============================= */

#[derive(Clone)]
pub(crate) struct WebhookState {
    pub(crate) client: Client,
    pub(crate) owner_store: Arc<OwnerStore>,
    pub(crate) recommendation_store: Arc<RecommendationStore>,
    pub(crate) mutation_mode_default: String,
}

/* ============================= ENTRY: SERVE ============================= */

pub async fn serve(addr_str: &str, tls_cert: &str, tls_key: &str) -> Result<()> {
    println!("Starting mutating admission webhook server...\n");
    info!("webhook_starting");

    let env = EnvVars::default();

    let client = Client::try_default().await.context("Failed to connect to Kubernetes cluster")?;

    print!("  Cluster connection .......... ");
    match client.apiserver_version().await {
        Ok(v) => println!("OK (v{}.{})", v.major, v.minor),
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("Cannot reach cluster: {}. Is the cluster running?", e);
        }
    }

    print!("  TLS ......................... ");
    validate_tls_files(tls_cert, tls_key)?;
    println!("loaded ({tls_cert}, {tls_key})");

    let addr: SocketAddr = addr_str.parse().context("Invalid address format")?;

    let datastore: Arc<dyn RecommendationsDatastore> = match build_datastore_config(&env) {
        Some(config) => Arc::new(HttpRecommendationsDatastore::new(config)),
        None => {
            warn!("datastore not configured; recommendation store will stay empty");
            Arc::new(DisabledDatastore)
        }
    };

    let owner_store = Arc::new(OwnerStore::new(Duration::from_secs(env.replica_set_deletion_wait)));
    let recommendation_store = Arc::new(RecommendationStore::new(datastore).await);

    let reload_handle = recommendation_store.spawn_periodic_reload(Duration::from_secs(env.scan_reload_interval));
    let gc_handle = spawn_owner_store_gc(Arc::clone(&owner_store), Duration::from_secs(env.replica_set_cleanup_interval));

    println!("  HTTPS server ................ https://{addr}");
    println!();
    println!("  Available endpoints:");
    println!("    POST /mutate ............................ Mutating admission handler");
    println!("    GET  /health ............................ Liveness + owner-store init trigger");
    println!("    GET  /metrics ............................ Prometheus metrics");
    println!("    GET  /recommendations/{{ns}}/{{kind}}/{{name}} . Stored recommendation lookup");
    println!();
    println!("Admission webhook running. Press Ctrl+C to stop.\n");
    println!("{}", "=".repeat(70));

    let state = WebhookState {
        client,
        owner_store,
        recommendation_store,
        mutation_mode_default: env.krr_mutation_mode_default.clone(),
    };

    let tls_cert = tls_cert.to_string();
    let tls_key = tls_key.to_string();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let http_shutdown = shutdown_tx.subscribe();

    let http_handle = tokio::spawn(async move { start_https_server(state, http_shutdown, addr, &tls_cert, &tls_key).await });

    tokio::signal::ctrl_c().await?;
    info!("shutdown_signal_received");
    println!("\n{}", "=".repeat(70));
    println!("Shutdown signal received. Stopping webhook server...");
    println!("{}", "=".repeat(70));

    let _ = shutdown_tx.send(());
    reload_handle.abort();
    gc_handle.abort();
    let _ = http_handle.await?;

    info!("webhook_stopped");
    println!("Webhook server stopped.");
    Ok(())
}

fn build_datastore_config(env: &EnvVars) -> Option<DatastoreConfig> {
    let store_url = std::env::var("STORE_URL").ok()?;
    let api_key = std::env::var("STORE_API_KEY").unwrap_or_default();
    let email = std::env::var("STORE_EMAIL").ok()?;
    let password = std::env::var("STORE_PASSWORD").ok()?;
    let cluster_name = std::env::var("CLUSTER_NAME").ok()?;
    Some(DatastoreConfig {
        store_url,
        api_key,
        account_id: env.robusta_account_id.clone(),
        cluster_name,
        email,
        password,
        scan_age_hours_threshold: env.scan_age_hours_threshold,
    })
}

fn spawn_owner_store_gc(owner_store: Arc<OwnerStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            owner_store.cleanup_deleted();
            RS_OWNERS_MAP_SIZE.set(owner_store.len() as i64);
        }
    })
}

/* ============================= TLS ============================= */

fn validate_tls_files(cert_path: &str, key_path: &str) -> Result<()> {
    if !std::path::Path::new(cert_path).exists() {
        anyhow::bail!("TLS certificate file not found: {}", cert_path);
    }
    if !std::path::Path::new(key_path).exists() {
        anyhow::bail!("TLS key file not found: {}", key_path);
    }
    Ok(())
}

/* ============================= HTTPS SERVER ============================= */

pub(crate) fn build_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/mutate", post(mutate_handler))
        .route(
            "/health",
            get({
                let state = state.clone();
                move || health_handler(state.clone())
            }),
        )
        .route("/metrics", get(webhook_metrics_handler))
        .route("/recommendations/:namespace/:kind/:name", get(recommendations_handler))
        .with_state(state)
}

async fn start_https_server(
    state: WebhookState,
    mut shutdown: broadcast::Receiver<()>,
    addr: SocketAddr,
    tls_cert: &str,
    tls_key: &str,
) -> Result<()> {
    let app = build_webhook_router(state);

    let rustls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(tls_cert, tls_key)
        .await
        .context("Failed to load TLS configuration")?;

    info!(addr = %addr, "https_server_started");

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        let _ = shutdown.recv().await;
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
    });

    axum_server::bind_rustls(addr, rustls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn health_handler(state: WebhookState) -> impl IntoResponse {
    let owner_store = Arc::clone(&state.owner_store);
    let client = state.client.clone();
    owner_store.finalize_initialization(|| list_all_replicasets_blocking(&client));
    RS_OWNERS_MAP_SIZE.set(owner_store.len() as i64);
    (StatusCode::OK, r#"{"status":"healthy"}"#)
}

/// Lists all ReplicaSets across the cluster for the OwnerStore's one-shot
/// initialization. Runs the async list on the current Tokio runtime via
/// `futures::executor::block_on`, matching `finalize_initialization`'s
/// synchronous `FnOnce` contract.
fn list_all_replicasets_blocking(client: &Client) -> Vec<(String, String, RsOwner)> {
    futures::executor::block_on(async {
        let api: Api<ReplicaSet> = Api::all(client.clone());
        let list = match api.list(&ListParams::default()).await {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "failed to list replicasets for owner store init");
                return Vec::new();
            }
        };
        list.items
            .into_iter()
            .filter_map(|rs| {
                let name = rs.metadata.name?;
                let namespace = rs.metadata.namespace?;
                let owner_ref = rs.metadata.owner_references?.into_iter().find(|o| o.controller.unwrap_or(false))?;
                Some((
                    namespace,
                    name,
                    RsOwner {
                        owner_name: owner_ref.name,
                        owner_kind: owner_ref.kind,
                        deletion_ts: None,
                    },
                ))
            })
            .collect()
    })
}

async fn webhook_metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = WEBHOOK_REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => match String::from_utf8(buffer) {
            Ok(body) => (StatusCode::OK, body),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
        },
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
    }
}

async fn recommendations_handler(
    State(state): State<WebhookState>,
    Path((namespace, kind, name)): Path<(String, String, String)>,
) -> impl IntoResponse {
    match state.recommendation_store.get_recommendations(&namespace, &name, &kind) {
        Some(rec) => (StatusCode::OK, serde_json::to_string(&recommendation_response_json(&namespace, &kind, &name, &rec)).unwrap()),
        None => (StatusCode::NOT_FOUND, "{}".to_string()),
    }
}

fn recommendation_response_json(namespace: &str, kind: &str, name: &str, rec: &WorkloadRecommendation) -> serde_json::Value {
    let containers: serde_json::Map<String, serde_json::Value> = rec
        .container_recommendations
        .iter()
        .map(|(container, cr)| {
            let mut entry = serde_json::Map::new();
            if let Some(cpu) = &cr.cpu {
                entry.insert("cpu".to_string(), serde_json::json!({"request": cpu.request, "limit": cpu.limit}));
            }
            if let Some(memory) = &cr.memory {
                entry.insert("memory".to_string(), serde_json::json!({"request": memory.request, "limit": memory.limit}));
            }
            (container.clone(), serde_json::Value::Object(entry))
        })
        .collect();
    serde_json::json!({
        "namespace": namespace,
        "kind": kind,
        "name": name,
        "containers": containers,
    })
}

/* ============================= MUTATE HANDLER ============================= */

async fn mutate_handler(State(state): State<WebhookState>, body: String) -> impl IntoResponse {
    let review: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            info!(error = %e, "invalid_admission_review");
            return (StatusCode::BAD_REQUEST, build_admission_response("", true, None));
        }
    };

    let uid = review["request"]["uid"].as_str().unwrap_or("").to_string();
    let kind = review["request"]["kind"]["kind"].as_str().unwrap_or("Unknown").to_string();
    let operation = review["request"]["operation"].as_str().unwrap_or("UNKNOWN").to_string();
    let namespace = review["request"]["namespace"].as_str().unwrap_or("default").to_string();
    let object = review["request"]["object"].clone();

    let _timer = ADMISSION_DURATION.with_label_values(&[&kind]).start_timer();

    match kind.as_str() {
        "ReplicaSet" => {
            let rs_name = object["metadata"]["name"].as_str().unwrap_or("").to_string();
            state.owner_store.handle_rs_admission(&namespace, &rs_name, &operation, Some(&object));
            REPLICASET_ADMISSIONS.with_label_values(&[&operation]).inc();
            RS_OWNERS_MAP_SIZE.set(state.owner_store.len() as i64);
            (StatusCode::OK, build_admission_response(&uid, true, None))
        }
        "Pod" => {
            let patch = handle_pod_admission(&state, &namespace, &object);
            (StatusCode::OK, build_admission_patch_response(&uid, patch))
        }
        other => {
            warn!(kind = %other, "admission request for unhandled kind; allowing unmodified");
            POD_ADMISSION_MUTATIONS.with_label_values(&["false", "unhandled_kind"]).inc();
            (StatusCode::OK, build_admission_response(&uid, true, None))
        }
    }
}

fn handle_pod_admission(state: &WebhookState, namespace: &str, object: &serde_json::Value) -> Vec<serde_json::Value> {
    let annotation = object["metadata"]["annotations"][MUTATION_ANNOTATION].as_str();
    let should_mutate = match annotation {
        Some("ignore") => {
            POD_ADMISSION_MUTATIONS.with_label_values(&["false", "ignored_by_annotation"]).inc();
            false
        }
        Some("enforce") => true,
        _ => state.mutation_mode_default == "enforce",
    };
    if !should_mutate {
        return Vec::new();
    }

    let pod: Pod = match serde_json::from_value(object.clone()) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "failed to parse pod from admission review");
            POD_ADMISSION_MUTATIONS.with_label_values(&["false", "processing_error"]).inc();
            return Vec::new();
        }
    };

    let owner_references: Vec<serde_json::Value> = object["metadata"]["ownerReferences"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let owner = if owner_references.is_empty() {
        let name = object["metadata"]["name"].as_str().unwrap_or("").to_string();
        Some(PodOwner {
            kind: "Pod".to_string(),
            name,
            namespace: namespace.to_string(),
        })
    } else {
        state.owner_store.get_pod_owner(namespace, &owner_references)
    };

    let Some(owner) = owner else {
        POD_ADMISSION_MUTATIONS.with_label_values(&["false", "no_owner_found"]).inc();
        return Vec::new();
    };

    let Some(recommendation) = state.recommendation_store.get_recommendations(&owner.namespace, &owner.name, &owner.kind) else {
        POD_ADMISSION_MUTATIONS.with_label_values(&["false", "no_recommendation"]).inc();
        return Vec::new();
    };

    let verdict = build_mutation_patch(&pod, &recommendation);
    for warning in &verdict.warnings {
        warn!(%warning, "mutation warning");
    }

    if verdict.patch_ops.is_empty() {
        POD_ADMISSION_MUTATIONS.with_label_values(&["false", "no_significant_change"]).inc();
    } else {
        POD_ADMISSION_MUTATIONS.with_label_values(&["true", "resources_updated"]).inc();
    }
    verdict.patch_ops
}

fn build_admission_response(uid: &str, allowed: bool, message: Option<&str>) -> String {
    let mut response = serde_json::json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "response": {
            "uid": uid,
            "allowed": allowed
        }
    });

    if let Some(msg) = message {
        response["response"]["status"] = serde_json::json!({"message": msg});
    }

    response.to_string()
}

fn build_admission_patch_response(uid: &str, patch_ops: Vec<serde_json::Value>) -> String {
    let mut response = serde_json::json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "response": {
            "uid": uid,
            "allowed": true
        }
    });

    if !patch_ops.is_empty() {
        let patch_json = serde_json::Value::Array(patch_ops).to_string();
        let encoded = base64::engine::general_purpose::STANDARD.encode(patch_json);
        response["response"]["patch"] = serde_json::json!(encoded);
        response["response"]["patchType"] = serde_json::json!("JSONPatch");
    }

    response.to_string()
}

/* ============================= CERT GENERATION ============================= */

pub fn generate_certs(service_name: &str, namespace: &str, output_dir: &str, ip_sans: &[String]) -> Result<()> {
    println!("Generating self-signed TLS certificates...\n");

    let (ca_pem, cert_pem, key_pem) = generate_self_signed_certs(service_name, namespace, ip_sans)?;

    let output_path = std::path::Path::new(output_dir);
    if !output_path.exists() {
        std::fs::create_dir_all(output_path).context("Failed to create output directory")?;
    }

    let ca_path = output_path.join("ca.crt");
    let cert_path = output_path.join("tls.crt");
    let key_path = output_path.join("tls.key");

    std::fs::write(&ca_path, &ca_pem).context("Failed to write ca.crt")?;
    std::fs::write(&cert_path, &cert_pem).context("Failed to write tls.crt")?;
    std::fs::write(&key_path, &key_pem).context("Failed to write tls.key")?;

    println!("  CA certificate .............. {}", ca_path.display());
    println!("  Server certificate .......... {}", cert_path.display());
    println!("  Server key .................. {}", key_path.display());
    println!();
    println!("  Service name ................ {service_name}");
    println!("  Namespace ................... {namespace}");
    println!("  SANs:");
    println!("    - {service_name}.{namespace}.svc");
    println!("    - {service_name}.{namespace}.svc.cluster.local");
    for ip in ip_sans {
        println!("    - {ip} (IP)");
    }
    println!();
    println!("TLS certificates generated successfully.");

    Ok(())
}

pub fn generate_self_signed_certs(service_name: &str, namespace: &str, ip_sans: &[String]) -> Result<(String, String, String)> {
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
    use std::net::IpAddr;

    let mut ca_params = CertificateParams::default();
    ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let mut ca_dn = DistinguishedName::new();
    ca_dn.push(DnType::CommonName, "krr-webhook-ca");
    ca_dn.push(DnType::OrganizationName, "krr");
    ca_params.distinguished_name = ca_dn;

    let ca_key = KeyPair::generate().context("Failed to generate CA key pair")?;
    let ca_cert = ca_params.self_signed(&ca_key).context("Failed to self-sign CA certificate")?;

    let mut server_params = CertificateParams::default();
    let mut server_dn = DistinguishedName::new();
    server_dn.push(DnType::CommonName, format!("{service_name}.{namespace}.svc"));
    server_params.distinguished_name = server_dn;

    let mut sans = vec![
        SanType::DnsName(format!("{service_name}.{namespace}.svc").try_into().context("Invalid DNS name for SAN")?),
        SanType::DnsName(
            format!("{service_name}.{namespace}.svc.cluster.local")
                .try_into()
                .context("Invalid DNS name for SAN")?,
        ),
    ];

    for ip_str in ip_sans {
        let ip: IpAddr = ip_str.parse().context(format!("Invalid IP address for SAN: {ip_str}"))?;
        sans.push(SanType::IpAddress(ip));
    }

    server_params.subject_alt_names = sans;

    let server_key = KeyPair::generate().context("Failed to generate server key pair")?;
    let server_cert = server_params
        .signed_by(&server_key, &ca_cert, &ca_key)
        .context("Failed to sign server certificate")?;

    Ok((ca_cert.pem(), server_cert.pem(), server_key.serialize_pem()))
}

/* ============================= INSTALL CONFIG ============================= */

pub fn install_config(service_name: &str, namespace: &str, ca_bundle_path: &str) -> Result<()> {
    let ca_bytes = std::fs::read(ca_bundle_path).context("Failed to read CA bundle file")?;
    let ca_b64 = base64::engine::general_purpose::STANDARD.encode(&ca_bytes);

    let yaml = format!(
        r#"apiVersion: admissionregistration.k8s.io/v1
kind: MutatingWebhookConfiguration
metadata:
  name: {service_name}
webhooks:
  - name: mutate.krr.robusta.dev
    rules:
      - apiGroups: [""]
        resources: ["pods"]
        apiVersions: ["v1"]
        operations: ["CREATE"]
      - apiGroups: ["apps"]
        resources: ["replicasets"]
        apiVersions: ["v1"]
        operations: ["CREATE", "DELETE"]
    clientConfig:
      service:
        name: {service_name}
        namespace: {namespace}
        path: /mutate
      caBundle: {ca_b64}
    failurePolicy: Ignore
    sideEffects: None
    reinvocationPolicy: Never
    admissionReviewVersions: ["v1"]
    namespaceSelector:
      matchExpressions:
        - key: kubernetes.io/metadata.name
          operator: NotIn
          values: ["kube-system", "kube-public", "kube-node-lease"]
"#
    );

    println!("{yaml}");
    Ok(())
}

/* ============================= TESTS ============================= */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_admission_response_allowed() {
        let resp = build_admission_response("test-uid-123", true, None);
        let v: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert_eq!(v["response"]["uid"], "test-uid-123");
        assert_eq!(v["response"]["allowed"], true);
        assert!(v["response"]["patch"].is_null());
    }

    #[test]
    fn build_admission_patch_response_encodes_patch() {
        let ops = vec![serde_json::json!({"op": "add", "path": "/spec/containers/0/resources", "value": {}})];
        let resp = build_admission_patch_response("uid-1", ops);
        let v: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert_eq!(v["response"]["patchType"], "JSONPatch");
        assert!(v["response"]["patch"].as_str().is_some());
    }

    #[test]
    fn build_admission_patch_response_omits_patch_when_empty() {
        let resp = build_admission_patch_response("uid-2", Vec::new());
        let v: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert!(v["response"]["patch"].is_null());
        assert!(v["response"]["patchType"].is_null());
    }

    #[test]
    fn generate_self_signed_certs_produces_pem() {
        let (ca_pem, cert_pem, key_pem) = generate_self_signed_certs("my-webhook", "production", &[]).unwrap();
        assert!(ca_pem.contains("BEGIN CERTIFICATE"));
        assert!(cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(key_pem.contains("BEGIN PRIVATE KEY"));
        assert_ne!(ca_pem, cert_pem);
    }

    #[test]
    fn validate_tls_files_missing_cert() {
        let result = validate_tls_files("/nonexistent/cert.pem", "/nonexistent/key.pem");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("certificate file not found"));
    }

    #[test]
    fn admission_duration_metric_registered() {
        LazyLock::force(&ADMISSION_DURATION);
        let families = WEBHOOK_REGISTRY.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"admission_duration_seconds"));
    }
}
