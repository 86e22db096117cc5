/* ============================= SERVICE GENERATORS ============================= */

const NAMESPACE: &str = "krr";
const APP_NAME: &str = "krr";

pub fn generate_service(component: &str, port: u16) -> String {
    format!(
        r#"apiVersion: v1
kind: Service
metadata:
  name: {APP_NAME}-{component}
  namespace: {NAMESPACE}
  labels:
    app.kubernetes.io/name: {APP_NAME}
    app.kubernetes.io/component: {component}
spec:
  selector:
    app.kubernetes.io/name: {APP_NAME}
    app.kubernetes.io/component: {component}
  ports:
    - name: metrics
      port: {port}
      targetPort: {port}
      protocol: TCP
"#
    )
}

pub fn generate_service_webhook() -> String {
    generate_service("webhook", 8443)
}

/* ============================= SERVICEMONITOR GENERATORS ============================= */

pub fn generate_service_monitor(component: &str, port: u16) -> String {
    let scheme = if port == 8443 { "https" } else { "http" };

    let mut yaml = format!(
        r#"apiVersion: monitoring.coreos.com/v1
kind: ServiceMonitor
metadata:
  name: {APP_NAME}-{component}
  namespace: {NAMESPACE}
  labels:
    app.kubernetes.io/name: {APP_NAME}
    app.kubernetes.io/component: {component}
    release: stable
spec:
  selector:
    matchLabels:
      app.kubernetes.io/name: {APP_NAME}
      app.kubernetes.io/component: {component}
  endpoints:
    - port: metrics
      path: /metrics
      interval: 15s
      scheme: {scheme}
"#
    );

    if port == 8443 {
        yaml.push_str(
            "      tlsConfig:\n        insecureSkipVerify: true\n",
        );
    }

    yaml
}

pub fn generate_service_monitor_webhook() -> String {
    generate_service_monitor("webhook", 8443)
}

/* ============================= GRAFANA DASHBOARD ============================= */

pub fn generate_grafana_dashboard_configmap() -> String {
    let dashboard = build_dashboard_json();
    let dashboard_str = serde_json::to_string_pretty(&dashboard).expect("dashboard JSON is valid");

    // Escape for YAML embedding (indent every line by 4 spaces)
    let indented: String = dashboard_str
        .lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: {APP_NAME}-grafana-dashboard
  namespace: {NAMESPACE}
  labels:
    app.kubernetes.io/name: {APP_NAME}
    grafana_dashboard: "1"
data:
  krr.json: |
{indented}
"#
    )
}

fn build_dashboard_json() -> serde_json::Value {
    serde_json::json!({
        "annotations": { "list": [] },
        "editable": true,
        "fiscalYearStartMonth": 0,
        "graphTooltip": 1,
        "id": null,
        "links": [],
        "panels": [
            row_panel(0, "Admission Webhook"),
            graph_panel(1, "Mutations by Outcome", "rate(pod_admission_mutations_total[5m])", 0),
            graph_panel(2, "Admission Duration", "histogram_quantile(0.99, rate(admission_duration_seconds_bucket[5m]))", 0),
            graph_panel(3, "ReplicaSet Admissions", "rate(replicaset_admissions_total[5m])", 0),
            stat_panel(4, "Tracked Owners", "rs_owners_map_size", 0),
        ],
        "schemaVersion": 39,
        "tags": ["kubernetes", "krr"],
        "templating": { "list": [] },
        "time": { "from": "now-1h", "to": "now" },
        "title": "krr Observability",
        "uid": "krr-overview",
        "version": 1
    })
}

fn row_panel(id: u32, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": "row",
        "title": title,
        "collapsed": false,
        "panels": []
    })
}

fn stat_panel(id: u32, title: &str, expr: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": "stat",
        "title": title,
        "targets": [{
            "expr": expr,
            "refId": "A"
        }],
        "fieldConfig": {
            "defaults": {
                "thresholds": {
                    "steps": [
                        { "color": "green", "value": null },
                        { "color": "red", "value": 80 }
                    ]
                }
            }
        }
    })
}

fn graph_panel(id: u32, title: &str, expr: &str, _row: u32) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": "timeseries",
        "title": title,
        "targets": [{
            "expr": expr,
            "refId": "A"
        }],
        "fieldConfig": {
            "defaults": {}
        }
    })
}

/* ============================= GENERATE ALL ============================= */

pub fn generate_all() -> String {
    let mut output = String::new();

    output.push_str(&generate_service_webhook());
    output.push_str("---\n");
    output.push_str(&generate_service_monitor_webhook());
    output.push_str("---\n");
    output.push_str(&generate_grafana_dashboard_configmap());

    output
}

pub fn generate_service_monitors() -> String {
    generate_service_monitor_webhook()
}

/* ============================= TESTS ============================= */
