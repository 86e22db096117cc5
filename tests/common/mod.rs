use krr::recommendation::{ScanRow, ScanValue};

/// Builds a `ScansResults` row the way the datastore would return one.
pub fn scan_row(namespace: &str, name: &str, kind: &str, container: &str, resource: &str, request: f64) -> ScanRow {
    ScanRow {
        namespace: namespace.to_string(),
        name: name.to_string(),
        kind: kind.to_string(),
        container: container.to_string(),
        resource: resource.to_string(),
        request: ScanValue::Number(request),
        limit: ScanValue::Null,
    }
}

/// A Pod with a single container carrying the given CPU request.
pub fn pod_with_cpu_request(container_name: &str, cpu_request: &str) -> k8s_openapi::api::core::v1::Pod {
    use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, ResourceRequirements};
    use std::collections::BTreeMap;

    let mut requests = BTreeMap::new();
    requests.insert(
        "cpu".to_string(),
        k8s_openapi::apimachinery::pkg::api::resource::Quantity(cpu_request.to_string()),
    );
    Pod {
        spec: Some(PodSpec {
            containers: vec![Container {
                name: container_name.to_string(),
                resources: Some(ResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}
