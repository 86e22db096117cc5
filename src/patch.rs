//! Builds the JSON-Patch operations that mutate a Pod's container resources
//! toward a recommendation.
//!
//! Grounded line-for-line on `enforcer/patch_manager.py`:
//! `significant_diff`, `get_updated_resources`, `validate_resources`,
//! `patch_container_resources`.

use serde_json::{json, Value};

use crate::model::{ContainerRecommendation, RecommendationValue};
use crate::units::{parse_cpu, parse_memory};

/// `true` if `old` is absent, or the relative change from `old` to `new`
/// exceeds `percent_threshold`.
pub fn significant_diff(old: Option<f64>, new: f64, percent_threshold: f64) -> bool {
    match old {
        None => true,
        Some(old) if old == 0.0 => true,
        Some(old) => ((new - old).abs() / old.abs()) * 100.0 > percent_threshold,
    }
}

#[derive(Debug, Clone, Default)]
struct ResourceFields {
    cpu_request: Option<String>,
    cpu_limit: Option<String>,
    memory_request: Option<String>,
    memory_limit: Option<String>,
}

fn extract(resources: &Value) -> ResourceFields {
    let get = |section: &str, key: &str| -> Option<String> {
        resources
            .get(section)
            .and_then(|s| s.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    ResourceFields {
        cpu_request: get("requests", "cpu"),
        cpu_limit: get("limits", "cpu"),
        memory_request: get("requests", "memory"),
        memory_limit: get("limits", "memory"),
    }
}

fn apply(fields: &ResourceFields) -> Value {
    let mut requests = serde_json::Map::new();
    let mut limits = serde_json::Map::new();
    if let Some(v) = &fields.cpu_request {
        requests.insert("cpu".to_string(), json!(v));
    }
    if let Some(v) = &fields.memory_request {
        requests.insert("memory".to_string(), json!(v));
    }
    if let Some(v) = &fields.cpu_limit {
        limits.insert("cpu".to_string(), json!(v));
    }
    if let Some(v) = &fields.memory_limit {
        limits.insert("memory".to_string(), json!(v));
    }

    let mut out = serde_json::Map::new();
    if !requests.is_empty() {
        out.insert("requests".to_string(), Value::Object(requests));
    }
    if !limits.is_empty() {
        out.insert("limits".to_string(), Value::Object(limits));
    }
    Value::Object(out)
}

/// Computes the updated `resources` object for a container given its
/// current `resources` JSON and a recommendation, following
/// `get_updated_resources`: unset old values are always overwritten; an
/// existing limit with no corresponding recommended limit is dropped. New
/// values are written as plain decimal strings (the recommendation's raw
/// cores/bytes), not reformatted into Kubernetes quantity shorthand.
fn get_updated_resources(resources: &Value, recommendation: &ContainerRecommendation) -> Value {
    let mut fields = extract(resources);

    if let Some(cpu) = &recommendation.cpu {
        let old_req = fields.cpu_request.as_deref().and_then(parse_cpu);
        if let RecommendationValue::Value(new_req) = cpu.request {
            if old_req.is_none() || significant_diff(old_req, new_req, 20.0) {
                fields.cpu_request = Some(new_req.to_string());
            }
        }

        let old_lim = fields.cpu_limit.as_deref().and_then(parse_cpu);
        match cpu.limit {
            RecommendationValue::Value(new_lim) => {
                if old_lim.is_none() || significant_diff(old_lim, new_lim, 20.0) {
                    fields.cpu_limit = Some(new_lim.to_string());
                }
            }
            _ => {
                if old_lim.is_some() {
                    fields.cpu_limit = None;
                }
            }
        }
    }

    if let Some(mem) = &recommendation.memory {
        let old_req = fields.memory_request.as_deref().and_then(parse_memory);
        if let RecommendationValue::Value(new_req) = mem.request {
            if old_req.is_none() || significant_diff(old_req, new_req, 20.0) {
                fields.memory_request = Some(new_req.to_string());
            }
        }

        let old_lim = fields.memory_limit.as_deref().and_then(parse_memory);
        match mem.limit {
            RecommendationValue::Value(new_lim) => {
                if old_lim.is_none() || significant_diff(old_lim, new_lim, 20.0) {
                    fields.memory_limit = Some(new_lim.to_string());
                }
            }
            _ => {
                if old_lim.is_some() {
                    fields.memory_limit = None;
                }
            }
        }
    }

    apply(&fields)
}

/// `true` if both requests are positive and (when a limit is present) the
/// limit is not below the request, for both cpu and memory independently.
fn validate_resources(resources: &Value) -> bool {
    let fields = extract(resources);

    let check = |req: &Option<String>, lim: &Option<String>, parse: fn(&str) -> Option<f64>| -> bool {
        let req_v = req.as_deref().and_then(parse);
        if let Some(r) = req_v {
            if r <= 0.0 {
                return false;
            }
        }
        if let (Some(r), Some(l)) = (req_v, lim.as_deref().and_then(parse)) {
            if l < r {
                return false;
            }
        }
        true
    };

    check(&fields.cpu_request, &fields.cpu_limit, parse_cpu)
        && check(&fields.memory_request, &fields.memory_limit, parse_memory)
}

/// Builds the `add`/`replace` JSON-Patch operation for a single container's
/// `resources` field, or an empty vec if there is no recommendation, no
/// effective change, or the resulting resources would be invalid.
pub fn patch_container_resources(
    container_index: usize,
    container: &Value,
    recommendation: Option<&ContainerRecommendation>,
) -> Vec<Value> {
    let Some(recommendation) = recommendation else {
        return Vec::new();
    };

    let had_resources = container.get("resources").is_some();
    let current = container
        .get("resources")
        .cloned()
        .unwrap_or_else(|| json!({}));
    let updated = get_updated_resources(&current, recommendation);

    if current == updated {
        return Vec::new();
    }
    if !validate_resources(&updated) {
        return Vec::new();
    }

    vec![json!({
        "op": if had_resources { "replace" } else { "add" },
        "path": format!("/spec/containers/{container_index}/resources"),
        "value": updated,
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Recommendation;

    fn rec(request: f64, limit: Option<f64>) -> Recommendation {
        Recommendation {
            request: RecommendationValue::Value(request),
            limit: limit.map_or(RecommendationValue::Absent, RecommendationValue::Value),
            info: None,
        }
    }

    #[test]
    fn no_recommendation_produces_no_patch() {
        let container = json!({"name": "app"});
        assert!(patch_container_resources(0, &container, None).is_empty());
    }

    #[test]
    fn missing_resources_adds_with_op_add() {
        let container = json!({"name": "app"});
        let recommendation = ContainerRecommendation {
            cpu: Some(rec(0.5, None)),
            memory: Some(rec(256.0 * 1024.0 * 1024.0, Some(256.0 * 1024.0 * 1024.0))),
        };
        let patches = patch_container_resources(0, &container, Some(&recommendation));
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0]["op"], "add");
        assert_eq!(patches[0]["path"], "/spec/containers/0/resources");
        assert_eq!(patches[0]["value"]["requests"]["cpu"], "0.5");
    }

    #[test]
    fn existing_resources_uses_op_replace() {
        let container = json!({
            "name": "app",
            "resources": {"requests": {"cpu": "100m"}}
        });
        let recommendation = ContainerRecommendation {
            cpu: Some(rec(1.0, None)),
            memory: None,
        };
        let patches = patch_container_resources(0, &container, Some(&recommendation));
        assert_eq!(patches[0]["op"], "replace");
    }

    #[test]
    fn insignificant_diff_is_not_patched() {
        let container = json!({
            "name": "app",
            "resources": {"requests": {"cpu": "1000m"}}
        });
        let recommendation = ContainerRecommendation {
            cpu: Some(rec(1.01, None)), // ~1% change, below 20% threshold
            memory: None,
        };
        assert!(patch_container_resources(0, &container, Some(&recommendation)).is_empty());
    }

    #[test]
    fn absent_recommended_limit_drops_existing_limit() {
        let container = json!({
            "name": "app",
            "resources": {"requests": {"cpu": "100m"}, "limits": {"cpu": "200m"}}
        });
        let recommendation = ContainerRecommendation {
            cpu: Some(rec(0.5, None)),
            memory: None,
        };
        let patches = patch_container_resources(0, &container, Some(&recommendation));
        assert_eq!(patches.len(), 1);
        assert!(patches[0]["value"]["limits"].get("cpu").is_none());
    }

    #[test]
    fn invalid_limit_below_request_is_dropped_silently() {
        assert!(!validate_resources(&json!({
            "requests": {"cpu": "500m"},
            "limits": {"cpu": "100m"}
        })));
    }

    #[test]
    fn zero_request_is_invalid() {
        assert!(!validate_resources(&json!({"requests": {"cpu": "0"}})));
    }

    #[test]
    fn significant_diff_true_when_no_old_value() {
        assert!(significant_diff(None, 5.0, 20.0));
    }

    #[test]
    fn significant_diff_respects_threshold() {
        assert!(!significant_diff(Some(100.0), 105.0, 20.0));
        assert!(significant_diff(Some(100.0), 130.0, 20.0));
    }
}
