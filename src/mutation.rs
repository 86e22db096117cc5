//! Admission-time mutation: turns a looked-up recommendation into a
//! JSON-Patch that rewrites a Pod's container resources in place.
//!
//! Grounded line-for-line on `enforcer/enforcer_main.py`'s `/mutate` handler:
//! resolve the pod's owning workload, look up its stored recommendation,
//! build a patch per container, and fail open (`allowed: true`, empty
//! patch) whenever any step can't produce a confident answer.

use k8s_openapi::api::core::v1::Pod;
use serde_json::Value;

use crate::model::WorkloadRecommendation;
use crate::patch::patch_container_resources;

/// The result of evaluating one admission request: whether to allow it,
/// and the JSON-Patch operations (if any) to apply.
#[derive(Debug, Clone, Default)]
pub struct MutationVerdict {
    pub allowed: bool,
    pub patch_ops: Vec<Value>,
    pub warnings: Vec<String>,
}

impl MutationVerdict {
    pub fn allow_unmodified() -> Self {
        MutationVerdict {
            allowed: true,
            patch_ops: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Builds the full JSON-Patch document for a Pod given the recommendation
/// for its owning workload. Fail-open throughout: a container with no
/// corresponding recommendation, or a recommendation that fails patch
/// validation, is left untouched rather than blocking the pod.
pub fn build_mutation_patch(pod: &Pod, recommendation: &WorkloadRecommendation) -> MutationVerdict {
    let mut ops = Vec::new();
    let mut warnings = Vec::new();

    let Some(spec) = &pod.spec else {
        return MutationVerdict::allow_unmodified();
    };

    for (index, container) in spec.containers.iter().enumerate() {
        let container_rec = recommendation.get(&container.name);

        let container_json = match serde_json::to_value(container) {
            Ok(v) => v,
            Err(e) => {
                warnings.push(format!("container '{}' could not be serialized: {e}", container.name));
                continue;
            }
        };

        let container_ops = patch_container_resources(index, &container_json, container_rec);
        if container_ops.is_empty() {
            continue;
        }
        ops.extend(container_ops);
    }

    MutationVerdict {
        allowed: true,
        patch_ops: ops,
        warnings,
    }
}
