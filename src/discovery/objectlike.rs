//! A dict-like view over heterogeneous Kubernetes objects (CRDs such as
//! ArgoRollouts, OpenShift DeploymentConfigs, Strimzi PodSets) whose fields
//! sometimes arrive camelCase and sometimes snake_case depending on which
//! client serialized them.
//!
//! Grounded on `cluster_loader/loaders/base.py::_build_selector_query`,
//! whose comment explains the root cause: "normally the kubernetes API
//! client renames matchLabels to match_labels in python but for CRDs like
//! ArgoRollouts that renaming doesn't happen".

use serde_json::Value;

/// Wraps a `serde_json::Value` and looks a field up trying both the given
/// key and its camelCase/snake_case counterpart.
#[derive(Debug, Clone)]
pub struct ObjectLikeDict<'a>(pub &'a Value);

fn to_camel_case(snake: &str) -> String {
    let mut out = String::new();
    let mut upper_next = false;
    for c in snake.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn to_snake_case(camel: &str) -> String {
    let mut out = String::new();
    for c in camel.chars() {
        if c.is_uppercase() {
            out.push('_');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl<'a> ObjectLikeDict<'a> {
    /// Looks up `key`, falling back to its camelCase or snake_case spelling.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        if let Some(v) = self.0.get(key) {
            return Some(v);
        }
        let camel = to_camel_case(key);
        if camel != key {
            if let Some(v) = self.0.get(&camel) {
                return Some(v);
            }
        }
        let snake = to_snake_case(key);
        if snake != key {
            if let Some(v) = self.0.get(&snake) {
                return Some(v);
            }
        }
        None
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_snake_case_lookup_of_camel_field() {
        let v = json!({"matchLabels": {"app": "web"}});
        let dict = ObjectLikeDict(&v);
        assert!(dict.get("match_labels").is_some());
    }

    #[test]
    fn resolves_camel_case_lookup_of_snake_field() {
        let v = json!({"match_labels": {"app": "web"}});
        let dict = ObjectLikeDict(&v);
        assert!(dict.get("matchLabels").is_some());
    }

    #[test]
    fn exact_match_takes_priority() {
        let v = json!({"match_labels": {"a": 1}, "matchLabels": {"b": 2}});
        let dict = ObjectLikeDict(&v);
        assert_eq!(dict.get("match_labels").unwrap(), &json!({"a": 1}));
    }

    #[test]
    fn missing_key_returns_none() {
        let v = json!({});
        let dict = ObjectLikeDict(&v);
        assert!(dict.get("anything").is_none());
    }
}
