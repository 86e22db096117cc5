//! Builds a Kubernetes label-selector query string from a workload's
//! `selector` field, tolerant of both `matchLabels`/`matchExpressions` and
//! their snake_case spellings.
//!
//! Grounded on `cluster_loader/loaders/base.py::_build_selector_query` and
//! `_get_match_expression_filter`.

use serde_json::Value;

use super::objectlike::ObjectLikeDict;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl MatchOperator {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "in" => Some(MatchOperator::In),
            "notin" => Some(MatchOperator::NotIn),
            "exists" => Some(MatchOperator::Exists),
            "doesnotexist" => Some(MatchOperator::DoesNotExist),
            _ => None,
        }
    }

    fn as_selector_str(&self) -> &'static str {
        match self {
            MatchOperator::In => "in",
            MatchOperator::NotIn => "notin",
            MatchOperator::Exists => "",
            MatchOperator::DoesNotExist => "",
        }
    }
}

fn match_expression_filter(expr: &Value) -> Option<String> {
    let dict = ObjectLikeDict(expr);
    let key = dict.get_str("key")?;
    let operator_raw = dict.get_str("operator")?;
    let operator = MatchOperator::parse(operator_raw)?;

    match operator {
        MatchOperator::Exists => Some(key.to_string()),
        MatchOperator::DoesNotExist => Some(format!("!{key}")),
        _ => {
            let values: Vec<String> = dict
                .get("values")?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            Some(format!("{key} {} ({})", operator.as_selector_str(), values.join(",")))
        }
    }
}

/// Builds the comma-joined selector query from a `LabelSelector`-shaped
/// JSON value. Returns `None` when there is nothing to select on, matching
/// the original's "empty dict with no match_labels/match_expressions"
/// fallback for legacy `ReplicationController`-style bare label dicts.
pub fn build_selector_query(selector: &Value) -> Option<String> {
    let dict = ObjectLikeDict(selector);
    let mut filters = Vec::new();

    if let Some(match_labels) = dict.get("matchLabels").and_then(Value::as_object) {
        for (k, v) in match_labels {
            if let Some(v) = v.as_str() {
                filters.push(format!("{k}={v}"));
            }
        }
    }

    if let Some(match_expressions) = dict.get("matchExpressions").and_then(Value::as_array) {
        for expr in match_expressions {
            if let Some(f) = match_expression_filter(expr) {
                filters.push(f);
            }
        }
    }

    if filters.is_empty() {
        if let Some(obj) = selector.as_object() {
            if !obj.is_empty() {
                for (k, v) in obj {
                    if let Some(v) = v.as_str() {
                        filters.push(format!("{k}={v}"));
                    }
                }
            }
        }
        if filters.is_empty() {
            return None;
        }
    }

    Some(filters.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_query_from_match_labels() {
        let selector = json!({"matchLabels": {"app": "web", "tier": "frontend"}});
        let query = build_selector_query(&selector).unwrap();
        let mut parts: Vec<&str> = query.split(',').collect();
        parts.sort();
        assert_eq!(parts, vec!["app=web", "tier=frontend"]);
    }

    #[test]
    fn builds_query_from_snake_case_match_labels() {
        let selector = json!({"match_labels": {"app": "web"}});
        assert_eq!(build_selector_query(&selector).unwrap(), "app=web");
    }

    #[test]
    fn exists_expression_has_no_operator() {
        let selector = json!({"matchExpressions": [{"key": "tier", "operator": "Exists"}]});
        assert_eq!(build_selector_query(&selector).unwrap(), "tier");
    }

    #[test]
    fn does_not_exist_expression_is_negated() {
        let selector = json!({"matchExpressions": [{"key": "tier", "operator": "DoesNotExist"}]});
        assert_eq!(build_selector_query(&selector).unwrap(), "!tier");
    }

    #[test]
    fn in_expression_renders_value_list() {
        let selector = json!({
            "matchExpressions": [{"key": "env", "operator": "In", "values": ["prod", "staging"]}]
        });
        assert_eq!(build_selector_query(&selector).unwrap(), "env in (prod,staging)");
    }

    #[test]
    fn legacy_bare_label_dict_is_used_as_fallback() {
        let selector = json!({"app": "web"});
        assert_eq!(build_selector_query(&selector).unwrap(), "app=web");
    }

    #[test]
    fn empty_selector_is_none() {
        assert!(build_selector_query(&json!({})).is_none());
    }
}
