//! Parses datastore scan rows into `Recommendation`s.
//!
//! Grounded on `enforcer/model.py::WorkloadRecommendation.build`: a scan row
//! is dropped entirely if its resource isn't `cpu`/`memory`, or if its
//! request is exactly `0.0`, missing, or the sentinel `"?"`, or if its limit
//! is the sentinel `"?"`.

use serde::Deserialize;

use crate::model::{Recommendation, RecommendationValue};

/// One row as returned by the datastore's `ScansResults` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanRow {
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub container: String,
    pub resource: String,
    pub request: ScanValue,
    pub limit: ScanValue,
}

/// A scan row's request/limit field as the datastore serializes it: a
/// number, the literal string `"?"`, or absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScanValue {
    Number(f64),
    Sentinel(String),
    Null,
}

impl ScanValue {
    fn is_question_mark(&self) -> bool {
        matches!(self, ScanValue::Sentinel(s) if s == "?")
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            ScanValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn to_recommendation_value(&self) -> RecommendationValue {
        match self {
            ScanValue::Number(n) => RecommendationValue::Value(*n),
            ScanValue::Sentinel(s) if s == "?" => RecommendationValue::Unknown,
            ScanValue::Sentinel(_) => RecommendationValue::Unknown,
            ScanValue::Null => RecommendationValue::Absent,
        }
    }
}

/// Parses a single scan row into a resource name ("cpu"/"memory") paired
/// with its `Recommendation`, or `None` if the row should be dropped.
pub fn parse_scan_row(row: &ScanRow) -> Option<(String, Recommendation)> {
    if row.resource != "cpu" && row.resource != "memory" {
        return None;
    }

    if row.request.as_number() == Some(0.0) {
        return None;
    }
    if row.request.is_question_mark() {
        return None;
    }
    if matches!(row.request, ScanValue::Null) {
        return None;
    }
    if row.limit.is_question_mark() {
        return None;
    }

    Some((
        row.resource.clone(),
        Recommendation {
            request: row.request.to_recommendation_value(),
            limit: row.limit.to_recommendation_value(),
            info: None,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(resource: &str, request: ScanValue, limit: ScanValue) -> ScanRow {
        ScanRow {
            namespace: "default".into(),
            name: "web".into(),
            kind: "Deployment".into(),
            container: "app".into(),
            resource: resource.into(),
            request,
            limit,
        }
    }

    #[test]
    fn valid_row_parses() {
        let r = row("cpu", ScanValue::Number(0.5), ScanValue::Number(1.0));
        let (resource, rec) = parse_scan_row(&r).unwrap();
        assert_eq!(resource, "cpu");
        assert_eq!(rec.request, RecommendationValue::Value(0.5));
    }

    #[test]
    fn unknown_resource_is_dropped() {
        let r = row("gpu", ScanValue::Number(1.0), ScanValue::Null);
        assert!(parse_scan_row(&r).is_none());
    }

    #[test]
    fn zero_request_is_dropped() {
        let r = row("cpu", ScanValue::Number(0.0), ScanValue::Null);
        assert!(parse_scan_row(&r).is_none());
    }

    #[test]
    fn question_mark_request_is_dropped() {
        let r = row("cpu", ScanValue::Sentinel("?".into()), ScanValue::Null);
        assert!(parse_scan_row(&r).is_none());
    }

    #[test]
    fn question_mark_limit_is_dropped() {
        let r = row("memory", ScanValue::Number(1024.0), ScanValue::Sentinel("?".into()));
        assert!(parse_scan_row(&r).is_none());
    }

    #[test]
    fn null_limit_is_absent_not_dropped() {
        let r = row("cpu", ScanValue::Number(0.5), ScanValue::Null);
        let (_, rec) = parse_scan_row(&r).unwrap();
        assert_eq!(rec.limit, RecommendationValue::Absent);
    }

    #[test]
    fn null_request_is_dropped() {
        let r = row("cpu", ScanValue::Null, ScanValue::Number(1.0));
        assert!(parse_scan_row(&r).is_none());
    }
}
