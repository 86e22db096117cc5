//! Severity calculation: how far a current allocation is from the
//! recommended one. Grounded on
//! `robusta_krr/core/models/severity.py` and
//! `severity_calculator/{cpu,memory}_calculator.py`, which bind a
//! per-resource calculator function into a registry rather than using an
//! inheritance hierarchy — reproduced here as a plain match rather than a
//! trait-object registry, since the set of resource types is closed.

use crate::model::{RecommendationValue, ResourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Unknown,
    Good,
    Ok,
    Warning,
    Critical,
}

impl Severity {
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Unknown => "dim",
            Severity::Good => "green",
            Severity::Ok => "gray",
            Severity::Warning => "yellow",
            Severity::Critical => "red",
        }
    }

    /// Mirrors `Severity.calculate`: a "?" sentinel on either side collapses
    /// to `Unknown` before any resource-specific threshold logic runs.
    pub fn calculate(
        current: RecommendationValue,
        recommended: RecommendationValue,
        resource_type: ResourceType,
    ) -> Severity {
        if current.is_unknown() || recommended.is_unknown() {
            return Severity::Unknown;
        }

        calculate_severity(current.as_value(), recommended.as_value(), resource_type)
    }
}

fn calculate_severity(
    current: Option<f64>,
    recommended: Option<f64>,
    resource_type: ResourceType,
) -> Severity {
    match resource_type {
        ResourceType::Cpu => cpu_severity(current, recommended),
        ResourceType::Memory => memory_severity(current, recommended),
    }
}

fn none_handling(current: Option<f64>, recommended: Option<f64>) -> Option<Severity> {
    match (current, recommended) {
        (None, None) => Some(Severity::Good),
        (None, Some(_)) | (Some(_), None) => Some(Severity::Warning),
        (Some(_), Some(_)) => None,
    }
}

fn cpu_severity(current: Option<f64>, recommended: Option<f64>) -> Severity {
    if let Some(s) = none_handling(current, recommended) {
        return s;
    }
    let diff = (current.unwrap() - recommended.unwrap()).abs();
    if diff >= 0.5 {
        Severity::Critical
    } else if diff >= 0.25 {
        Severity::Warning
    } else if diff >= 0.1 {
        Severity::Ok
    } else {
        Severity::Good
    }
}

fn memory_severity(current: Option<f64>, recommended: Option<f64>) -> Severity {
    if let Some(s) = none_handling(current, recommended) {
        return s;
    }
    let diff = (current.unwrap() - recommended.unwrap()).abs() / 1024.0 / 1024.0;
    if diff >= 500.0 {
        Severity::Critical
    } else if diff >= 250.0 {
        Severity::Warning
    } else if diff >= 100.0 {
        Severity::Ok
    } else {
        Severity::Good
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sentinel_short_circuits() {
        let s = Severity::calculate(
            RecommendationValue::Unknown,
            RecommendationValue::Value(1.0),
            ResourceType::Cpu,
        );
        assert_eq!(s, Severity::Unknown);
    }

    #[test]
    fn both_none_is_good() {
        assert_eq!(cpu_severity(None, None), Severity::Good);
    }

    #[test]
    fn one_none_is_warning() {
        assert_eq!(cpu_severity(Some(1.0), None), Severity::Warning);
        assert_eq!(memory_severity(None, Some(1.0)), Severity::Warning);
    }

    #[test]
    fn cpu_thresholds() {
        assert_eq!(cpu_severity(Some(1.0), Some(1.05)), Severity::Good);
        assert_eq!(cpu_severity(Some(1.0), Some(1.15)), Severity::Ok);
        assert_eq!(cpu_severity(Some(1.0), Some(1.3)), Severity::Warning);
        assert_eq!(cpu_severity(Some(1.0), Some(1.6)), Severity::Critical);
    }

    #[test]
    fn memory_thresholds_are_in_mib() {
        let mib = 1024.0 * 1024.0;
        assert_eq!(memory_severity(Some(0.0), Some(50.0 * mib)), Severity::Good);
        assert_eq!(memory_severity(Some(0.0), Some(150.0 * mib)), Severity::Ok);
        assert_eq!(memory_severity(Some(0.0), Some(300.0 * mib)), Severity::Warning);
        assert_eq!(memory_severity(Some(0.0), Some(600.0 * mib)), Severity::Critical);
    }
}
