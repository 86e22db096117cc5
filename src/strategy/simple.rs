//! The "simple" strategy: percentile CPU usage, peak memory plus a buffer.
//!
//! Grounded line-for-line on `robusta_krr/strategies/simple.py`.

use async_trait::async_trait;

use crate::model::{ResourceType, Workload};

use super::{HistoryData, ResourceRecommendation, RunResult, Strategy};

#[derive(Debug, Clone)]
pub struct SimpleStrategySettings {
    pub cpu_percentile: f64,
    pub memory_buffer_percentage: f64,
    pub points_required: u64,
    pub allow_hpa: bool,
    pub use_oomkill_data: bool,
    pub oom_memory_buffer_percentage: f64,
}

impl Default for SimpleStrategySettings {
    fn default() -> Self {
        SimpleStrategySettings {
            cpu_percentile: 95.0,
            memory_buffer_percentage: 15.0,
            points_required: 100,
            allow_hpa: false,
            use_oomkill_data: false,
            oom_memory_buffer_percentage: 25.0,
        }
    }
}

impl SimpleStrategySettings {
    /// `calculate_memory_proposal`: peak usage across all pods, bumped by
    /// the configured buffer, floored by the OOMKill-adjusted peak if
    /// OOMKill bumping produced a higher value.
    pub fn calculate_memory_proposal(&self, data: &crate::model::MetricSeries, max_oomkill: f64) -> f64 {
        let peaks: Vec<f64> = data
            .values()
            .filter_map(|series| series.iter().map(|(_, v)| *v).fold(None, max_fold))
            .collect();
        if peaks.is_empty() {
            return f64::NAN;
        }
        let overall_peak = peaks.iter().cloned().fold(f64::MIN, f64::max);
        let from_usage = overall_peak * (1.0 + self.memory_buffer_percentage / 100.0);
        let from_oomkill = max_oomkill * (1.0 + self.oom_memory_buffer_percentage / 100.0);
        from_usage.max(from_oomkill)
    }

    /// `calculate_cpu_proposal`: the max sample across all pods' series,
    /// concatenated (the percentile selection already happened at query
    /// time via `PercentileCPULoader`).
    pub fn calculate_cpu_proposal(&self, data: &crate::model::MetricSeries) -> f64 {
        if data.is_empty() {
            return f64::NAN;
        }
        data.values()
            .flat_map(|series| series.iter().map(|(_, v)| *v))
            .fold(f64::MIN, f64::max)
    }
}

fn max_fold(acc: Option<f64>, v: f64) -> Option<f64> {
    Some(acc.map_or(v, |a| a.max(v)))
}

pub struct SimpleStrategy {
    pub settings: SimpleStrategySettings,
}

impl Default for SimpleStrategy {
    fn default() -> Self {
        SimpleStrategy {
            settings: SimpleStrategySettings::default(),
        }
    }
}

impl SimpleStrategy {
    fn total_points(data: &crate::model::MetricSeries) -> f64 {
        data.values()
            .filter_map(|series| series.first().map(|(_, v)| *v))
            .sum()
    }

    fn calculate_cpu(&self, history: &HistoryData, workload: &Workload) -> ResourceRecommendation {
        let Some(data) = history.get("PercentileCPULoader") else {
            return ResourceRecommendation::undefined("No data");
        };
        if data.is_empty() {
            return ResourceRecommendation::undefined("No data");
        }

        let count_data = history.get("CPUAmountLoader");
        let total_points = count_data.map(Self::total_points).unwrap_or(0.0);
        if total_points < self.settings.points_required as f64 {
            return ResourceRecommendation::undefined("Not enough data");
        }

        if let Some(hpa) = &workload.hpa {
            if hpa.target_cpu_utilization_percentage.is_some() && !self.settings.allow_hpa {
                return ResourceRecommendation::undefined("HPA detected");
            }
        }

        let cpu_usage = self.settings.calculate_cpu_proposal(data);
        ResourceRecommendation {
            request: cpu_usage,
            limit: None,
            info: None,
        }
    }

    fn calculate_memory(&self, history: &HistoryData, workload: &Workload) -> ResourceRecommendation {
        let Some(data) = history.get("MaxMemoryLoader") else {
            return ResourceRecommendation::undefined("No data");
        };

        let mut oomkill_detected = false;
        let max_oomkill_value = if self.settings.use_oomkill_data {
            let oomkill_data = history.get("MaxOOMKilledMemoryLoader");
            let peak = oomkill_data
                .and_then(|d| {
                    d.values()
                        .filter_map(|series| series.first().map(|(_, v)| *v))
                        .fold(None, max_fold)
                })
                .unwrap_or(0.0);
            if peak != 0.0 {
                oomkill_detected = true;
            }
            peak
        } else {
            0.0
        };

        if data.is_empty() {
            return ResourceRecommendation::undefined("No data");
        }

        let count_data = history.get("MemoryAmountLoader");
        let total_points = count_data.map(Self::total_points).unwrap_or(0.0);
        if total_points < self.settings.points_required as f64 {
            return ResourceRecommendation::undefined("Not enough data");
        }

        if let Some(hpa) = &workload.hpa {
            if hpa.target_memory_utilization_percentage.is_some() && !self.settings.allow_hpa {
                return ResourceRecommendation::undefined("HPA detected");
            }
        }

        let memory_usage = self.settings.calculate_memory_proposal(data, max_oomkill_value);
        ResourceRecommendation {
            request: memory_usage,
            limit: Some(memory_usage),
            info: if oomkill_detected { Some("OOMKill detected".to_string()) } else { None },
        }
    }
}

#[async_trait]
impl Strategy for SimpleStrategy {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn required_metrics(&self) -> Vec<&'static str> {
        let mut metrics = vec!["PercentileCPULoader", "MaxMemoryLoader", "CPUAmountLoader", "MemoryAmountLoader"];
        if self.settings.use_oomkill_data {
            metrics.push("MaxOOMKilledMemoryLoader");
        }
        metrics
    }

    async fn run(&self, history: &HistoryData, workload: &Workload) -> RunResult {
        let mut result = RunResult::new();
        result.insert(ResourceType::Cpu, self.calculate_cpu(history, workload));
        result.insert(ResourceType::Memory, self.calculate_memory(history, workload));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HpaSpec, ResourceAllocations, WorkloadKind};

    fn series(points: &[(f64, f64)]) -> crate::model::MetricSeries {
        let mut m = crate::model::MetricSeries::new();
        m.insert("pod-a".to_string(), points.to_vec());
        m
    }

    fn workload(hpa: Option<HpaSpec>) -> Workload {
        Workload {
            cluster: None,
            namespace: "default".into(),
            kind: WorkloadKind::Deployment,
            name: "web".into(),
            container: "app".into(),
            allocations: ResourceAllocations::default(),
            hpa,
            pods: vec![],
            warnings: vec![],
        }
    }

    #[tokio::test]
    async fn no_data_is_undefined() {
        let strategy = SimpleStrategy::default();
        let history = HistoryData::new();
        let result = strategy.run(&history, &workload(None)).await;
        assert!(result[&ResourceType::Cpu].is_undefined());
        assert_eq!(result[&ResourceType::Cpu].info.as_deref(), Some("No data"));
    }

    #[tokio::test]
    async fn not_enough_points_is_undefined() {
        let strategy = SimpleStrategy::default();
        let mut history = HistoryData::new();
        history.insert("PercentileCPULoader", series(&[(0.0, 0.5)]));
        history.insert("CPUAmountLoader", series(&[(0.0, 5.0)])); // below points_required=100
        let result = strategy.run(&history, &workload(None)).await;
        assert_eq!(result[&ResourceType::Cpu].info.as_deref(), Some("Not enough data"));
    }

    #[tokio::test]
    async fn hpa_blocks_recommendation_unless_allowed() {
        let strategy = SimpleStrategy::default();
        let mut history = HistoryData::new();
        history.insert("PercentileCPULoader", series(&[(0.0, 0.5)]));
        history.insert("CPUAmountLoader", series(&[(0.0, 150.0)]));
        let hpa = Some(HpaSpec {
            target_cpu_utilization_percentage: Some(80),
            target_memory_utilization_percentage: None,
        });
        let result = strategy.run(&history, &workload(hpa)).await;
        assert_eq!(result[&ResourceType::Cpu].info.as_deref(), Some("HPA detected"));
    }

    #[tokio::test]
    async fn allow_hpa_flag_bypasses_the_gate() {
        let mut strategy = SimpleStrategy::default();
        strategy.settings.allow_hpa = true;
        let mut history = HistoryData::new();
        history.insert("PercentileCPULoader", series(&[(0.0, 0.5), (1.0, 0.8)]));
        history.insert("CPUAmountLoader", series(&[(0.0, 150.0)]));
        let hpa = Some(HpaSpec {
            target_cpu_utilization_percentage: Some(80),
            target_memory_utilization_percentage: None,
        });
        let result = strategy.run(&history, &workload(hpa)).await;
        assert!(!result[&ResourceType::Cpu].is_undefined());
        assert_eq!(result[&ResourceType::Cpu].request, 0.8);
    }

    #[test]
    fn memory_proposal_adds_buffer_to_peak() {
        let settings = SimpleStrategySettings::default();
        let data = series(&[(0.0, 1000.0), (1.0, 2000.0)]);
        let proposal = settings.calculate_memory_proposal(&data, 0.0);
        assert!((proposal - 2300.0).abs() < 1e-6); // 2000 * 1.15
    }

    #[test]
    fn oomkill_bump_wins_when_higher_than_usage_buffer() {
        let settings = SimpleStrategySettings::default();
        let data = series(&[(0.0, 1000.0)]);
        let proposal = settings.calculate_memory_proposal(&data, 10_000.0);
        assert!((proposal - 12_500.0).abs() < 1e-6); // 10000 * 1.25
    }

    #[tokio::test]
    async fn oomkill_detected_flag_surfaces_in_info() {
        let mut strategy = SimpleStrategy::default();
        strategy.settings.use_oomkill_data = true;
        let mut history = HistoryData::new();
        history.insert("MaxMemoryLoader", series(&[(0.0, 1000.0)]));
        history.insert("MemoryAmountLoader", series(&[(0.0, 150.0)]));
        history.insert("MaxOOMKilledMemoryLoader", series(&[(0.0, 5000.0)]));
        let result = strategy.run(&history, &workload(None)).await;
        assert_eq!(result[&ResourceType::Memory].info.as_deref(), Some("OOMKill detected"));
    }
}
