//! The strategy engine: turns a workload's metric history into a
//! `Recommendation` per resource.
//!
//! Grounded on `robusta_krr/core/abstract/strategies.py`. The original uses
//! a subclass-discovery registry (`BaseStrategy.find`/`get_all`); per the
//! design notes this is replaced with an explicit name -> constructor
//! registry, since relying on class-body side effects to populate a
//! registry is exactly the kind of magic the redesign calls out to avoid.

pub mod ai;
pub mod simple;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::{MetricSeries, ResourceType, Workload};

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecommendation {
    pub request: f64,
    pub limit: Option<f64>,
    pub info: Option<String>,
}

impl ResourceRecommendation {
    pub fn undefined(info: impl Into<String>) -> Self {
        ResourceRecommendation {
            request: f64::NAN,
            limit: None,
            info: Some(info.into()),
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.request.is_nan()
    }
}

/// History data for one metric family, keyed by pod name.
pub type HistoryData = HashMap<&'static str, MetricSeries>;
pub type RunResult = HashMap<ResourceType, ResourceRecommendation>;

/// `run` is `async` so that strategies needing network I/O (the AI
/// strategy's provider dispatch) can await it directly instead of bridging
/// with `futures::executor::block_on`. Purely CPU-bound strategies (the
/// simple strategy) just compute and return without ever awaiting.
#[async_trait]
pub trait Strategy {
    fn name(&self) -> &'static str;
    /// Metric family names this strategy needs loaded before `run` is called.
    fn required_metrics(&self) -> Vec<&'static str>;
    async fn run(&self, history: &HistoryData, workload: &Workload) -> RunResult;
}

/// A plain registry keyed by lowercase strategy name, populated explicitly
/// at startup rather than through class-discovery magic.
pub struct StrategyRegistry {
    strategies: HashMap<String, Box<dyn Strategy + Send + Sync>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        StrategyRegistry {
            strategies: HashMap::new(),
        }
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy + Send + Sync>) {
        self.strategies.insert(strategy.name().to_lowercase(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<&(dyn Strategy + Send + Sync)> {
        self.strategies.get(&name.to_lowercase()).map(|b| b.as_ref())
    }

    pub fn with_defaults() -> Self {
        Self::with_simple_settings(simple::SimpleStrategySettings::default())
    }

    /// Registers the simple strategy with the given tunables instead of its
    /// defaults, plus the AI strategy unchanged.
    pub fn with_simple_settings(simple_settings: simple::SimpleStrategySettings) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(simple::SimpleStrategy { settings: simple_settings }));
        registry.register(Box::new(ai::AiStrategy::default()));
        registry
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_by_lowercase_name() {
        let registry = StrategyRegistry::with_defaults();
        assert!(registry.get("simple").is_some());
        assert!(registry.get("SIMPLE").is_some());
        assert!(registry.get("ai").is_some());
        assert!(registry.get("nonexistent").is_none());
    }
}
