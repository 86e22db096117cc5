//! The AI-assisted strategy: extracts summary statistics from the usage
//! history, asks a pluggable provider for a recommendation, then clamps and
//! sanity-checks the answer before handing it back.
//!
//! Grounded on `core/integrations/ai/base.py` and the provider files
//! (`openai_provider.py`, `anthropic_provider.py`, `gemini_provider.py`,
//! `ollama_provider.py`): provider selection is driven by which API-key env
//! var is set, not a config flag. The actual HTTP call to the provider is
//! an external collaborator (Non-goal), modeled here as the `AiProvider`
//! trait so the statistics extraction, prompt shaping, retry and clamping
//! logic are fully implemented and testable without a network call.

use std::env;

use async_trait::async_trait;
use tracing::warn;

use crate::model::{MetricSeries, ResourceType, Workload};

use super::{HistoryData, ResourceRecommendation, RunResult, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

/// Mirrors the original's auto-detection: the first provider whose API-key
/// env var is set wins; Ollama needs no key and is the fallback when a host
/// is configured but no other provider key is present.
pub fn detect_provider() -> Option<AiProviderKind> {
    if env::var("OPENAI_API_KEY").is_ok() {
        Some(AiProviderKind::OpenAi)
    } else if env::var("ANTHROPIC_API_KEY").is_ok() {
        Some(AiProviderKind::Anthropic)
    } else if env::var("GEMINI_API_KEY").is_ok() || env::var("GOOGLE_API_KEY").is_ok() {
        Some(AiProviderKind::Gemini)
    } else if env::var("OLLAMA_HOST").is_ok() {
        Some(AiProviderKind::Ollama)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct ResourceStats {
    pub mean: f64,
    pub max: f64,
    pub p95: f64,
    pub stddev: f64,
    pub sample_count: usize,
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (pct / 100.0) * (sorted.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Flattens a metric series across pods and computes summary statistics.
pub fn extract_stats(data: &MetricSeries) -> Option<ResourceStats> {
    let mut values: Vec<f64> = data.values().flat_map(|s| s.iter().map(|(_, v)| *v)).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let sum: f64 = values.iter().sum();
    let mean = sum / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    Some(ResourceStats {
        mean,
        max: *values.last().unwrap(),
        p95: percentile(&values, 95.0),
        stddev: variance.sqrt(),
        sample_count: values.len(),
    })
}

#[derive(Debug, Clone)]
pub struct AiPrompt {
    pub workload: String,
    pub cpu_stats: Option<ResourceStats>,
    pub memory_stats: Option<ResourceStats>,
}

/// Builds the natural-language-ready prompt payload from workload stats.
pub fn build_prompt(workload: &Workload, cpu: Option<ResourceStats>, memory: Option<ResourceStats>) -> AiPrompt {
    AiPrompt {
        workload: workload.to_string(),
        cpu_stats: cpu,
        memory_stats: memory,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AiResourceProposal {
    pub request: f64,
    pub limit: Option<f64>,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn propose(&self, prompt: &AiPrompt) -> anyhow::Result<(AiResourceProposal, AiResourceProposal)>;
}

/// Clamps a proposal so it never recommends below the observed mean or
/// above some sane multiple of the observed max, guarding against a
/// hallucinated value derailing the cluster.
fn clamp_proposal(proposal: AiResourceProposal, stats: &ResourceStats) -> AiResourceProposal {
    let floor = stats.mean.max(0.0);
    let ceiling = stats.max * 4.0;
    let request = proposal.request.clamp(floor, ceiling.max(floor));
    if proposal.request != request {
        warn!(
            original = proposal.request,
            clamped = request,
            "AI proposal outside sane bounds, clamping"
        );
    }
    AiResourceProposal {
        request,
        limit: proposal.limit.map(|l| l.max(request)),
    }
}

pub struct AiStrategy {
    pub provider: Option<Box<dyn AiProvider>>,
    pub retries: u32,
}

impl Default for AiStrategy {
    fn default() -> Self {
        AiStrategy {
            provider: None,
            retries: 2,
        }
    }
}

impl AiStrategy {
    pub fn with_provider(provider: Box<dyn AiProvider>) -> Self {
        AiStrategy {
            provider: Some(provider),
            retries: 2,
        }
    }

    async fn propose_with_retry(
        &self,
        prompt: &AiPrompt,
    ) -> Option<(AiResourceProposal, AiResourceProposal)> {
        let provider = self.provider.as_ref()?;
        for attempt in 0..=self.retries {
            match tokio::time::timeout(std::time::Duration::from_secs(30), provider.propose(prompt)).await {
                Ok(Ok(result)) => return Some(result),
                Ok(Err(e)) => warn!(attempt, error = %e, "AI provider call failed"),
                Err(_) => warn!(attempt, "AI provider call timed out"),
            }
        }
        None
    }
}

#[async_trait]
impl Strategy for AiStrategy {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn required_metrics(&self) -> Vec<&'static str> {
        vec!["PercentileCPULoader", "MaxMemoryLoader"]
    }

    async fn run(&self, history: &HistoryData, workload: &Workload) -> RunResult {
        let cpu_stats = history.get("PercentileCPULoader").and_then(extract_stats);
        let memory_stats = history.get("MaxMemoryLoader").and_then(extract_stats);

        let mut result = RunResult::new();

        if cpu_stats.is_none() && memory_stats.is_none() {
            result.insert(ResourceType::Cpu, ResourceRecommendation::undefined("No data"));
            result.insert(ResourceType::Memory, ResourceRecommendation::undefined("No data"));
            return result;
        }

        let prompt = build_prompt(workload, cpu_stats.clone(), memory_stats.clone());

        let proposal = self.propose_with_retry(&prompt).await;

        match proposal {
            Some((cpu_proposal, mem_proposal)) => {
                let cpu_rec = cpu_stats
                    .as_ref()
                    .map(|stats| clamp_proposal(cpu_proposal, stats))
                    .unwrap_or(cpu_proposal);
                let mem_rec = memory_stats
                    .as_ref()
                    .map(|stats| clamp_proposal(mem_proposal, stats))
                    .unwrap_or(mem_proposal);

                result.insert(
                    ResourceType::Cpu,
                    ResourceRecommendation {
                        request: cpu_rec.request,
                        limit: cpu_rec.limit,
                        info: None,
                    },
                );
                result.insert(
                    ResourceType::Memory,
                    ResourceRecommendation {
                        request: mem_rec.request,
                        limit: mem_rec.limit,
                        info: None,
                    },
                );
            }
            None => {
                result.insert(ResourceType::Cpu, ResourceRecommendation::undefined("AI provider unavailable"));
                result.insert(ResourceType::Memory, ResourceRecommendation::undefined("AI provider unavailable"));
            }
        }

        result
    }
}
