use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub llm: LlmCfg,
    #[serde(default)]
    pub intelligence: IntelCfg,
    #[serde(default)]
    pub validator: ValidatorCfg,
    #[serde(default)]
    pub history: HistoryCfg,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmCfg {
    #[serde(rename = "baseUrl", default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Normally injected via LLM__API_KEY. Empty means rules-only mode.
    #[serde(default)]
    pub api_key: String,
    #[serde(rename = "rateLimitRpm", default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,
    #[serde(with = "humantime_serde", default = "default_llm_timeout")]
    pub timeout: Duration,
    #[serde(rename = "maxTokens", default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmCfg {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: "".to_string(),
            rate_limit_rpm: default_rate_limit_rpm(),
            timeout: default_llm_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_llm_model() -> String {
    "openai/gpt-5.1".to_string()
}
fn default_rate_limit_rpm() -> u32 {
    30
}
fn default_llm_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_max_tokens() -> u32 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IntelCfg {
    #[serde(rename = "dataDir", default = "default_data_dir")]
    pub data_dir: String,
    /// Cluster-match tolerance on the 0-10 aggression scale.
    #[serde(rename = "aggressionTolerance", default = "default_aggression_tolerance")]
    pub aggression_tolerance: f64,
    /// Cluster-match tolerance on reaction time, seconds.
    #[serde(rename = "reactionToleranceS", default = "default_reaction_tolerance")]
    pub reaction_tolerance_s: f64,
    /// Minimum profiles for a behavioral cluster to be usable.
    #[serde(rename = "minClusterSamples", default = "default_min_cluster_samples")]
    pub min_cluster_samples: usize,
    #[serde(rename = "resourceHighCutoff", default = "default_resource_high")]
    pub resource_high_cutoff: f64,
    #[serde(rename = "resourceMediumCutoff", default = "default_resource_medium")]
    pub resource_medium_cutoff: f64,
}

impl Default for IntelCfg {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            aggression_tolerance: default_aggression_tolerance(),
            reaction_tolerance_s: default_reaction_tolerance(),
            min_cluster_samples: default_min_cluster_samples(),
            resource_high_cutoff: default_resource_high(),
            resource_medium_cutoff: default_resource_medium(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_aggression_tolerance() -> f64 {
    2.0
}
fn default_reaction_tolerance() -> f64 {
    60.0
}
fn default_min_cluster_samples() -> usize {
    5
}
fn default_resource_high() -> f64 {
    1.0
}
fn default_resource_medium() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidatorCfg {
    #[serde(rename = "minReasoningChars", default = "default_min_reasoning_chars")]
    pub min_reasoning_chars: usize,
    #[serde(rename = "requiredKeywords", default = "default_required_keywords")]
    pub required_keywords: Vec<String>,
    #[serde(rename = "minKeywordHits", default = "default_min_keyword_hits")]
    pub min_keyword_hits: usize,
}

impl Default for ValidatorCfg {
    fn default() -> Self {
        Self {
            min_reasoning_chars: default_min_reasoning_chars(),
            required_keywords: default_required_keywords(),
            min_keyword_hits: default_min_keyword_hits(),
        }
    }
}

fn default_min_reasoning_chars() -> usize {
    100
}
fn default_required_keywords() -> Vec<String> {
    ["profit", "risk", "competition", "strategy"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_min_keyword_hits() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryCfg {
    /// Minimum sample count before strategy stats are trusted.
    #[serde(rename = "minSamples", default = "default_min_samples")]
    pub min_samples: u32,
    #[serde(rename = "similarLimit", default = "default_similar_limit")]
    pub similar_limit: u32,
}

impl Default for HistoryCfg {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            similar_limit: default_similar_limit(),
        }
    }
}

fn default_min_samples() -> u32 {
    5
}
fn default_similar_limit() -> u32 {
    10
}

impl AppCfg {
    pub fn load(path: &str) -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(config::Environment::default().separator("__"))
            .build()
            .context("building config")?;

        let app: AppCfg = cfg.try_deserialize().context("deserializing config")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.llm.base_url.is_empty(), "llm.baseUrl missing");
        anyhow::ensure!(!self.llm.model.is_empty(), "llm.model missing");
        anyhow::ensure!(
            self.llm.rate_limit_rpm > 0,
            "llm.rateLimitRpm must be > 0"
        );
        anyhow::ensure!(
            !self.intelligence.data_dir.is_empty(),
            "intelligence.dataDir missing"
        );
        anyhow::ensure!(
            self.intelligence.aggression_tolerance >= 0.0,
            "intelligence.aggressionTolerance must be non-negative"
        );
        anyhow::ensure!(
            self.intelligence.resource_medium_cutoff <= self.intelligence.resource_high_cutoff,
            "intelligence resource cutoffs must be ordered medium <= high"
        );
        anyhow::ensure!(
            self.validator.min_keyword_hits <= self.validator.required_keywords.len(),
            "validator.minKeywordHits exceeds the keyword list"
        );
        anyhow::ensure!(
            self.history.similar_limit > 0,
            "history.similarLimit must be > 0"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_defaults_validate() {
        let cfg = AppCfg::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.validator.min_keyword_hits, 2);
        assert_eq!(cfg.intelligence.min_cluster_samples, 5);
        assert!((cfg.intelligence.aggression_tolerance - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_env_var_override() {
        unsafe {
            env::set_var("LLM__API_KEY", "env-key-123");
        }

        let cfg = Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()
            .unwrap();

        let val = cfg.get_string("llm.api_key").unwrap();
        assert_eq!(val, "env-key-123");

        unsafe {
            env::remove_var("LLM__API_KEY");
        }
    }
}
