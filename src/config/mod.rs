// src/config/mod.rs
//! Runtime configuration: TOML file + environment overrides.
//!
//! Lookup order for the file: `$CURATOR_CONFIG_PATH`, then `config/curator.toml`,
//! then built-in defaults. Every section is optional.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::curate::dedup::{DedupConfig, Deduplicator, Grouping};
use crate::curate::lexicon::Lexicon;
use crate::curate::scorer::Scorer;
use crate::curate::{CurationPipeline, FastTrackPolicy};
use crate::enhance::ledger::{BudgetLimits, CostLedger, CostModel};
use crate::enhance::SchedulerSettings;
use crate::pacing::RetryPolicy;

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/curator.toml";
pub const DEFAULT_MIN_TOTAL_SCORE: f64 = 18.0;

pub const ENV_CONFIG_PATH: &str = "CURATOR_CONFIG_PATH";
pub const ENV_MIN_SCORE: &str = "CURATOR_MIN_SCORE";
pub const ENV_MAX_DAILY_CALLS: &str = "CURATOR_MAX_DAILY_CALLS";
pub const ENV_MAX_DAILY_SPEND: &str = "CURATOR_MAX_DAILY_SPEND";
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    pub curation: CurationSettings,
    pub dedup: DedupConfig,
    pub budget: BudgetSettings,
    pub generation: GenerationSettings,
    pub lexicon: LexiconSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurationSettings {
    pub min_total_score: f64,
    pub fast_track_offset: f64,
    pub urgency_cutoff: f64,
    pub grouping: Grouping,
}

impl Default for CurationSettings {
    fn default() -> Self {
        let ft = FastTrackPolicy::default();
        Self {
            min_total_score: DEFAULT_MIN_TOTAL_SCORE,
            fast_track_offset: ft.threshold_offset,
            urgency_cutoff: ft.urgency_cutoff,
            grouping: Grouping::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetSettings {
    pub max_daily_spend: f64,
    pub max_daily_calls: u32,
    /// Optional cap on articles sent for generation per day.
    pub max_daily_articles: Option<u32>,
    pub cost_per_1k_tokens: f64,
    pub fallback_tokens_per_call: u32,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        let limits = BudgetLimits::default();
        let cost = CostModel::default();
        Self {
            max_daily_spend: limits.max_daily_spend,
            max_daily_calls: limits.max_daily_calls,
            max_daily_articles: limits.max_daily_articles,
            cost_per_1k_tokens: cost.cost_per_1k_tokens,
            fallback_tokens_per_call: cost.fallback_tokens_per_call,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub enabled: bool,
    /// "openrouter" | "openai" (both speak the same chat-completions API)
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// "ENV" means: read from OPENROUTER_API_KEY
    pub api_key: String,
    pub referer: Option<String>,
    pub app_title: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_retry_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub structured_output: bool,
    pub few_shot_examples: usize,
    /// Versioned seed dataset; also defines the language pair.
    pub seeds_path: Option<PathBuf>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "openrouter".to_string(),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: "ENV".to_string(),
            referer: None,
            app_title: Some("news-curator".to_string()),
            max_tokens: 1_500,
            temperature: 0.7,
            timeout_secs: 30,
            max_attempts: 3,
            retry_delay_ms: 5_000,
            backoff_multiplier: 1.0,
            max_retry_delay_ms: 60_000,
            rate_limit_delay_ms: 2_000,
            structured_output: true,
            few_shot_examples: 2,
            seeds_path: Some(PathBuf::from("config/seed_examples.json")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LexiconSettings {
    /// Optional keyword-set TOML; the built-in seed is used when absent.
    pub path: Option<PathBuf>,
}

// parse optional float env and clamp to <0.0..=30.0>
fn parse_score_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 30.0))
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl CuratorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: CuratorConfig =
            toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
        cfg.finish()
    }

    /// Load using env var + fallbacks:
    /// 1) $CURATOR_CONFIG_PATH (must exist)
    /// 2) config/curator.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        Self::default().finish()
    }

    /// Env overrides, API key resolution and sanitisation.
    fn finish(mut self) -> Result<Self> {
        if let Some(v) = parse_score_env(env::var(ENV_MIN_SCORE).ok()) {
            self.curation.min_total_score = v;
        }
        if let Some(v) = parse_env::<u32>(ENV_MAX_DAILY_CALLS) {
            self.budget.max_daily_calls = v;
        }
        if let Some(v) = parse_env::<f64>(ENV_MAX_DAILY_SPEND).filter(|v| v.is_finite()) {
            self.budget.max_daily_spend = v;
        }

        // Normalize provider
        self.generation.provider = self.generation.provider.trim().to_lowercase();

        // Resolve api key if "ENV"; a missing key disables generation
        if self.generation.api_key.trim().eq_ignore_ascii_case("env") {
            match env::var(ENV_API_KEY) {
                Ok(key) if !key.trim().is_empty() => self.generation.api_key = key.trim().to_string(),
                _ => {
                    tracing::warn!(target: "enhance", "{ENV_API_KEY} not set; external generation disabled");
                    self.generation.api_key = String::new();
                    self.generation.enabled = false;
                }
            }
        }

        self.sanitize();
        Ok(self)
    }

    fn sanitize(&mut self) {
        let defaults = CuratorConfig::default();

        let c = &mut self.curation;
        if !c.min_total_score.is_finite() {
            c.min_total_score = DEFAULT_MIN_TOTAL_SCORE;
        }
        c.min_total_score = c.min_total_score.clamp(0.0, 30.0);
        if !c.fast_track_offset.is_finite() || c.fast_track_offset < 0.0 {
            c.fast_track_offset = defaults.curation.fast_track_offset;
        }
        if !c.urgency_cutoff.is_finite() || c.urgency_cutoff < 0.0 {
            c.urgency_cutoff = defaults.curation.urgency_cutoff;
        }

        let d = &mut self.dedup;
        for (v, dv) in [
            (&mut d.title_threshold, defaults.dedup.title_threshold),
            (&mut d.summary_threshold, defaults.dedup.summary_threshold),
            (&mut d.loose_title_threshold, defaults.dedup.loose_title_threshold),
        ] {
            if !(0.0..=1.0).contains(&*v) {
                *v = dv;
            }
        }

        let b = &mut self.budget;
        if !b.max_daily_spend.is_finite() || b.max_daily_spend < 0.0 {
            b.max_daily_spend = defaults.budget.max_daily_spend;
        }
        if !b.cost_per_1k_tokens.is_finite() || b.cost_per_1k_tokens < 0.0 {
            b.cost_per_1k_tokens = defaults.budget.cost_per_1k_tokens;
        }

        let g = &mut self.generation;
        g.max_attempts = g.max_attempts.max(1);
        if !(0.0..=2.0).contains(&g.temperature) {
            g.temperature = defaults.generation.temperature;
        }
        if g.timeout_secs == 0 {
            g.timeout_secs = defaults.generation.timeout_secs;
        }
    }

    /// Effective acceptance threshold for full curation.
    pub fn threshold(&self) -> f64 {
        self.curation.min_total_score
    }

    pub fn lexicon(&self) -> Lexicon {
        match &self.lexicon.path {
            Some(p) => Lexicon::load_from_file(p),
            None => Lexicon::default_seed(),
        }
    }

    pub fn pipeline(&self) -> CurationPipeline {
        CurationPipeline::new(
            Scorer::new(self.lexicon()),
            Deduplicator::new(self.dedup, self.curation.grouping),
            FastTrackPolicy {
                threshold_offset: self.curation.fast_track_offset,
                urgency_cutoff: self.curation.urgency_cutoff,
            },
        )
    }

    pub fn budget_limits(&self) -> BudgetLimits {
        BudgetLimits {
            max_daily_spend: self.budget.max_daily_spend,
            max_daily_calls: self.budget.max_daily_calls,
            max_daily_articles: self.budget.max_daily_articles,
        }
    }

    pub fn ledger(&self) -> CostLedger {
        CostLedger::new(self.budget_limits())
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        let g = &self.generation;
        SchedulerSettings {
            retry: RetryPolicy::fixed(g.max_attempts, Duration::from_millis(g.retry_delay_ms))
                .with_backoff(g.backoff_multiplier, Duration::from_millis(g.max_retry_delay_ms)),
            call_spacing: Duration::from_millis(g.rate_limit_delay_ms),
            request_timeout: Duration::from_secs(g.timeout_secs),
            few_shot_examples: g.few_shot_examples,
            structured_output: g.structured_output,
            cost: CostModel {
                cost_per_1k_tokens: self.budget.cost_per_1k_tokens,
                fallback_tokens_per_call: self.budget.fallback_tokens_per_call,
            },
        }
    }
}
