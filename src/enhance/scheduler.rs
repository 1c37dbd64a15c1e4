// src/enhance/scheduler.rs
//! Sequential, budget-aware enhancement loop.
//!
//! Per article: Pending → CacheHit → Done for seed titles, otherwise
//! Pending → Calling → (Success → Done | Failure → Retrying → Calling … → Skipped).
//! The ledger is checked before every article and before every call; hitting a
//! ceiling ends the batch cleanly with `BatchStatus::BudgetExhausted`. The
//! optional daily article cap is checked only before an article's first call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::client::{DynGenerationClient, GenerationError};
use super::ledger::{BudgetCeiling, CostLedger, CostModel};
use super::parse::parse_response;
use super::prompt::build_request;
use super::seeds::SeedSet;
use super::EnhancedArticle;
use crate::curate::ScoredArticle;
use crate::pacing::{RetryPolicy, TokenBucket};

pub const REASON_BUDGET: &str = "budget_exhausted";
pub const REASON_DISABLED: &str = "generation_disabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Pending,
    CacheHit,
    Calling,
    Success,
    Failure,
    Retrying,
    Skipped,
    Done,
}

/// Progress of one curated article through the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancementAttempt {
    /// Position in the curated input.
    pub index: usize,
    pub curation_id: String,
    pub state: AttemptState,
    /// Every state entered after Pending, in order.
    pub trail: Vec<AttemptState>,
    /// External calls made for this article.
    pub attempts: u32,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl EnhancementAttempt {
    fn new(index: usize, curation_id: String) -> Self {
        Self {
            index,
            curation_id,
            state: AttemptState::Pending,
            trail: Vec::new(),
            attempts: 0,
            cost: 0.0,
            failure_reason: None,
        }
    }

    fn enter(&mut self, next: AttemptState) {
        self.state = next;
        self.trail.push(next);
    }

    pub fn reached(&self, state: AttemptState) -> bool {
        self.trail.contains(&state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every article was visited.
    Completed,
    /// A daily ceiling stopped the batch; untouched articles stay Pending.
    BudgetExhausted { ceiling: BudgetCeiling },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    #[serde(flatten)]
    pub status: BatchStatus,
    pub provider: String,
    pub attempts: Vec<EnhancementAttempt>,
    pub calls_made: u32,
    pub spent: f64,
    pub cache_hits: usize,
    pub generated: usize,
    pub skipped: usize,
}

impl BatchReport {
    pub fn is_budget_limited(&self) -> bool {
        matches!(self.status, BatchStatus::BudgetExhausted { .. })
    }

    pub fn count_in(&self, state: AttemptState) -> usize {
        self.attempts.iter().filter(|a| a.state == state).count()
    }
}

/// Enhanced articles (possibly fewer than the input) plus the batch report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhanceOutcome {
    pub enhanced: Vec<EnhancedArticle>,
    pub report: BatchReport,
    #[serde(skip)]
    positions: Vec<usize>,
}

impl EnhanceOutcome {
    /// Outcome of a batch that never ran.
    pub fn empty(n: usize) -> Self {
        Self {
            enhanced: Vec::new(),
            report: BatchReport {
                status: BatchStatus::Completed,
                provider: "none".to_string(),
                attempts: (0..n)
                    .map(|i| EnhancementAttempt::new(i, String::new()))
                    .collect(),
                calls_made: 0,
                spent: 0.0,
                cache_hits: 0,
                generated: 0,
                skipped: 0,
            },
            positions: Vec::new(),
        }
    }

    /// Enhanced article produced for curated position `index`, if any.
    pub fn for_index(&self, index: usize) -> Option<&EnhancedArticle> {
        self.positions
            .iter()
            .position(|&p| p == index)
            .map(|k| &self.enhanced[k])
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub retry: RetryPolicy,
    /// Minimum spacing between consecutive external calls.
    pub call_spacing: Duration,
    pub request_timeout: Duration,
    pub few_shot_examples: usize,
    pub structured_output: bool,
    pub cost: CostModel,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_spacing: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            few_shot_examples: 2,
            structured_output: true,
            cost: CostModel::default(),
        }
    }
}

pub struct EnhancementScheduler {
    client: DynGenerationClient,
    seeds: Arc<SeedSet>,
    settings: SchedulerSettings,
    pacer: TokenBucket,
}

enum CallResult {
    Done(EnhancedArticle),
    Skipped,
    BudgetStop(BudgetCeiling),
}

impl EnhancementScheduler {
    pub fn new(client: DynGenerationClient, seeds: Arc<SeedSet>, settings: SchedulerSettings) -> Self {
        let pacer = TokenBucket::spaced(settings.call_spacing);
        Self {
            client,
            seeds,
            settings,
            pacer,
        }
    }

    pub fn seeds(&self) -> &SeedSet {
        &self.seeds
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    /// Enhance curated articles in order, within the ledger's remaining budget.
    ///
    /// Never fails: per-article failures become Skipped entries and budget
    /// exhaustion is reported through `BatchStatus`.
    pub async fn enhance(&self, curated: &[ScoredArticle], ledger: &mut CostLedger) -> EnhanceOutcome {
        crate::telemetry::ensure_described();
        if ledger.roll_over(Utc::now().date_naive()) {
            info!(target: "enhance", day = %ledger.day(), "cost ledger rolled over");
        }

        let calls_before = ledger.calls();
        let spent_before = ledger.spent();

        let mut attempts: Vec<EnhancementAttempt> = curated
            .iter()
            .enumerate()
            .map(|(i, a)| EnhancementAttempt::new(i, a.curation_id.clone()))
            .collect();
        let mut enhanced = Vec::new();
        let mut positions = Vec::new();
        let mut status = BatchStatus::Completed;

        for (i, article) in curated.iter().enumerate() {
            if let Some(ceiling) = ledger.exhausted() {
                info!(target: "enhance", %ceiling, processed = i, remaining = curated.len() - i, "daily budget reached; stopping batch");
                status = BatchStatus::BudgetExhausted { ceiling };
                break;
            }

            let attempt = &mut attempts[i];

            if let Some(seed) = self.seeds.lookup(&article.article.title) {
                attempt.enter(AttemptState::CacheHit);
                attempt.enter(AttemptState::Done);
                counter!("enhance_cache_hits_total").increment(1);
                debug!(target: "enhance", id = %article.curation_id, "seed cache hit");
                enhanced.push(EnhancedArticle::from_seed(article, seed));
                positions.push(i);
                continue;
            }

            if !self.client.is_enabled() {
                attempt.enter(AttemptState::Skipped);
                attempt.failure_reason = Some(REASON_DISABLED.to_string());
                counter!("enhance_skipped_total").increment(1);
                continue;
            }

            if ledger.articles_capped() {
                info!(target: "enhance", processed = i, "daily article cap reached; stopping batch");
                status = BatchStatus::BudgetExhausted {
                    ceiling: BudgetCeiling::Articles,
                };
                break;
            }
            ledger.record_article();

            match self.call_with_retries(article, attempt, ledger).await {
                CallResult::Done(out) => {
                    enhanced.push(out);
                    positions.push(i);
                }
                CallResult::Skipped => {
                    counter!("enhance_skipped_total").increment(1);
                }
                CallResult::BudgetStop(ceiling) => {
                    counter!("enhance_skipped_total").increment(1);
                    status = BatchStatus::BudgetExhausted { ceiling };
                    break;
                }
            }
        }

        gauge!("enhance_spend_usd").set(ledger.spent());

        let report = BatchReport {
            status,
            provider: self.client.provider_name().to_string(),
            calls_made: ledger.calls().saturating_sub(calls_before),
            spent: (ledger.spent() - spent_before).max(0.0),
            cache_hits: attempts.iter().filter(|a| a.reached(AttemptState::CacheHit)).count(),
            generated: attempts.iter().filter(|a| a.reached(AttemptState::Success)).count(),
            skipped: attempts.iter().filter(|a| a.state == AttemptState::Skipped).count(),
            attempts,
        };

        info!(
            target: "enhance",
            provider = %report.provider,
            calls = report.calls_made,
            spent = report.spent,
            cache_hits = report.cache_hits,
            generated = report.generated,
            skipped = report.skipped,
            budget_limited = report.is_budget_limited(),
            "enhancement batch finished"
        );

        EnhanceOutcome {
            enhanced,
            report,
            positions,
        }
    }

    async fn call_with_retries(
        &self,
        article: &ScoredArticle,
        attempt: &mut EnhancementAttempt,
        ledger: &mut CostLedger,
    ) -> CallResult {
        let request = build_request(
            &article.article,
            &self.seeds,
            self.settings.few_shot_examples,
            self.settings.structured_output,
        );
        let langs = self.seeds.languages();
        let policy = self.settings.retry;

        loop {
            if attempt.attempts > 0 {
                if let Some(ceiling) = ledger.exhausted() {
                    attempt.enter(AttemptState::Skipped);
                    attempt.failure_reason = Some(format!(
                        "{REASON_BUDGET} after: {}",
                        attempt.failure_reason.as_deref().unwrap_or("unknown")
                    ));
                    return CallResult::BudgetStop(ceiling);
                }
                attempt.enter(AttemptState::Retrying);
            }

            attempt.enter(AttemptState::Calling);
            self.pacer.acquire().await;

            let started = Instant::now();
            let result = match tokio::time::timeout(
                self.settings.request_timeout,
                self.client.generate(&request),
            )
            .await
            {
                Ok(r) => r,
                Err(_) => Err(GenerationError::Timeout(
                    self.settings.request_timeout.as_millis() as u64,
                )),
            };
            histogram!("enhance_call_ms").record(started.elapsed().as_secs_f64() * 1000.0);
            counter!("enhance_calls_total").increment(1);

            // every attempt counts; only answered calls carry a cost
            let cost = match &result {
                Ok(resp) => self.settings.cost.cost_for(resp.total_tokens),
                Err(_) => 0.0,
            };
            ledger.record_call(cost);
            attempt.attempts += 1;
            attempt.cost += cost;

            let (reason, retryable) = match result {
                Ok(resp) => match parse_response(&resp.text, langs) {
                    Ok(payload) => {
                        attempt.enter(AttemptState::Success);
                        attempt.enter(AttemptState::Done);
                        attempt.failure_reason = None;
                        return CallResult::Done(EnhancedArticle::generated(article, payload));
                    }
                    Err(e) => (format!("unparseable response: {e}"), true),
                },
                Err(e) => (e.to_string(), e.is_retryable()),
            };

            attempt.enter(AttemptState::Failure);
            warn!(
                target: "enhance",
                id = %article.curation_id,
                attempt = attempt.attempts,
                reason = %reason,
                "enhancement attempt failed"
            );
            attempt.failure_reason = Some(reason);

            if !retryable || !policy.can_retry(attempt.attempts) {
                attempt.enter(AttemptState::Skipped);
                return CallResult::Skipped;
            }

            let delay = policy.delay_for_attempt(attempt.attempts);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
