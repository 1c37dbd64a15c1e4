// src/enhance/ledger.rs
//! Daily cost/call ledger. Owned by the caller and lent to the scheduler
//! (`&mut`), so independent schedulers never share hidden totals.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spend within this distance of the ceiling counts as reaching it, so
/// summed float costs cannot buy an extra call.
const SPEND_EPSILON: f64 = 1e-9;

/// Independent daily ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetLimits {
    pub max_daily_spend: f64,
    pub max_daily_calls: u32,
    /// Articles sent for generation per day; unlimited when `None`.
    #[serde(default)]
    pub max_daily_articles: Option<u32>,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_daily_spend: 25.0,
            max_daily_calls: 120,
            max_daily_articles: None,
        }
    }
}

/// Which ceiling stopped a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCeiling {
    Spend,
    Calls,
    Articles,
}

impl fmt::Display for BudgetCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetCeiling::Spend => f.write_str("spend"),
            BudgetCeiling::Calls => f.write_str("calls"),
            BudgetCeiling::Articles => f.write_str("articles"),
        }
    }
}

/// Token-based pricing for one call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub cost_per_1k_tokens: f64,
    /// Charged when the provider reports no usage.
    pub fallback_tokens_per_call: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            cost_per_1k_tokens: 0.01,
            fallback_tokens_per_call: 500,
        }
    }
}

impl CostModel {
    pub fn cost_for(&self, total_tokens: Option<u32>) -> f64 {
        let tokens = total_tokens.unwrap_or(self.fallback_tokens_per_call);
        tokens as f64 / 1000.0 * self.cost_per_1k_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    day: NaiveDate,
    spent: f64,
    calls: u32,
    #[serde(default)]
    articles: u32,
    limits: BudgetLimits,
}

impl CostLedger {
    /// Fresh ledger for today (UTC).
    pub fn new(limits: BudgetLimits) -> Self {
        Self::for_day(limits, Utc::now().date_naive())
    }

    pub fn for_day(limits: BudgetLimits, day: NaiveDate) -> Self {
        Self {
            day,
            spent: 0.0,
            calls: 0,
            articles: 0,
            limits,
        }
    }

    /// Resume from totals persisted elsewhere.
    pub fn with_totals(mut self, spent: f64, calls: u32) -> Self {
        self.spent = spent.max(0.0);
        self.calls = calls;
        self
    }

    /// Replace the ceilings, keeping the totals.
    pub fn with_limits(mut self, limits: BudgetLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn spent(&self) -> f64 {
        self.spent
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    /// Articles that went to the generation service today.
    pub fn articles(&self) -> u32 {
        self.articles
    }

    pub fn remaining_calls(&self) -> u32 {
        self.limits.max_daily_calls.saturating_sub(self.calls)
    }

    /// The ceiling already reached, if any. Checked before every call.
    pub fn exhausted(&self) -> Option<BudgetCeiling> {
        if self.spent + SPEND_EPSILON >= self.limits.max_daily_spend {
            Some(BudgetCeiling::Spend)
        } else if self.calls >= self.limits.max_daily_calls {
            Some(BudgetCeiling::Calls)
        } else {
            None
        }
    }

    pub fn can_spend(&self) -> bool {
        self.exhausted().is_none()
    }

    /// Count one attempted call and its cost.
    pub fn record_call(&mut self, cost: f64) {
        self.calls = self.calls.saturating_add(1);
        if cost.is_finite() && cost > 0.0 {
            self.spent += cost;
        }
    }

    /// True once the daily article cap is used up. Checked before an
    /// article's first call, never between its retries.
    pub fn articles_capped(&self) -> bool {
        self.limits
            .max_daily_articles
            .is_some_and(|cap| self.articles >= cap)
    }

    /// Count one article sent for generation.
    pub fn record_article(&mut self) {
        self.articles = self.articles.saturating_add(1);
    }

    /// Zero the totals; the day is kept.
    pub fn reset(&mut self) {
        self.spent = 0.0;
        self.calls = 0;
        self.articles = 0;
    }

    /// Reset when `today` differs from the ledger day. Returns true on rollover.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if today == self.day {
            return false;
        }
        self.day = today;
        self.reset();
        true
    }
}
