// src/runner.rs
//! One end-to-end pass: load → curate → enhance → publish documents.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::CuratorConfig;
use crate::curate::CurationMode;
use crate::enhance::client::{build_client, DynGenerationClient};
use crate::enhance::ledger::{BudgetLimits, CostLedger};
use crate::enhance::seeds::SeedSet;
use crate::enhance::{publishable, BatchStatus, EnhancementScheduler};
use crate::ingest;
use crate::output::{
    cost_per_article, write_json_atomic, CuratedDocument, EnhancedDocument, EnhancedMetadata,
    RejectedDocument, CURATED_FILE, ENHANCED_FILE, LEDGER_FILE, REJECTED_FILE,
};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: CurationMode,
    pub input_records: usize,
    pub skipped_records: usize,
    pub curated: usize,
    pub rejected: usize,
    pub enhanced: usize,
    pub status: BatchStatus,
    pub calls_made: u32,
    pub spent: f64,
    pub written: Vec<PathBuf>,
}

/// Run with the client the configuration selects.
pub async fn run_batch(
    config: &CuratorConfig,
    input: &Path,
    output_dir: &Path,
    mode: CurationMode,
) -> Result<RunSummary> {
    let client = build_client(&config.generation);
    run_batch_with(config, client, input, output_dir, mode).await
}

/// Same as [`run_batch`] with an explicit generation client.
pub async fn run_batch_with(
    config: &CuratorConfig,
    client: DynGenerationClient,
    input: &Path,
    output_dir: &Path,
    mode: CurationMode,
) -> Result<RunSummary> {
    let (articles, skipped) = ingest::load_batch(input)?;
    let input_records = articles.len() + skipped.len();

    let pipeline = config.pipeline();
    let mut result = pipeline.curate(articles, config.threshold(), mode);
    result.skipped_records = skipped;

    let seeds = Arc::new(SeedSet::load_or_bundled(config.generation.seeds_path.as_deref()));
    let scheduler = EnhancementScheduler::new(client, seeds.clone(), config.scheduler_settings());

    let ledger_path = output_dir.join(LEDGER_FILE);
    let mut ledger = load_ledger(&ledger_path, config.budget_limits());
    let outcome = scheduler.enhance(&result.curated, &mut ledger).await;
    let published = publishable(&result.curated, &outcome, &seeds);

    let now = Utc::now();
    let metadata = EnhancedMetadata {
        enhanced_at: now,
        model: config.generation.model.clone(),
        languages: seeds.languages().clone(),
        seed_version: seeds.version().to_string(),
        total_articles: published.len(),
        cost_per_article: cost_per_article(&outcome.report),
    };

    let curated_path = output_dir.join(CURATED_FILE);
    let rejected_path = output_dir.join(REJECTED_FILE);
    let enhanced_path = output_dir.join(ENHANCED_FILE);
    write_json_atomic(&curated_path, &CuratedDocument::new(&result, now))?;
    write_json_atomic(&rejected_path, &RejectedDocument::new(&result))?;
    write_json_atomic(
        &enhanced_path,
        &EnhancedDocument::new(metadata, &outcome.report, &published),
    )?;
    write_json_atomic(&ledger_path, &ledger)?;

    let summary = RunSummary {
        mode,
        input_records,
        skipped_records: result.skipped_records.len(),
        curated: result.curated.len(),
        rejected: result.rejected.len(),
        enhanced: published.len(),
        status: outcome.report.status,
        calls_made: outcome.report.calls_made,
        spent: outcome.report.spent,
        written: vec![curated_path, rejected_path, enhanced_path, ledger_path],
    };

    info!(
        target: "curate",
        %mode,
        input = summary.input_records,
        curated = summary.curated,
        rejected = summary.rejected,
        enhanced = summary.enhanced,
        calls = summary.calls_made,
        spent = summary.spent,
        "batch written to {}",
        output_dir.display()
    );
    Ok(summary)
}

/// Today's ledger from disk, or a fresh one. Configured limits always apply.
pub fn load_ledger(path: &Path, limits: BudgetLimits) -> CostLedger {
    let today = Utc::now().date_naive();
    let stored = match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str::<CostLedger>(&s)
            .with_context(|| format!("parsing {}", path.display())),
        Err(_) => return CostLedger::for_day(limits, today),
    };
    match stored {
        Ok(ledger) if ledger.day() == today => ledger.with_limits(limits),
        Ok(_) => CostLedger::for_day(limits, today),
        Err(e) => {
            warn!(target: "enhance", error = %e, "ledger unreadable; starting fresh");
            CostLedger::for_day(limits, today)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ledger_resumes_same_day_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_FILE);
        let limits = BudgetLimits {
            max_daily_spend: 5.0,
            max_daily_calls: 10,
            max_daily_articles: None,
        };

        let today = CostLedger::new(limits).with_totals(1.5, 4);
        write_json_atomic(&path, &today).unwrap();
        let resumed = load_ledger(&path, BudgetLimits::default());
        assert_eq!(resumed.calls(), 4);
        assert_eq!(resumed.limits(), BudgetLimits::default());

        let old = CostLedger::for_day(limits, Utc::now().date_naive() - Duration::days(1))
            .with_totals(3.0, 9);
        write_json_atomic(&path, &old).unwrap();
        assert_eq!(load_ledger(&path, limits).calls(), 0);
    }

    #[test]
    fn garbage_ledger_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_FILE);
        fs::write(&path, "not json").unwrap();
        let l = load_ledger(&path, BudgetLimits::default());
        assert_eq!((l.calls(), l.spent()), (0, 0.0));
    }
}
