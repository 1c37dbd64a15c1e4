// src/output.rs
//! JSON documents handed to the publishing stage.
//!
//! Each document is written to a sibling `.tmp` file and renamed into place,
//! so readers never observe a half-written file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::curate::stats::CurationStats;
use crate::curate::{CurationMode, CurationResult, ScoredArticle};
use crate::enhance::{BatchReport, EnhancedArticle, Languages};
use crate::ingest::types::SkippedRecord;

pub const CURATED_FILE: &str = "curated_articles.json";
pub const REJECTED_FILE: &str = "rejected_articles.json";
pub const ENHANCED_FILE: &str = "enhanced_articles.json";
pub const LEDGER_FILE: &str = "ledger.json";

#[derive(Debug, Clone, Serialize)]
pub struct CuratedMetadata {
    pub curated_at: DateTime<Utc>,
    pub total_curated: usize,
    pub quality_threshold: f64,
    pub mode: CurationMode,
    pub fast_tracked: usize,
    pub duplicate_groups: usize,
    pub stats: CurationStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct CuratedDocument<'a> {
    pub metadata: CuratedMetadata,
    pub articles: &'a [ScoredArticle],
}

impl<'a> CuratedDocument<'a> {
    pub fn new(result: &'a CurationResult, at: DateTime<Utc>) -> Self {
        Self {
            metadata: CuratedMetadata {
                curated_at: at,
                total_curated: result.curated.len(),
                quality_threshold: result.threshold,
                mode: result.mode,
                fast_tracked: result.fast_tracked_count(),
                duplicate_groups: result.duplicate_groups,
                stats: result.stats.clone(),
            },
            articles: &result.curated,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedDocument<'a> {
    pub total_rejected: usize,
    pub rejection_reasons: &'a BTreeMap<String, usize>,
    pub skipped_records: &'a [SkippedRecord],
    pub articles: &'a [ScoredArticle],
}

impl<'a> RejectedDocument<'a> {
    pub fn new(result: &'a CurationResult) -> Self {
        Self {
            total_rejected: result.rejected.len(),
            rejection_reasons: &result.rejection_histogram,
            skipped_records: &result.skipped_records,
            articles: &result.rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnhancedMetadata {
    pub enhanced_at: DateTime<Utc>,
    pub model: String,
    pub languages: Languages,
    pub seed_version: String,
    pub total_articles: usize,
    /// Spend divided by generated articles; zero when nothing was generated.
    pub cost_per_article: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnhancedDocument<'a> {
    pub metadata: EnhancedMetadata,
    pub report: &'a BatchReport,
    pub articles: &'a [EnhancedArticle],
}

impl<'a> EnhancedDocument<'a> {
    pub fn new(
        metadata: EnhancedMetadata,
        report: &'a BatchReport,
        articles: &'a [EnhancedArticle],
    ) -> Self {
        Self {
            metadata,
            report,
            articles,
        }
    }
}

pub fn cost_per_article(report: &BatchReport) -> f64 {
    if report.generated == 0 {
        0.0
    } else {
        report.spent / report.generated as f64
    }
}

/// Pretty JSON, written to `<path>.tmp` then renamed over `path`.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("serializing document")?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);

    let mut f = fs::File::create(tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(json.as_bytes())?;
    f.sync_all()?;
    fs::rename(tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
