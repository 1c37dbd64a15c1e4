// src/curate/mod.rs
//! Curation pipeline: score → deduplicate → threshold → partition.
//!
//! Pure and synchronous. Group scan follows input order and the curated
//! ordering is a stable sort on total score, so a batch always curates the
//! same way.

pub mod dedup;
pub mod lexicon;
pub mod scorer;
pub mod stats;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::curate::dedup::{select_representative, Deduplicator};
use crate::curate::scorer::{Scorer, SubScores};
use crate::curate::stats::CurationStats;
use crate::ingest::types::{RawArticle, SkippedRecord};

pub const REASON_DUPLICATE: &str = "duplicate";

/// Threshold/latency trade-off for a curation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurationMode {
    /// Small breaking-news batches: lowered bar, urgency override, exact dedup only.
    FastTrack,
    /// Scheduled batches: normal bar, full similarity dedup.
    #[default]
    Full,
}

impl fmt::Display for CurationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurationMode::FastTrack => f.write_str("fast_track"),
            CurationMode::Full => f.write_str("full"),
        }
    }
}

/// Fast-track tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastTrackPolicy {
    /// Subtracted from the normal threshold.
    pub threshold_offset: f64,
    /// Urgency at or above this admits regardless of score.
    pub urgency_cutoff: f64,
}

impl Default for FastTrackPolicy {
    fn default() -> Self {
        Self {
            threshold_offset: 3.0,
            urgency_cutoff: 3.0,
        }
    }
}

/// A raw article plus its scores. Only `rejection_reason` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: RawArticle,
    pub quality_score: f64,
    pub relevance_score: f64,
    pub importance_score: f64,
    pub total_score: f64,
    pub urgency: f64,
    pub curation_id: String,
    pub curated_at: DateTime<Utc>,
    pub fast_tracked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ScoredArticle {
    pub fn new(article: RawArticle, scores: SubScores, urgency: f64, at: DateTime<Utc>) -> Self {
        let curation_id = crate::ingest::anon_id(&article.identity_key());
        Self {
            quality_score: scores.quality,
            relevance_score: scores.relevance,
            importance_score: scores.importance,
            total_score: scores.total(),
            urgency,
            curation_id,
            curated_at: at,
            fast_tracked: false,
            rejection_reason: None,
            article,
        }
    }

    pub fn scores(&self) -> SubScores {
        SubScores {
            quality: self.quality_score,
            relevance: self.relevance_score,
            importance: self.importance_score,
        }
    }
}

/// Outcome of one curation run. `curated` and `rejected` partition the scored input.
#[derive(Debug, Clone, Serialize)]
pub struct CurationResult {
    pub mode: CurationMode,
    /// Effective acceptance threshold (lowered in fast-track).
    pub threshold: f64,
    pub curated: Vec<ScoredArticle>,
    pub rejected: Vec<ScoredArticle>,
    pub duplicate_groups: usize,
    pub stats: CurationStats,
    pub rejection_histogram: BTreeMap<String, usize>,
    /// Records refused at the boundary; empty when curating pre-validated articles.
    pub skipped_records: Vec<SkippedRecord>,
}

impl CurationResult {
    pub fn fast_tracked_count(&self) -> usize {
        self.curated.iter().filter(|a| a.fast_tracked).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurationPipeline {
    scorer: Scorer,
    dedup: Deduplicator,
    fast_track: FastTrackPolicy,
}

impl CurationPipeline {
    pub fn new(scorer: Scorer, dedup: Deduplicator, fast_track: FastTrackPolicy) -> Self {
        Self {
            scorer,
            dedup,
            fast_track,
        }
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Score, deduplicate and partition a batch.
    ///
    /// `threshold` is the normal acceptance bar; fast-track lowers it by the
    /// configured offset and also admits anything past the urgency cutoff.
    pub fn curate(
        &self,
        raw_articles: Vec<RawArticle>,
        threshold: f64,
        mode: CurationMode,
    ) -> CurationResult {
        crate::telemetry::ensure_described();
        let now = Utc::now();

        let groups = match mode {
            CurationMode::Full => self.dedup.find_duplicates(&raw_articles),
            CurationMode::FastTrack => self.dedup.find_exact_duplicates(&raw_articles),
        };

        let mut scored: Vec<ScoredArticle> = raw_articles
            .into_iter()
            .map(|a| {
                let scores = self.scorer.score(&a);
                let urgency = self.scorer.urgency(&a);
                ScoredArticle::new(a, scores, urgency, now)
            })
            .collect();

        for group in &groups {
            let Some(keep) = select_representative(&group.members, &scored) else {
                continue;
            };
            for &idx in group.members.iter().filter(|&&i| i != keep) {
                scored[idx].rejection_reason = Some(REASON_DUPLICATE.to_string());
            }
        }

        let effective = match mode {
            CurationMode::Full => threshold,
            CurationMode::FastTrack => threshold - self.fast_track.threshold_offset,
        };

        let total = scored.len();
        let mut curated = Vec::with_capacity(total);
        let mut rejected = Vec::new();

        for mut item in scored {
            if item.rejection_reason.is_some() {
                rejected.push(item);
                continue;
            }
            match mode {
                CurationMode::Full => {
                    if item.total_score < effective {
                        item.rejection_reason = Some(format!("low_score_{:.1}", item.total_score));
                        rejected.push(item);
                    } else {
                        curated.push(item);
                    }
                }
                CurationMode::FastTrack => {
                    item.fast_tracked = true;
                    if item.total_score >= effective || item.urgency >= self.fast_track.urgency_cutoff {
                        curated.push(item);
                    } else {
                        item.rejection_reason =
                            Some(format!("low_score_breaking_{:.1}", item.total_score));
                        rejected.push(item);
                    }
                }
            }
        }

        // stable: equal totals keep input order
        curated.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));

        let rejection_histogram = reason_histogram(&rejected);
        let stats = CurationStats::from_articles(&curated);

        counter!("curate_articles_total").increment(total as u64);
        counter!("curate_curated_total").increment(curated.len() as u64);
        for (kind, n) in &rejection_histogram {
            counter!("curate_rejected_total", "reason" => kind.clone()).increment(*n as u64);
        }

        info!(
            target: "curate",
            %mode,
            threshold = effective,
            total,
            curated = curated.len(),
            rejected = rejected.len(),
            duplicate_groups = groups.len(),
            "curation completed"
        );

        CurationResult {
            mode,
            threshold: effective,
            curated,
            rejected,
            duplicate_groups: groups.len(),
            stats,
            rejection_histogram,
            skipped_records: Vec::new(),
        }
    }

    /// Validate loose records at the boundary, then curate what survives.
    pub fn curate_records(
        &self,
        records: Vec<serde_json::Value>,
        threshold: f64,
        mode: CurationMode,
    ) -> CurationResult {
        let (articles, skipped) = crate::ingest::validate_batch(records);
        let mut result = self.curate(articles, threshold, mode);
        result.skipped_records = skipped;
        result
    }
}

/// Reason kind without the score suffix: `low_score_12.5` → `low_score`.
pub fn reason_kind(reason: &str) -> &str {
    match reason.rsplit_once('_') {
        Some((kind, tail)) if tail.parse::<f64>().is_ok() => kind,
        _ => reason,
    }
}

fn reason_histogram(rejected: &[ScoredArticle]) -> BTreeMap<String, usize> {
    let mut hist = BTreeMap::new();
    for item in rejected {
        if let Some(reason) = item.rejection_reason.as_deref() {
            *hist.entry(reason_kind(reason).to_string()).or_insert(0) += 1;
        }
    }
    hist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_kind_strips_numeric_suffix() {
        assert_eq!(reason_kind("low_score_12.5"), "low_score");
        assert_eq!(reason_kind("low_score_breaking_9.0"), "low_score_breaking");
        assert_eq!(reason_kind("duplicate"), "duplicate");
    }

    #[test]
    fn partitions_cover_the_whole_batch() {
        let items = vec![
            RawArticle::titled("Réforme des retraites : le gouvernement annonce un décret"),
            RawArticle::titled("x"),
            RawArticle::titled("Réforme des retraites : le gouvernement annonce un décret")
                .with_content("Plus de détails sur la réforme."),
        ];
        let res = CurationPipeline::default().curate(items, 15.0, CurationMode::Full);
        assert_eq!(res.curated.len() + res.rejected.len(), 3);
        assert_eq!(res.duplicate_groups, 1);
        assert_eq!(res.rejection_histogram.get(REASON_DUPLICATE), Some(&1));
        assert_eq!(res.rejection_histogram.get("low_score"), Some(&1));
        // the longer-content twin wins when scores tie or beat
        assert_eq!(res.curated.len(), 1);
        assert!(!res.curated[0].article.content.is_empty());
    }

    #[test]
    fn fast_track_admits_urgent_items_below_the_bar() {
        let items = vec![
            RawArticle::titled("Alerte info").with_urgency(5.0),
            RawArticle::titled("Rien à signaler"),
        ];
        let res = CurationPipeline::default().curate(items, 18.0, CurationMode::FastTrack);
        assert_eq!(res.threshold, 15.0);
        assert_eq!(res.curated.len(), 1);
        assert!(res.curated[0].fast_tracked);
        assert_eq!(res.rejection_histogram.get("low_score_breaking"), Some(&1));
    }
}
