// src/curate/stats.rs
use serde::Serialize;

use crate::curate::ScoredArticle;

/// min / max / average of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl MetricSummary {
    /// All zeros for an empty input.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            min,
            max,
            avg: sum / count as f64,
        }
    }
}

/// Per-metric aggregates over the curated collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurationStats {
    pub count: usize,
    pub quality: MetricSummary,
    pub relevance: MetricSummary,
    pub importance: MetricSummary,
    pub total: MetricSummary,
}

impl CurationStats {
    pub fn from_articles(items: &[ScoredArticle]) -> Self {
        Self {
            count: items.len(),
            quality: MetricSummary::from_values(items.iter().map(|a| a.quality_score)),
            relevance: MetricSummary::from_values(items.iter().map(|a| a.relevance_score)),
            importance: MetricSummary::from_values(items.iter().map(|a| a.importance_score)),
            total: MetricSummary::from_values(items.iter().map(|a| a.total_score)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_values() {
        let s = MetricSummary::from_values([2.0, 4.0, 9.0]);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert_eq!(s.avg, 5.0);
    }

    #[test]
    fn empty_input_is_all_zero() {
        assert_eq!(MetricSummary::from_values(Vec::new()), MetricSummary::default());
        assert_eq!(CurationStats::from_articles(&[]).count, 0);
    }
}
