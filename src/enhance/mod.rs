// src/enhance/mod.rs
//! Budget-bounded bilingual enhancement of curated articles.

pub mod client;
pub mod ledger;
pub mod parse;
pub mod prompt;
pub mod scheduler;
pub mod seeds;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::curate::ScoredArticle;
use crate::enhance::seeds::{SeedExample, SeedSet};

pub use scheduler::{
    AttemptState, BatchReport, BatchStatus, EnhanceOutcome, EnhancementAttempt,
    EnhancementScheduler, SchedulerSettings,
};

/// Reader language (`source`) and explanation language (`target`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Languages {
    pub source: String,
    pub target: String,
}

impl Default for Languages {
    fn default() -> Self {
        Self {
            source: "French".to_string(),
            target: "English".to_string(),
        }
    }
}

/// The same text in the source and target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bilingual {
    pub source: String,
    pub target: String,
}

/// Explanation of one difficult term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(alias = "original_phrase", alias = "phrase", alias = "word")]
    pub term: String,
    #[serde(default, alias = "display_format", alias = "short_gloss", alias = "translation")]
    pub gloss: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub cultural_note: Option<String>,
}

impl Annotation {
    /// Trim fields; a blank cultural note becomes `None`.
    pub fn tidy(self) -> Self {
        Self {
            term: self.term.trim().to_string(),
            gloss: self.gloss.trim().to_string(),
            explanation: self.explanation.trim().to_string(),
            cultural_note: self
                .cultural_note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        }
    }
}

/// Where an enhanced article's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    Generated,
    Seed,
    /// Original text standing in for missing enhancement.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedArticle {
    pub curation_id: String,
    pub original_title: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub source_name: String,
    pub quality_score: f64,
    pub relevance_score: f64,
    pub importance_score: f64,
    pub total_score: f64,
    pub simplified_title: Bilingual,
    pub summary: Bilingual,
    pub annotations: Vec<Annotation>,
    pub origin: ContentOrigin,
}

impl EnhancedArticle {
    fn base(
        src: &ScoredArticle,
        title: Bilingual,
        summary: Bilingual,
        annotations: Vec<Annotation>,
        origin: ContentOrigin,
    ) -> Self {
        Self {
            curation_id: src.curation_id.clone(),
            original_title: src.article.title.clone(),
            link: src.article.link.clone(),
            published: src.article.published,
            source_name: src.article.source_name.clone(),
            quality_score: src.quality_score,
            relevance_score: src.relevance_score,
            importance_score: src.importance_score,
            total_score: src.total_score,
            simplified_title: title,
            summary,
            annotations,
            origin,
        }
    }

    pub fn generated(src: &ScoredArticle, payload: parse::EnhancementPayload) -> Self {
        Self::base(
            src,
            payload.simplified_title,
            payload.summary,
            payload.annotations,
            ContentOrigin::Generated,
        )
    }

    pub fn from_seed(src: &ScoredArticle, seed: &SeedExample) -> Self {
        Self::base(
            src,
            seed.simplified_title.clone(),
            seed.summary.clone(),
            seed.annotations.clone(),
            ContentOrigin::Seed,
        )
    }

    /// Original title and summary in both slots; never empty.
    pub fn placeholder(src: &ScoredArticle) -> Self {
        let title = src.article.title.clone();
        let summary = if src.article.summary.trim().is_empty() {
            title.clone()
        } else {
            src.article.summary.clone()
        };
        Self::base(
            src,
            Bilingual {
                source: title.clone(),
                target: title,
            },
            Bilingual {
                source: summary.clone(),
                target: summary,
            },
            Vec::new(),
            ContentOrigin::Placeholder,
        )
    }
}

/// One entry per curated article, in curated order: generated text where the
/// batch produced it, then seed text, then a marked placeholder.
pub fn publishable(
    curated: &[ScoredArticle],
    outcome: &EnhanceOutcome,
    seeds: &SeedSet,
) -> Vec<EnhancedArticle> {
    curated
        .iter()
        .enumerate()
        .map(|(i, src)| {
            if let Some(done) = outcome.for_index(i) {
                return done.clone();
            }
            match seeds.lookup(&src.article.title) {
                Some(seed) => EnhancedArticle::from_seed(src, seed),
                None => EnhancedArticle::placeholder(src),
            }
        })
        .collect()
}
