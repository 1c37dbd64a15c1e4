// src/curate/scorer.rs
//! Deterministic article scoring: quality, relevance and importance in [0,10]
//! each, plus the independent urgency signal used by fast-track curation.
//!
//! Every sub-score starts from a fixed base, applies additive rules keyed on
//! lexicon hits and structural signals, and is clamped once at the end.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use crate::curate::lexicon::Lexicon;
use crate::ingest::types::RawArticle;

pub const QUALITY_BASE: f64 = 5.0;
pub const RELEVANCE_BASE: f64 = 3.0;
pub const IMPORTANCE_BASE: f64 = 4.0;
pub const SUB_SCORE_MAX: f64 = 10.0;
pub const URGENCY_MAX: f64 = 10.0;

/// Three bounded sub-scores. The total is always derived, never stored apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub quality: f64,
    pub relevance: f64,
    pub importance: f64,
}

impl SubScores {
    pub fn total(&self) -> f64 {
        self.quality + self.relevance + self.importance
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    lexicon: Lexicon,
}

impl Scorer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Score one article. Never fails; absent fields count as empty text.
    pub fn score(&self, article: &RawArticle) -> SubScores {
        let text = ArticleText::from(article);
        SubScores {
            quality: self.quality(article, &text),
            relevance: self.relevance(&text),
            importance: self.importance(&text),
        }
    }

    fn quality(&self, article: &RawArticle, t: &ArticleText) -> f64 {
        let lex = &self.lexicon;
        let mut score = QUALITY_BASE;

        // completeness
        if t.content.chars().count() > 200 {
            score += 1.0;
        }
        if t.summary.chars().count() > 50 {
            score += 0.5;
        }
        if article.has_author() {
            score += 0.5;
        }

        // writing-quality groups, +0.5 per group that hits
        for group in &lex.quality_indicators {
            if contains_any(&t.body, group) {
                score += 0.5;
            }
        }

        // structure
        if t.title.split_whitespace().count() >= 5 {
            score += 0.3;
        }
        if t.title.contains([':', '«', '»']) {
            score += 0.2;
        }
        if !t.summary.is_empty() && t.summary != t.title {
            score += 0.5;
        }

        // language structure: articles, common verbs, prepositions
        let hits = language_patterns()
            .iter()
            .filter(|re| re.is_match(&t.body))
            .count();
        score += (hits as f64 * 0.2).min(1.0);

        // penalties
        if contains_any(&t.body, &lex.poor_quality) {
            score -= 1.0;
        }
        if t.body.chars().count() < 100 {
            score -= 1.0;
        }
        if is_shouting(&article.title) {
            score -= 0.5;
        }

        clamp_sub_score(score)
    }

    fn relevance(&self, t: &ArticleText) -> f64 {
        let lex = &self.lexicon;
        let mut score = RELEVANCE_BASE;

        let high = count_hits(&t.body_with_category, &lex.high_relevance);
        score += (high as f64 * 0.8).min(4.0);

        let medium = count_hits(&t.body_with_category, &lex.medium_relevance);
        score += (medium as f64 * 0.3).min(2.0);

        if contains_any(&t.category, &lex.relevant_categories) {
            score += 1.0;
        }

        let low = count_hits(&t.body_with_category, &lex.low_relevance);
        score -= (low as f64).min(3.0);

        // foreign news with no domestic hook
        if contains_any(&t.body_with_category, &lex.international)
            && !contains_any(&t.body_with_category, &lex.domestic_context)
        {
            score -= 1.0;
        }

        clamp_sub_score(score)
    }

    fn importance(&self, t: &ArticleText) -> f64 {
        let lex = &self.lexicon;
        let mut score = IMPORTANCE_BASE;

        if contains_any(&t.body, &lex.importance_urgency) {
            score += 2.0;
        }
        if contains_any(&t.body, &lex.policy) {
            score += 2.0;
        }
        if contains_any(&t.body, &lex.economic) {
            score += 1.5;
        }
        if contains_any(&t.body, &lex.social) {
            score += 1.5;
        }
        if contains_any(&t.source, &lex.reputable_sources) {
            score += 1.0;
        }
        if contains_any(&t.body, &lex.locality) && !contains_any(&t.body, &lex.major_cities) {
            score -= 1.0;
        }

        clamp_sub_score(score)
    }

    /// Breaking-news signal over title + summary, in [0,10].
    ///
    /// An upstream-supplied value wins when present.
    pub fn urgency(&self, article: &RawArticle) -> f64 {
        if let Some(u) = article.urgency_score {
            return u.clamp(0.0, URGENCY_MAX);
        }

        let text = format!("{} {}", article.title, article.summary).to_lowercase();
        let tiers = &self.lexicon.breaking;
        let mut score = 0.0;
        score += count_hits(&text, &tiers.high) as f64 * 3.0;
        score += count_hits(&text, &tiers.very_high) as f64 * 2.5;
        score += count_hits(&text, &tiers.important) as f64 * 2.0;
        score += count_hits(&text, &tiers.other) as f64 * 1.0;

        let timing = urgency_patterns()
            .iter()
            .filter(|re| re.is_match(&text))
            .count();
        score += timing as f64 * 0.5;

        score.clamp(0.0, URGENCY_MAX)
    }
}

/// Lowercased views of the article fields, built once per score.
struct ArticleText {
    title: String,
    summary: String,
    content: String,
    category: String,
    source: String,
    body: String,
    body_with_category: String,
}

impl From<&RawArticle> for ArticleText {
    fn from(a: &RawArticle) -> Self {
        let title = a.title.to_lowercase();
        let summary = a.summary.to_lowercase();
        let content = a.content.to_lowercase();
        let category = a.category.to_lowercase();
        let body = format!("{title} {summary} {content}");
        let body_with_category = format!("{body} {category}");
        Self {
            title,
            summary,
            content,
            category,
            source: a.source_name.to_lowercase(),
            body,
            body_with_category,
        }
    }
}

fn clamp_sub_score(v: f64) -> f64 {
    v.clamp(0.0, SUB_SCORE_MAX)
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}

fn count_hits(haystack: &str, needles: &[String]) -> usize {
    needles.iter().filter(|n| haystack.contains(n.as_str())).count()
}

/// All cased characters upper case, and at least one of them.
fn is_shouting(title: &str) -> bool {
    let mut cased = title.chars().filter(|c| c.is_lowercase() || c.is_uppercase());
    let mut any = false;
    cased.all(|c| {
        any = true;
        c.is_uppercase()
    }) && any
}

fn language_patterns() -> &'static [Regex] {
    static RE: OnceCell<Vec<Regex>> = OnceCell::new();
    RE.get_or_init(|| {
        [
            r"\b(le|la|les|un|une|des)\b",
            r"\b(est|sont|était|sera)\b",
            r"\b(avec|dans|pour|sur|par)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn urgency_patterns() -> &'static [Regex] {
    static RE: OnceCell<Vec<Regex>> = OnceCell::new();
    RE.get_or_init(|| {
        [
            r"\b(?:maintenant|immédiatement|urgent|breaking)\b",
            r"\b(?:en cours|actuellement|ce matin)\b",
            r"\b(?:annonce|révèle|confirme)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> Scorer {
        Scorer::default()
    }

    #[test]
    fn empty_article_sits_near_bases() {
        let s = scorer().score(&RawArticle::titled("x"));
        // quality: base 5, too-short penalty -1
        assert_eq!(s.quality, 4.0);
        assert_eq!(s.relevance, RELEVANCE_BASE);
        assert_eq!(s.importance, IMPORTANCE_BASE);
    }

    #[test]
    fn policy_and_urgency_add_four_importance() {
        let a = RawArticle::titled("Alerte : le gouvernement tranche");
        let s = scorer().score(&a);
        assert!(s.importance >= IMPORTANCE_BASE + 4.0, "{:?}", s);
    }

    #[test]
    fn importance_clamps_at_ten() {
        let a = RawArticle::titled("Urgent : le gouvernement, l'inflation et la grève")
            .with_source("Le Monde");
        let s = scorer().score(&a);
        assert_eq!(s.importance, 10.0);
    }

    #[test]
    fn locality_penalty_is_lifted_by_major_city() {
        let village = RawArticle::titled("Un petit village en fête");
        let lyon = RawArticle::titled("Un petit village près de Lyon en fête");
        assert_eq!(scorer().score(&village).importance, IMPORTANCE_BASE - 1.0);
        assert_eq!(scorer().score(&lyon).importance, IMPORTANCE_BASE);
    }

    #[test]
    fn foreign_news_without_domestic_hook_loses_relevance() {
        let abroad = RawArticle::titled("Tensions en Chine");
        let hooked = RawArticle::titled("Tensions en Chine, inquiétude à Paris");
        let a = scorer().score(&abroad).relevance;
        let b = scorer().score(&hooked).relevance;
        assert_eq!(a, RELEVANCE_BASE - 1.0);
        assert!(b > a);
    }

    #[test]
    fn gossip_is_penalised_but_never_negative() {
        let a = RawArticle::titled("People : la star, le scandale, la rumeur et instagram");
        let s = scorer().score(&a);
        assert_eq!(s.relevance, 0.0);
    }

    #[test]
    fn shouting_title_detection() {
        assert!(is_shouting("INCROYABLE SCANDALE !"));
        assert!(!is_shouting("Incroyable scandale"));
        assert!(!is_shouting("2025 !"));
    }

    #[test]
    fn urgency_tiers_and_patterns() {
        let s = scorer();
        assert_eq!(s.urgency(&RawArticle::titled("rien de neuf")), 0.0);
        // "urgent": +3 keyword, +0.5 pattern
        assert_eq!(s.urgency(&RawArticle::titled("Urgent")), 3.5);
        // upstream value wins
        assert_eq!(s.urgency(&RawArticle::titled("Urgent").with_urgency(1.0)), 1.0);
        let loud = RawArticle::titled(
            "Breaking urgent alerte exclusif : dernière minute, le président annonce la crise",
        );
        assert_eq!(s.urgency(&loud), URGENCY_MAX);
    }
}
