// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loose record shape as delivered by the upstream collector.
/// Every field is optional here; `RawArticle::try_from` is the boundary check.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    #[serde(alias = "source")]
    pub source_name: Option<String>,
    #[serde(alias = "published_parsed", alias = "published_at")]
    pub published: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    #[serde(alias = "url")]
    pub link: Option<String>,
    /// Breaking-news signal computed upstream, if any.
    pub urgency_score: Option<f64>,
}

/// A validated article. Immutable once handed to curation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_score: Option<f64>,
}

impl RawArticle {
    /// Minimal article with only a title; the remaining fields are empty.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: String::new(),
            content: String::new(),
            source_name: String::new(),
            published: None,
            category: String::new(),
            author: None,
            link: None,
            urgency_score: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_name = source.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_urgency(mut self, urgency: f64) -> Self {
        self.urgency_score = Some(urgency);
        self
    }

    /// Canonical link if present and non-blank.
    pub fn canonical_link(&self) -> Option<&str> {
        self.link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    pub fn has_author(&self) -> bool {
        self.author.as_deref().is_some_and(|a| !a.trim().is_empty())
    }

    /// Content fingerprint over normalized title + summary.
    pub fn fingerprint(&self) -> String {
        super::content_fingerprint(&self.title, &self.summary)
    }

    /// Link when available, content fingerprint otherwise.
    pub fn identity_key(&self) -> String {
        match self.canonical_link() {
            Some(link) => link.to_string(),
            None => self.fingerprint(),
        }
    }
}

/// Why a record was refused at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputDefect {
    #[error("record has no title")]
    MissingTitle,
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// A record skipped during validation, with its position in the input batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

impl SkippedRecord {
    pub fn new(index: usize, defect: &InputDefect) -> Self {
        Self {
            index,
            reason: defect.to_string(),
        }
    }
}

impl TryFrom<RawRecord> for RawArticle {
    type Error = InputDefect;

    fn try_from(rec: RawRecord) -> Result<Self, Self::Error> {
        let title = super::normalize_text(rec.title.as_deref().unwrap_or_default(), 500);
        if title.is_empty() {
            return Err(InputDefect::MissingTitle);
        }

        let text = |v: Option<String>, cap: usize| super::normalize_text(&v.unwrap_or_default(), cap);
        let non_blank = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };

        let published = rec.published.as_deref().and_then(parse_timestamp);
        let urgency_score = rec.urgency_score.filter(|u| u.is_finite()).map(|u| u.max(0.0));

        Ok(Self {
            title,
            summary: text(rec.summary, 2_000),
            content: text(rec.content, 20_000),
            source_name: text(rec.source_name, 200),
            published,
            category: text(rec.category, 200),
            author: non_blank(rec.author),
            link: non_blank(rec.link),
            urgency_score,
        })
    }
}

/// RFC 3339 first (feed parsers mostly emit it), RFC 2822 as the RSS fallback.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_is_a_defect() {
        let rec = RawRecord {
            title: Some("   ".into()),
            summary: Some("quelque chose".into()),
            ..Default::default()
        };
        assert_eq!(RawArticle::try_from(rec), Err(InputDefect::MissingTitle));
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let rec = RawRecord {
            title: Some("Un titre".into()),
            ..Default::default()
        };
        let a = RawArticle::try_from(rec).unwrap();
        assert_eq!(a.summary, "");
        assert_eq!(a.content, "");
        assert!(a.link.is_none());
        assert!(a.published.is_none());
    }

    #[test]
    fn timestamps_accept_rfc3339_and_rfc2822() {
        assert!(parse_timestamp("2025-06-01T08:30:00+02:00").is_some());
        assert!(parse_timestamp("Sun, 01 Jun 2025 08:30:00 +0200").is_some());
        assert!(parse_timestamp("hier soir").is_none());
    }

    #[test]
    fn identity_prefers_link_over_fingerprint() {
        let a = RawArticle::titled("Titre").with_link(" https://ex.fr/a ");
        assert_eq!(a.identity_key(), "https://ex.fr/a");
        let b = RawArticle::titled("Titre");
        assert_eq!(b.identity_key(), b.fingerprint());
    }
}
