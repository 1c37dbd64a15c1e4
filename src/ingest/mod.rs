// src/ingest/mod.rs
pub mod types;

use crate::ingest::types::{InputDefect, RawArticle, RawRecord, SkippedRecord};
use anyhow::{Context, Result};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Normalize text: decode entities, strip tags, collapse whitespace, cap length.
///
/// Guillemets are kept as-is; the scorer treats them as a structure signal.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Curly quotes to ASCII (keeps "pouvoir d’achat" matching "pouvoir d'achat")
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }

    out
}

/// Fallback identity key: SHA-256 over lowercase title + summary with
/// punctuation removed and whitespace collapsed.
pub fn content_fingerprint(title: &str, summary: &str) -> String {
    static RE_PUNCT: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_punct = RE_PUNCT.get_or_init(|| Regex::new(r"[^\w\s]").unwrap());
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let joined = format!("{} {}", title, summary).to_lowercase();
    let stripped = re_punct.replace_all(joined.trim(), "");
    let normalized = re_ws.replace_all(&stripped, " ");

    let digest = Sha256::digest(normalized.trim().as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short anonymised id for log lines; raw article text is never logged.
pub(crate) fn anon_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Validate a batch of loose JSON records. Defective records are skipped,
/// never fatal; their positions and reasons come back alongside the articles.
pub fn validate_batch(values: Vec<serde_json::Value>) -> (Vec<RawArticle>, Vec<SkippedRecord>) {
    crate::telemetry::ensure_described();

    let mut kept = Vec::with_capacity(values.len());
    let mut skipped = Vec::new();

    for (index, value) in values.into_iter().enumerate() {
        let parsed = serde_json::from_value::<RawRecord>(value)
            .map_err(|e| InputDefect::Malformed(e.to_string()))
            .and_then(RawArticle::try_from);
        match parsed {
            Ok(article) => kept.push(article),
            Err(defect) => {
                tracing::warn!(target: "ingest", index, reason = %defect, "skipping input record");
                skipped.push(SkippedRecord::new(index, &defect));
            }
        }
    }

    counter!("curate_input_defects_total").increment(skipped.len() as u64);
    (kept, skipped)
}

/// Parse a collector document: either a bare JSON array of records or an
/// object wrapping them under `articles`.
pub fn parse_batch(json: &str) -> Result<(Vec<RawArticle>, Vec<SkippedRecord>)> {
    let doc: serde_json::Value = serde_json::from_str(json).context("input is not valid JSON")?;
    let values = match doc {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("articles") {
            Some(serde_json::Value::Array(items)) => items,
            _ => anyhow::bail!("input object has no `articles` array"),
        },
        _ => anyhow::bail!("input must be an array of records or an object with `articles`"),
    };
    Ok(validate_batch(values))
}

/// Read and validate a collector document from disk.
pub fn load_batch(path: &Path) -> Result<(Vec<RawArticle>, Vec<SkippedRecord>)> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading articles from {}", path.display()))?;
    parse_batch(&content).with_context(|| format!("parsing articles from {}", path.display()))
}
