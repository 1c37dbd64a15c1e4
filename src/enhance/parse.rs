// src/enhance/parse.rs
//! Model output parsing.
//!
//! Preferred shape is one JSON object (requested via structured output).
//! When a provider ignores that, two fallbacks run in order:
//! 1. label-prefixed lines (`Simplified English Title: ...`, `French Summary: ...`)
//!    for titles and summaries;
//! 2. a strict parse of the annotation list, then a salvage pass that cuts the
//!    first balanced `[...]` region that parses out of surrounding prose.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use super::{Annotation, Bilingual, Languages};

/// Everything one successful call yields for an article.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnhancementPayload {
    pub simplified_title: Bilingual,
    pub summary: Bilingual,
    #[serde(default, alias = "glossary", alias = "contextual_annotations")]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("response is empty")]
    Empty,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("annotation list unparseable: {0}")]
    Annotations(String),
}

/// Parse a raw completion into a payload, trying JSON first.
pub fn parse_response(text: &str, langs: &Languages) -> Result<EnhancementPayload, ParseError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(payload) = parse_json_object(body) {
        return validate(payload);
    }

    let (title, summary) = parse_labels(body, langs)?;
    let annotations = parse_annotation_list(body)?;
    validate(EnhancementPayload {
        simplified_title: title,
        summary,
        annotations,
    })
}

/// Strict list parse, then balanced-bracket salvage. The salvage looks after
/// an `Annotations:` / `Glossary:` marker first, then anywhere in the text.
pub fn parse_annotation_list(text: &str) -> Result<Vec<Annotation>, ParseError> {
    let body = strip_code_fence(text);
    if let Ok(list) = serde_json::from_str::<Vec<Annotation>>(body) {
        return Ok(list);
    }
    if let Some(at) = annotations_marker(body) {
        if let Ok(list) = salvage_list(&body[at..]) {
            return Ok(list);
        }
    }
    salvage_list(body)
}

/// End offset of the last annotation marker line, if any.
fn annotations_marker(body: &str) -> Option<usize> {
    static RE_MARKER: OnceCell<Regex> = OnceCell::new();
    let re = RE_MARKER
        .get_or_init(|| Regex::new(r"(?im)^[\s*#\-]*(?:annotations|glossary)[*\s]*:").unwrap());
    re.find_iter(body).last().map(|m| m.end())
}

/// First balanced `[...]` region that parses as an annotation list.
/// Bracketed prose such as `[Video]` in a title is skipped over.
fn salvage_list(text: &str) -> Result<Vec<Annotation>, ParseError> {
    let mut first_err: Option<String> = None;
    for (start, _) in text.match_indices('[') {
        let Some(region) = find_balanced(&text[start..], '[', ']') else {
            continue;
        };
        match serde_json::from_str::<Vec<Annotation>>(region) {
            Ok(list) => return Ok(list),
            Err(e) => {
                first_err.get_or_insert_with(|| e.to_string());
            }
        }
    }
    Err(ParseError::Annotations(
        first_err.unwrap_or_else(|| "no bracketed list found".to_string()),
    ))
}

fn parse_json_object(body: &str) -> Option<EnhancementPayload> {
    if let Ok(p) = serde_json::from_str::<EnhancementPayload>(body) {
        return Some(p);
    }
    // prose around an otherwise valid object
    let region = find_balanced(body, '{', '}')?;
    serde_json::from_str::<EnhancementPayload>(region).ok()
}

/// Titles and summaries from label-prefixed lines. Summaries may run over
/// several lines until the next label or the annotation block.
fn parse_labels(body: &str, langs: &Languages) -> Result<(Bilingual, Bilingual), ParseError> {
    static RE_LABEL: OnceCell<Regex> = OnceCell::new();
    let re = RE_LABEL.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*[*#\-\s]*(?:simplified\s+(?P<tlang>[\p{L}]+)\s+title|(?P<slang>[\p{L}]+)\s+summary|(?P<ann>annotations|glossary))[*\s]*:\s*(?P<rest>.*)$",
        )
        .unwrap()
    });

    #[derive(Clone, Copy, PartialEq)]
    enum Slot {
        TitleSource,
        TitleTarget,
        SummarySource,
        SummaryTarget,
    }

    let source = langs.source.to_lowercase();
    let target = langs.target.to_lowercase();
    let slot_for = |lang: &str, title: bool| -> Option<Slot> {
        let lang = lang.to_lowercase();
        match (lang == source, lang == target, title) {
            (true, _, true) => Some(Slot::TitleSource),
            (_, true, true) => Some(Slot::TitleTarget),
            (true, _, false) => Some(Slot::SummarySource),
            (_, true, false) => Some(Slot::SummaryTarget),
            _ => None,
        }
    };

    let mut fields: [String; 4] = Default::default();
    let index = |s: Slot| match s {
        Slot::TitleSource => 0,
        Slot::TitleTarget => 1,
        Slot::SummarySource => 2,
        Slot::SummaryTarget => 3,
    };
    let mut current: Option<Slot> = None;

    for line in body.lines() {
        if let Some(caps) = re.captures(line) {
            let rest = caps.name("rest").map(|m| m.as_str().trim()).unwrap_or_default();
            current = if let Some(l) = caps.name("tlang") {
                slot_for(l.as_str(), true)
            } else if let Some(l) = caps.name("slang") {
                slot_for(l.as_str(), false)
            } else {
                None
            };
            if let Some(slot) = current {
                fields[index(slot)] = rest.to_string();
            }
            continue;
        }
        let trimmed = line.trim();
        if trimmed.starts_with('[') || trimmed.starts_with("```") {
            current = None;
            continue;
        }
        // only summaries continue over several lines
        if let Some(slot @ (Slot::SummarySource | Slot::SummaryTarget)) = current {
            if !trimmed.is_empty() {
                let f = &mut fields[index(slot)];
                if !f.is_empty() {
                    f.push(' ');
                }
                f.push_str(trimmed);
            }
        }
    }

    let [title_source, title_target, summary_source, summary_target] = fields;
    if title_target.is_empty() {
        return Err(ParseError::MissingField("simplified_title.target"));
    }
    if title_source.is_empty() {
        return Err(ParseError::MissingField("simplified_title.source"));
    }
    if summary_target.is_empty() {
        return Err(ParseError::MissingField("summary.target"));
    }
    if summary_source.is_empty() {
        return Err(ParseError::MissingField("summary.source"));
    }
    Ok((
        Bilingual {
            source: title_source,
            target: title_target,
        },
        Bilingual {
            source: summary_source,
            target: summary_target,
        },
    ))
}

fn validate(mut p: EnhancementPayload) -> Result<EnhancementPayload, ParseError> {
    let checks = [
        (&p.simplified_title.source, "simplified_title.source"),
        (&p.simplified_title.target, "simplified_title.target"),
        (&p.summary.source, "summary.source"),
        (&p.summary.target, "summary.target"),
    ];
    for (value, name) in checks {
        if value.trim().is_empty() {
            return Err(ParseError::MissingField(name));
        }
    }
    p.annotations = p
        .annotations
        .into_iter()
        .filter(|a| !a.term.trim().is_empty())
        .map(Annotation::tidy)
        .collect();
    Ok(p)
}

/// Drop a leading ```json (or bare ```) fence and a trailing ``` fence.
pub fn strip_code_fence(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// First `open` … matching `close` region, skipping delimiters inside strings.
pub fn find_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (off, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let end = start + off + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// JSON schema for structured output. Strict mode wants every property
/// required and no extras.
pub fn payload_schema() -> serde_json::Value {
    let bilingual = serde_json::json!({
        "type": "object",
        "properties": {
            "source": {"type": "string"},
            "target": {"type": "string"}
        },
        "required": ["source", "target"],
        "additionalProperties": false
    });
    serde_json::json!({
        "type": "object",
        "properties": {
            "simplified_title": bilingual,
            "summary": bilingual,
            "annotations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "term": {"type": "string"},
                        "gloss": {"type": "string"},
                        "explanation": {"type": "string"},
                        "cultural_note": {"type": ["string", "null"]}
                    },
                    "required": ["term", "gloss", "explanation", "cultural_note"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["simplified_title", "summary", "annotations"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs() -> Languages {
        Languages::default()
    }

    const JSON_OK: &str = r#"{
        "simplified_title": {"source": "Les prix baissent", "target": "Prices are falling"},
        "summary": {"source": "Les prix alimentaires baissent.", "target": "Food prices are falling."},
        "annotations": [
            {"term": "prix", "gloss": "price", "explanation": "Cost of goods.", "cultural_note": ""},
            {"term": " ", "gloss": "x", "explanation": "y"}
        ]
    }"#;

    #[test]
    fn strict_json_with_fence() {
        let text = format!("```json\n{JSON_OK}\n```");
        let p = parse_response(&text, &langs()).unwrap();
        assert_eq!(p.simplified_title.target, "Prices are falling");
        // blank term dropped, empty cultural note normalised away
        assert_eq!(p.annotations.len(), 1);
        assert_eq!(p.annotations[0].cultural_note, None);
    }

    #[test]
    fn json_object_inside_prose_is_salvaged() {
        let text = format!("Here you go:\n{JSON_OK}\nHope this helps!");
        assert!(parse_response(&text, &langs()).is_ok());
    }

    #[test]
    fn labels_plus_bracketed_list() {
        let text = "Simplified English Title: Prices are falling\n\
                    Simplified French Title: Les prix baissent\n\
                    English Summary: Food prices are falling\n\
                    for the first time in two years.\n\
                    French Summary: Les prix alimentaires baissent.\n\
                    Annotations:\n\
                    Sure! [{\"term\": \"enfin\", \"gloss\": \"finally\", \"explanation\": \"After a long wait [sic].\"}] done";
        let p = parse_response(text, &langs()).unwrap();
        assert_eq!(p.simplified_title.source, "Les prix baissent");
        assert_eq!(
            p.summary.target,
            "Food prices are falling for the first time in two years."
        );
        assert_eq!(p.annotations[0].term, "enfin");
    }

    #[test]
    fn bracketed_title_does_not_hide_the_list() {
        let text = "Simplified English Title: [Video] Strike at SNCF\n\
                    Simplified French Title: [Vidéo] Grève à la SNCF\n\
                    English Summary: Trains are cancelled.\n\
                    French Summary: Des trains sont annulés.\n\
                    [{\"term\": \"grève\", \"gloss\": \"strike\", \"explanation\": \"Work stoppage.\"}]";
        let p = parse_response(text, &langs()).unwrap();
        assert_eq!(p.simplified_title.target, "[Video] Strike at SNCF");
        assert_eq!(p.annotations.len(), 1);
        assert_eq!(p.annotations[0].term, "grève");
    }

    #[test]
    fn marker_list_wins_over_earlier_lists() {
        let text = "Notes: [{\"term\": \"brouillon\"}]\nGlossary:\n[{\"term\": \"enfin\", \"gloss\": \"finally\"}]";
        let list = parse_annotation_list(text).unwrap();
        assert_eq!(list[0].term, "enfin");
    }

    #[test]
    fn prose_without_structure_fails() {
        let err = parse_response("I'm sorry, I cannot help with that.", &langs()).unwrap_err();
        assert_eq!(err, ParseError::MissingField("simplified_title.target"));
    }

    #[test]
    fn labels_without_list_fail_on_annotations() {
        let text = "Simplified English Title: A\nSimplified French Title: B\n\
                    English Summary: C\nFrench Summary: D";
        assert!(matches!(
            parse_response(text, &langs()),
            Err(ParseError::Annotations(_))
        ));
    }

    #[test]
    fn balanced_region_respects_strings() {
        let s = r#"x ["a]", ["b"]] tail ]"#;
        assert_eq!(find_balanced(s, '[', ']'), Some(r#"["a]", ["b"]]"#));
        assert_eq!(find_balanced("no list", '[', ']'), None);
        assert_eq!(find_balanced("[unclosed", '[', ']'), None);
    }
}
